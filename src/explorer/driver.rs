use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::device::controller::Device;
use crate::error::DeviceError;
use crate::report::report_model::DiscoveryReport;
use crate::screen::element::Snapshot;
use crate::screen::fingerprint::ScreenHasher;
use crate::screen::reader::{probe_swipes, snapshot_per_tab};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

use super::action::Action;
use super::app_map::{ExplorerConfig, Screen, Transition};
use super::crawler::{CrawlStats, Termination, crawl};
use super::screenshots::ScreenshotSink;
use super::world_state::{WorldState, with_empty_first};

// ============================================================================
// Multi-State Driver
// ============================================================================

/// Result of exploring under one world state. Every screen here belongs to
/// `world_state`; fingerprints are unique within one pass only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePass {
    pub world_state: WorldState,

    /// `WorldState::label()`, used to prefix screenshot names
    pub label: String,

    pub screens: Vec<Screen>,

    #[serde(default)]
    pub transitions: Vec<Transition>,

    pub termination: Termination,

    #[serde(default)]
    pub stats: CrawlStats,

    /// Why the pass stopped early, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatePass {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Reset the app to `state`: clear stored preferences, write the new ones,
/// and make sure no instance survives from the previous pass.
pub fn prepare_state<D: Device + ?Sized>(device: &mut D, state: &WorldState) -> Result<(), DeviceError> {
    device.clear_preferences()?;
    if !state.is_empty() {
        device.set_preferences(state)?;
    }
    device.terminate()
}

/// Crawl once per world state, the empty state first.
///
/// Passes are independent: each gets a fresh screen map, and a pass that
/// fails (device gone, preferences not writable) is reported with its
/// error while later passes still run.
pub fn run_world_states<D: Device + ?Sized>(
    device: &mut D,
    states: &[WorldState],
    config: &ExplorerConfig,
    tracer: &TraceLogger,
    sink: &mut dyn ScreenshotSink,
) -> DiscoveryReport {
    let started = Instant::now();
    let states = with_empty_first(states);
    let mut passes = Vec::with_capacity(states.len());

    for (i, state) in states.into_iter().enumerate() {
        let label = state.label();
        info!("Pass {}: world state '{}'", i + 1, label);
        tracer.log(&TraceEvent::now(0, &label, "pass_started").with_detail(&label));

        let pass = match prepare_state(device, &state) {
            Ok(()) => {
                let (map, outcome) = crawl(device, config, tracer, sink, &label);
                let error = match &outcome.termination {
                    Termination::Aborted(reason) => Some(reason.clone()),
                    _ => None,
                };
                StatePass {
                    world_state: state,
                    label: label.clone(),
                    transitions: map.transitions.clone(),
                    screens: map.into_screens(),
                    termination: outcome.termination,
                    stats: outcome.stats,
                    error,
                }
            }
            Err(e) => {
                warn!("Could not prepare world state '{}': {}", label, e);
                tracer.log(&TraceEvent::now(0, &label, "pass_aborted").with_detail(&e));
                StatePass {
                    world_state: state,
                    label: label.clone(),
                    screens: Vec::new(),
                    transitions: Vec::new(),
                    termination: Termination::Aborted(e.to_string()),
                    stats: CrawlStats::default(),
                    error: Some(e.to_string()),
                }
            }
        };

        info!(
            "Pass '{}' finished: {} screens ({:?})",
            label,
            pass.screens.len(),
            pass.termination
        );
        tracer.log(
            &TraceEvent::now(0, &label, "pass_finished")
                .with_detail(format!("{} screens, {:?}", pass.screens.len(), pass.termination)),
        );
        passes.push(pass);
    }

    DiscoveryReport::new(passes).with_duration(started.elapsed().as_millis() as u64)
}

// ============================================================================
// Observations: per-state snapshots consumed by the reconciler
// ============================================================================

/// A snapshot together with the actions that reached it from a cold launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedScreen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: Vec<Action>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateObservation {
    pub world_state: WorldState,
    pub screens: Vec<ObservedScreen>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything observed about an app, grouped by world state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationSet {
    pub states: Vec<StateObservation>,
}

impl ObservationSet {
    pub fn from_report(report: &DiscoveryReport) -> Self {
        let states = report
            .passes
            .iter()
            .map(|pass| StateObservation {
                world_state: pass.world_state.clone(),
                screens: pass
                    .screens
                    .iter()
                    .map(|s| ObservedScreen {
                        name: Some(s.name.clone()),
                        path: s.path.clone(),
                        snapshot: s.snapshot.clone(),
                    })
                    .collect(),
                error: pass.error.clone(),
            })
            .collect();
        Self { states }
    }

    pub fn screen_count(&self) -> usize {
        self.states.iter().map(|s| s.screens.len()).sum()
    }
}

impl From<&DiscoveryReport> for ObservationSet {
    fn from(report: &DiscoveryReport) -> Self {
        Self::from_report(report)
    }
}

// ============================================================================
// Single-pass tree dump
// ============================================================================

/// Cheap alternative to a full crawl: per world state, snapshot the root
/// screen and every tab (or, without a tab bar, the swipe-left/right pages).
pub fn dump_states<D: Device + ?Sized>(
    device: &mut D,
    states: &[WorldState],
    config: &ExplorerConfig,
) -> ObservationSet {
    let hasher = ScreenHasher::new(config.fingerprint);
    let states = with_empty_first(states);
    let mut out = ObservationSet::default();

    for state in states {
        let label = state.label();
        match dump_one(device, &state, config, &hasher) {
            Ok(screens) => {
                info!("Dumped '{}': {} screens", label, screens.len());
                out.states.push(StateObservation {
                    world_state: state,
                    screens,
                    error: None,
                });
            }
            Err(e) => {
                warn!("Dump of '{}' failed: {}", label, e);
                out.states.push(StateObservation {
                    world_state: state,
                    screens: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    out
}

fn dump_one<D: Device + ?Sized>(
    device: &mut D,
    state: &WorldState,
    config: &ExplorerConfig,
    hasher: &ScreenHasher,
) -> Result<Vec<ObservedScreen>, DeviceError> {
    prepare_state(device, state)?;
    device.launch()?;

    let root = device.snapshot(&config.caps, hasher)?;
    let probes = if root.has_tab_bar() {
        snapshot_per_tab(device, &root, &config.caps, hasher)?
    } else if config.probe_swipes {
        probe_swipes(device, &root, &config.caps, hasher)?
    } else {
        Vec::new()
    };

    let mut screens = vec![ObservedScreen {
        name: Some("root".to_string()),
        path: Vec::new(),
        snapshot: root,
    }];
    for probe in probes {
        let seen = screens
            .iter()
            .any(|s| s.snapshot.fingerprint == probe.snapshot.fingerprint);
        if !seen {
            screens.push(ObservedScreen {
                name: probe.actions.first().map(Action::context),
                path: probe.actions,
                snapshot: probe.snapshot,
            });
        }
    }
    Ok(screens)
}
