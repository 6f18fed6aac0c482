use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::explorer::action::Action;
use crate::explorer::driver::StatePass;
use crate::explorer::world_state::WorldState;
use crate::reconcile::expected::ReachabilityVerdict;
use crate::screen::fingerprint::Fingerprint;

// ============================================================================
// Discovery report: aggregates every world-state pass
// ============================================================================

/// Result of a Multi-State Driver run.
///
/// Built from a `Vec<StatePass>` via `new()`. Consumed by the console
/// reporter, the JSON report file and `ObservationSet::from_report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Number of passes run
    pub total_passes: usize,

    /// Passes that ended with an error
    pub failed_passes: usize,

    /// Screens recorded across all passes
    pub total_screens: usize,

    /// Total execution duration in milliseconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    pub passes: Vec<StatePass>,
}

impl DiscoveryReport {
    pub fn new(passes: Vec<StatePass>) -> Self {
        Self {
            total_passes: passes.len(),
            failed_passes: passes.iter().filter(|p| p.failed()).count(),
            total_screens: passes.iter().map(|p| p.screens.len()).sum(),
            duration_ms: None,
            passes,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn all_passed(&self) -> bool {
        self.failed_passes == 0
    }

    /// Every recorded screen as a capture target, tagged with its world state.
    pub fn capture_targets(&self) -> Vec<CaptureTarget> {
        self.passes
            .iter()
            .flat_map(|pass| {
                pass.screens.iter().map(move |screen| CaptureTarget {
                    name: screen.name.clone(),
                    world_state: pass.world_state.clone(),
                    fingerprint: Some(screen.fingerprint.clone()),
                    actions: screen.path.clone(),
                    screenshot: screen.screenshot.clone(),
                    caption: None,
                })
            })
            .collect()
    }
}

// ============================================================================
// Capture targets: what the downstream capture step replays
// ============================================================================

/// One screen to replay and capture: launch under `world_state`, perform
/// `actions`, take a screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureTarget {
    pub name: String,
    pub world_state: WorldState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,

    pub actions: Vec<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Output of reconciliation: replayable targets plus every screen that
/// could not be confirmed, with its reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub targets: Vec<CaptureTarget>,
    pub unreachable: Vec<UnreachableScreen>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreachableScreen {
    pub name: String,
    pub reason: String,
}

impl ReconcileReport {
    pub fn from_verdicts(verdicts: Vec<ReachabilityVerdict>) -> Self {
        let mut report = Self::default();
        for verdict in verdicts {
            match verdict {
                ReachabilityVerdict::Reachable {
                    name,
                    world_state,
                    actions,
                    caption,
                    fingerprint,
                } => report.targets.push(CaptureTarget {
                    name,
                    world_state,
                    fingerprint,
                    actions,
                    screenshot: None,
                    caption,
                }),
                ReachabilityVerdict::Unreachable { name, reason } => {
                    report.unreachable.push(UnreachableScreen { name, reason })
                }
            }
        }
        report
    }

    pub fn all_reachable(&self) -> bool {
        self.unreachable.is_empty()
    }
}
