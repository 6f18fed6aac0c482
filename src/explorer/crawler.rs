use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::controller::Device;
use crate::error::{ActionError, DeviceError};
use crate::screen::element::{Element, ElementRole, Snapshot};
use crate::screen::fingerprint::{Fingerprint, ScreenHasher};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;

use super::action::{Action, SwipeDirection};
use super::app_map::{ExplorerConfig, Screen, ScreenMap, Transition};
use super::recovery::{Recovery, RecoveryOutcome, recover};
use super::screenshots::ScreenshotSink;

// ============================================================================
// Crawl state
// ============================================================================

/// Where the crawl is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Launched,
    Exploring { depth: usize },
    Backtracking { depth: usize },
    Done,
}

/// One open level of the depth-first search.
#[derive(Debug, Clone)]
pub struct Frame {
    pub fingerprint: Fingerprint,

    /// Actions that reach this frame's screen from a cold launch
    pub path: Vec<Action>,

    /// Candidates not yet tried, in priority order
    pub candidates: VecDeque<Action>,

    pub depth: usize,
}

impl Frame {
    /// Open a frame for `snapshot`. Frames at `max_depth` get no candidates.
    pub fn open(snapshot: &Snapshot, path: Vec<Action>, config: &ExplorerConfig) -> Self {
        let depth = path.len();
        let candidates = if depth < config.max_depth {
            candidate_actions(snapshot, config)
        } else {
            VecDeque::new()
        };
        Self {
            fingerprint: snapshot.fingerprint.clone(),
            path,
            candidates,
            depth,
        }
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// Every open frame ran out of candidates
    Exhausted,
    /// `max_screens` reached
    ScreenCap,
    /// `max_iterations` reached
    IterationCap,
    /// Relaunch could not reproduce the root screen
    ReplayDiverged,
    /// The environment failed; screens recorded so far are kept
    Aborted(String),
}

impl Termination {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Termination::Aborted(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Candidate actions performed
    pub iterations: usize,
    pub no_effect: usize,
    pub failed_actions: usize,
    pub known_screens: usize,
    pub recoveries: usize,
    pub relaunches: usize,
    pub abandoned_frames: usize,
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub termination: Termination,
    pub stats: CrawlStats,
}

// ============================================================================
// Pure transition functions
// ============================================================================

/// What the crawl loop should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Try(Action),
    Backtrack,
    Finish(Termination),
}

/// Decide the next step from the open frames and counters alone.
pub fn plan_next(
    frames: &[Frame],
    screens_recorded: usize,
    stats: &CrawlStats,
    config: &ExplorerConfig,
) -> Plan {
    if screens_recorded >= config.max_screens {
        return Plan::Finish(Termination::ScreenCap);
    }
    if stats.iterations >= config.max_iterations {
        return Plan::Finish(Termination::IterationCap);
    }
    match frames.last() {
        None => Plan::Finish(Termination::Exhausted),
        Some(top) => match top.candidates.front() {
            Some(action) => Plan::Try(action.clone()),
            None => Plan::Backtrack,
        },
    }
}

/// Effect of one candidate action, judged by fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Fingerprint unchanged; no navigation happened
    NoEffect,
    /// Unseen fingerprint; `expand` when the new screen is shallow enough
    /// to explore further
    NewScreen { expand: bool },
    /// Changed to a screen already in the map
    KnownScreen,
    /// The action was rejected and the screen did not change
    Failed,
}

/// Classify the screen observed after an action. A rejected action that
/// still changed the screen is judged by the screen it produced.
pub fn classify_observation(
    before: &Fingerprint,
    after: &Fingerprint,
    action_failed: bool,
    map: &ScreenMap,
    child_depth: usize,
    config: &ExplorerConfig,
) -> ActionOutcome {
    if before == after {
        if action_failed {
            ActionOutcome::Failed
        } else {
            ActionOutcome::NoEffect
        }
    } else if map.contains(after) {
        ActionOutcome::KnownScreen
    } else {
        ActionOutcome::NewScreen {
            expand: child_depth < config.max_depth,
        }
    }
}

/// Candidate actions for a screen in priority order: tab-bar buttons,
/// regular buttons (minus exit/dismiss labels), list cells, then a
/// swipe-left/right probe when there is no tab bar.
pub fn candidate_actions(snapshot: &Snapshot, config: &ExplorerConfig) -> VecDeque<Action> {
    let mut out: VecDeque<Action> = VecDeque::new();
    let mut push = |action: Action| {
        if !out.contains(&action) {
            out.push_back(action);
        }
    };

    let addressable = |e: &&Element| !(e.label.is_empty() && e.identifier.is_none());

    for tab in snapshot
        .by_role(ElementRole::Tab)
        .filter(|e| e.hittable)
        .filter(addressable)
    {
        push(Action::tap(tab));
    }

    let reserved = |label: &str| {
        config.exit_labels.iter().any(|l| l == label)
            || config.dismiss_labels.iter().any(|l| l == label)
    };

    for button in snapshot
        .by_role(ElementRole::Button)
        .filter(|e| e.is_actionable())
        .filter(addressable)
        .filter(|e| !reserved(&e.label))
        .take(config.max_actions)
    {
        push(Action::tap(button));
    }

    for cell in snapshot
        .by_role(ElementRole::Cell)
        .filter(|e| e.is_actionable())
        .filter(addressable)
        .take(config.max_cells)
    {
        push(Action::tap(cell));
    }

    if config.probe_swipes && !snapshot.has_tab_bar() {
        push(Action::swipe(SwipeDirection::Left));
        push(Action::swipe(SwipeDirection::Right));
    }

    out
}

// ============================================================================
// Crawler: explicit-stack depth-first search over the live UI
// ============================================================================

/// Drives one discovery pass against a device.
///
/// Owns no screen state: the caller passes the pass's `ScreenMap`, so
/// independent passes never share a seen-set.
pub struct Crawler<'a, D: Device + ?Sized> {
    device: &'a mut D,
    config: &'a ExplorerConfig,
    hasher: ScreenHasher,
    tracer: &'a TraceLogger,
    sink: &'a mut dyn ScreenshotSink,
    state_label: String,
    phase: CrawlPhase,
    stats: CrawlStats,
    step: u64,
}

impl<'a, D: Device + ?Sized> Crawler<'a, D> {
    pub fn new(
        device: &'a mut D,
        config: &'a ExplorerConfig,
        tracer: &'a TraceLogger,
        sink: &'a mut dyn ScreenshotSink,
        state_label: &str,
    ) -> Self {
        Self {
            device,
            config,
            hasher: ScreenHasher::new(config.fingerprint),
            tracer,
            sink,
            state_label: state_label.to_string(),
            phase: CrawlPhase::Idle,
            stats: CrawlStats::default(),
            step: 0,
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Crawl from a cold launch until exhausted, capped, or aborted.
    /// Never fails: an environment failure becomes `Termination::Aborted`
    /// and `map` keeps every screen recorded before it.
    pub fn run(mut self, map: &mut ScreenMap) -> CrawlOutcome {
        let termination = match self.explore(map) {
            Ok(t) => t,
            Err(e) => {
                warn!("[{}] pass aborted: {}", self.state_label, e);
                self.trace("pass_aborted", |ev| ev.with_detail(&e));
                Termination::Aborted(e.to_string())
            }
        };

        self.phase = CrawlPhase::Done;
        match &termination {
            Termination::ScreenCap | Termination::IterationCap => {
                info!(
                    "[{}] cap reached ({:?}) after {} screens",
                    self.state_label,
                    termination,
                    map.screen_count()
                );
                self.trace("cap_reached", |ev| ev.with_detail(format!("{:?}", termination)));
            }
            Termination::Exhausted => {
                info!("[{}] exploration exhausted with {} screens", self.state_label, map.screen_count());
            }
            _ => {}
        }

        CrawlOutcome {
            termination,
            stats: self.stats,
        }
    }

    fn explore(&mut self, map: &mut ScreenMap) -> Result<Termination, DeviceError> {
        self.device.launch()?;
        self.phase = CrawlPhase::Launched;

        let root = self.snapshot()?;
        self.record(map, &root, Vec::new(), "initial")?;

        let mut frames = vec![Frame::open(&root, Vec::new(), self.config)];
        let mut current = root;

        loop {
            match plan_next(&frames, map.screen_count(), &self.stats, self.config) {
                Plan::Finish(termination) => return Ok(termination),

                Plan::Backtrack => {
                    frames.pop();
                    if let Some(parent) = frames.last() {
                        self.phase = CrawlPhase::Backtracking {
                            depth: parent.depth,
                        };
                        match self.return_to_top(&mut frames, current)? {
                            Some(snapshot) => current = snapshot,
                            None => return Ok(Termination::ReplayDiverged),
                        }
                    }
                }

                Plan::Try(action) => {
                    let Some(top) = frames.last_mut() else {
                        continue;
                    };
                    top.candidates.pop_front();
                    let parent_fp = top.fingerprint.clone();
                    let parent_path = top.path.clone();
                    let depth = top.depth;

                    self.phase = CrawlPhase::Exploring { depth };
                    self.stats.iterations += 1;

                    let failure = match self.device.perform(&action) {
                        Ok(()) => None,
                        Err(ActionError::Device(e)) if e.is_environment_failure() => return Err(e),
                        Err(e) => Some(e),
                    };

                    let after = self.snapshot()?;
                    let outcome = classify_observation(
                        &parent_fp,
                        &after.fingerprint,
                        failure.is_some(),
                        map,
                        depth + 1,
                        self.config,
                    );

                    match outcome {
                        ActionOutcome::Failed => {
                            self.stats.failed_actions += 1;
                            let reason = failure.map(|e| e.to_string()).unwrap_or_default();
                            debug!("[{}] '{}' failed: {}", self.state_label, action, reason);
                            self.trace("action_failed", |ev| {
                                ev.with_depth(depth).with_action(&action).with_detail(&reason)
                            });
                            current = after;
                        }

                        ActionOutcome::NoEffect => {
                            self.stats.no_effect += 1;
                            debug!("[{}] '{}' had no effect", self.state_label, action);
                            self.trace("action_no_effect", |ev| {
                                ev.with_depth(depth).with_action(&action)
                            });
                            current = after;
                        }

                        ActionOutcome::NewScreen { expand } => {
                            let mut child_path = parent_path;
                            child_path.push(action.clone());
                            map.add_transition(Transition {
                                from: parent_fp,
                                to: after.fingerprint.clone(),
                                action: action.clone(),
                            });
                            self.record(map, &after, child_path.clone(), &action.context())?;

                            if map.screen_count() >= self.config.max_screens {
                                return Ok(Termination::ScreenCap);
                            }

                            if expand {
                                frames.push(Frame::open(&after, child_path, self.config));
                                current = after;
                            } else {
                                match self.return_to_top(&mut frames, after)? {
                                    Some(snapshot) => current = snapshot,
                                    None => return Ok(Termination::ReplayDiverged),
                                }
                            }
                        }

                        ActionOutcome::KnownScreen => {
                            self.stats.known_screens += 1;
                            map.add_transition(Transition {
                                from: parent_fp,
                                to: after.fingerprint.clone(),
                                action: action.clone(),
                            });
                            self.trace("known_screen", |ev| {
                                ev.with_depth(depth)
                                    .with_action(&action)
                                    .with_fingerprint(&after.fingerprint)
                            });
                            match self.return_to_top(&mut frames, after)? {
                                Some(snapshot) => current = snapshot,
                                None => return Ok(Termination::ReplayDiverged),
                            }
                        }
                    }
                }
            }
        }
    }

    /// Bring the device back to the top frame's screen.
    ///
    /// A frame whose path no longer replays to its fingerprint is abandoned
    /// (its untried candidates are dropped) and recovery moves to its
    /// parent. Returns `None` when even the root cannot be reproduced.
    fn return_to_top(
        &mut self,
        frames: &mut Vec<Frame>,
        mut current: Snapshot,
    ) -> Result<Option<Snapshot>, DeviceError> {
        loop {
            let Some(top) = frames.last() else {
                return Ok(Some(current));
            };
            if current.fingerprint == top.fingerprint {
                return Ok(Some(current));
            }

            let Recovery {
                outcome,
                snapshot,
                attempts,
            } = recover(
                &mut *self.device,
                &current,
                &top.fingerprint,
                &top.path,
                self.config,
                &self.hasher,
            )?;

            let depth = top.depth;
            for attempt in &attempts {
                self.trace("recovery_attempt", |ev| {
                    let ev = ev.with_depth(depth).with_fingerprint(&attempt.fingerprint);
                    match (&attempt.action, attempt.strategy) {
                        (Some(action), Some(strategy)) => {
                            ev.with_action(action).with_detail(format!("{:?}", strategy))
                        }
                        _ => ev.with_detail("relaunch"),
                    }
                });
            }

            match outcome {
                RecoveryOutcome::Returned(strategy) => {
                    self.stats.recoveries += 1;
                    debug!("[{}] recovered via {:?}", self.state_label, strategy);
                    self.trace("recovered", |ev| {
                        ev.with_depth(depth).with_detail(format!("{:?}", strategy))
                    });
                    return Ok(Some(snapshot));
                }
                RecoveryOutcome::Relaunched => {
                    self.stats.relaunches += 1;
                    info!(
                        "[{}] recovery exhausted; relaunched and replayed {} actions",
                        self.state_label, depth
                    );
                    self.trace("relaunched", |ev| {
                        ev.with_depth(depth).with_fingerprint(&snapshot.fingerprint)
                    });
                    return Ok(Some(snapshot));
                }
                RecoveryOutcome::Diverged => {
                    self.stats.relaunches += 1;
                    warn!(
                        "[{}] replay of depth-{} path diverged (got {})",
                        self.state_label, depth, snapshot.fingerprint
                    );
                    self.trace("replay_diverged", |ev| {
                        ev.with_depth(depth).with_fingerprint(&snapshot.fingerprint)
                    });
                    if frames.len() == 1 {
                        return Ok(None);
                    }
                    frames.pop();
                    self.stats.abandoned_frames += 1;
                    current = snapshot;
                }
            }
        }
    }

    /// Record `snapshot` as a new screen unless seen or over the cap.
    fn record(
        &mut self,
        map: &mut ScreenMap,
        snapshot: &Snapshot,
        path: Vec<Action>,
        context: &str,
    ) -> Result<bool, DeviceError> {
        if map.contains(&snapshot.fingerprint) || map.screen_count() >= self.config.max_screens {
            return Ok(false);
        }

        let name = format!("{:02}-{}", map.screen_count() + 1, context);
        let screenshot = self.capture(&name)?;
        let depth = path.len();

        map.insert(Screen {
            name: name.clone(),
            fingerprint: snapshot.fingerprint.clone(),
            path,
            snapshot: snapshot.clone(),
            screenshot,
        });

        info!("[{}] new screen {} ({})", self.state_label, name, snapshot.fingerprint);
        self.trace("screen_recorded", |ev| {
            ev.with_depth(depth)
                .with_fingerprint(&snapshot.fingerprint)
                .with_detail(&name)
        });
        Ok(true)
    }

    fn capture(&mut self, name: &str) -> Result<Option<std::path::PathBuf>, DeviceError> {
        if !self.sink.enabled() {
            return Ok(None);
        }
        match self.device.capture_screenshot() {
            Ok(png) => match self.sink.store(&self.state_label, name, &png) {
                Ok(path) => Ok(Some(path)),
                Err(e) => {
                    warn!("[{}] could not store screenshot {}: {}", self.state_label, name, e);
                    Ok(None)
                }
            },
            Err(e) if e.is_environment_failure() => Err(e),
            Err(e) => {
                warn!("[{}] screenshot of {} failed: {}", self.state_label, name, e);
                Ok(None)
            }
        }
    }

    fn snapshot(&mut self) -> Result<Snapshot, DeviceError> {
        self.device.snapshot(&self.config.caps, &self.hasher)
    }

    fn trace(&mut self, event: &str, build: impl FnOnce(TraceEvent) -> TraceEvent) {
        self.step += 1;
        if !self.tracer.is_enabled() {
            return;
        }
        let ev = TraceEvent::now(self.step, &self.state_label, event).with_phase(self.phase);
        self.tracer.log(&build(ev));
    }
}

/// Run one discovery pass with a fresh `ScreenMap`.
pub fn crawl<D: Device + ?Sized>(
    device: &mut D,
    config: &ExplorerConfig,
    tracer: &TraceLogger,
    sink: &mut dyn ScreenshotSink,
    state_label: &str,
) -> (ScreenMap, CrawlOutcome) {
    let mut map = ScreenMap::new();
    let outcome = Crawler::new(device, config, tracer, sink, state_label).run(&mut map);
    (map, outcome)
}
