use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::controller::Device;
use crate::error::{ActionError, DeviceError};
use crate::screen::element::{ElementRole, Snapshot};
use crate::screen::fingerprint::{Fingerprint, ScreenHasher};

use super::action::{Action, SwipeDirection};
use super::app_map::ExplorerConfig;

/// Ways of getting back to a parent screen, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Leading navigation-bar button
    NavBack,
    /// A close-style control ("Close", "×", ...)
    Dismiss,
    /// Swipe down to dismiss a modal sheet
    SwipeDown,
}

pub const IN_PLACE_STRATEGIES: [RecoveryStrategy; 3] = [
    RecoveryStrategy::NavBack,
    RecoveryStrategy::Dismiss,
    RecoveryStrategy::SwipeDown,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Back on the target screen without restarting
    Returned(RecoveryStrategy),
    /// In-place strategies failed; relaunch and replay reached the target
    Relaunched,
    /// Relaunch and replay did not reproduce the target fingerprint
    Diverged,
}

/// Action a strategy would perform on `current`, or `None` when the
/// control it needs is absent.
pub fn strategy_action(
    strategy: RecoveryStrategy,
    current: &Snapshot,
    config: &ExplorerConfig,
) -> Option<Action> {
    match strategy {
        RecoveryStrategy::NavBack => current
            .by_role(ElementRole::NavBarButton)
            .find(|e| e.is_actionable())
            .map(Action::tap),
        RecoveryStrategy::Dismiss => config.dismiss_labels.iter().find_map(|label| {
            current
                .elements
                .iter()
                .find(|e| {
                    e.role.is_button_like()
                        && e.is_actionable()
                        && (&e.label == label || e.identifier.as_deref() == Some(label.as_str()))
                })
                .map(Action::tap)
        }),
        RecoveryStrategy::SwipeDown => Some(Action::swipe(SwipeDirection::Down)),
    }
}

/// One attempt made while recovering, for tracing.
#[derive(Debug, Clone)]
pub struct RecoveryAttempt {
    pub strategy: Option<RecoveryStrategy>,
    pub action: Option<Action>,
    pub fingerprint: Fingerprint,
}

/// Result of `recover`: what worked, the screen we ended on, and every
/// attempt made on the way.
#[derive(Debug, Clone)]
pub struct Recovery {
    pub outcome: RecoveryOutcome,
    pub snapshot: Snapshot,
    pub attempts: Vec<RecoveryAttempt>,
}

/// Return from `current` to the screen identified by `target`.
///
/// Tries each in-place strategy in order, re-snapshotting after each; the
/// first one that lands on `target` wins. Otherwise the app is relaunched
/// and `target_path` replayed from a cold start. Only environment failures
/// are returned as errors.
pub fn recover<D: Device + ?Sized>(
    device: &mut D,
    current: &Snapshot,
    target: &Fingerprint,
    target_path: &[Action],
    config: &ExplorerConfig,
    hasher: &ScreenHasher,
) -> Result<Recovery, DeviceError> {
    let mut attempts = Vec::new();
    let mut current = current.clone();

    for strategy in IN_PLACE_STRATEGIES {
        let Some(action) = strategy_action(strategy, &current, config) else {
            continue;
        };

        match device.perform(&action) {
            Ok(()) => {}
            Err(ActionError::Device(e)) if e.is_environment_failure() => return Err(e),
            Err(e) => {
                debug!("Recovery {:?} failed: {}", strategy, e);
                continue;
            }
        }

        let after = device.snapshot(&config.caps, hasher)?;
        attempts.push(RecoveryAttempt {
            strategy: Some(strategy),
            action: Some(action),
            fingerprint: after.fingerprint.clone(),
        });

        if &after.fingerprint == target {
            return Ok(Recovery {
                outcome: RecoveryOutcome::Returned(strategy),
                snapshot: after,
                attempts,
            });
        }
        current = after;
    }

    let snapshot = relaunch_and_replay(device, target_path, config, hasher)?;
    attempts.push(RecoveryAttempt {
        strategy: None,
        action: None,
        fingerprint: snapshot.fingerprint.clone(),
    });

    let outcome = if &snapshot.fingerprint == target {
        RecoveryOutcome::Relaunched
    } else {
        RecoveryOutcome::Diverged
    };

    Ok(Recovery {
        outcome,
        snapshot,
        attempts,
    })
}

/// Cold-launch the app and replay `path`, returning the final snapshot.
///
/// A step that fails without taking the environment down stops the replay
/// early; the caller sees the mismatch through the fingerprint.
pub fn relaunch_and_replay<D: Device + ?Sized>(
    device: &mut D,
    path: &[Action],
    config: &ExplorerConfig,
    hasher: &ScreenHasher,
) -> Result<Snapshot, DeviceError> {
    device.launch()?;

    for action in path {
        match device.perform(action) {
            Ok(()) => {}
            Err(ActionError::Device(e)) if e.is_environment_failure() => return Err(e),
            Err(e) => {
                debug!("Replay step '{}' failed: {}", action, e);
                break;
            }
        }
    }

    device.snapshot(&config.caps, hasher)
}
