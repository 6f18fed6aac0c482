use tracing::{debug, info};

use crate::explorer::action::{Action, Selector};
use crate::explorer::driver::{ObservationSet, ObservedScreen, StateObservation};
use crate::explorer::world_state::WorldState;
use crate::screen::element::{Element, ElementRole};
use crate::screen::fingerprint::Fingerprint;

use super::expected::{CandidateStep, ExpectedScreen, ReachabilityVerdict};

// ============================================================================
// Navigation Reconciler
// ============================================================================

/// Validates proposed navigation against what was actually observed.
///
/// Every emitted tap targets an element seen, by exact label or identifier,
/// in a snapshot captured under a world state that satisfies the expected
/// screen's required preferences. Anything that cannot be validated becomes
/// an unreachable verdict with a reason; nothing is guessed.
pub struct Reconciler<'a> {
    observations: &'a ObservationSet,
}

/// A validated way to reach a screen.
#[derive(Debug, Clone)]
struct Route {
    world_state: WorldState,
    actions: Vec<Action>,
    fingerprint: Option<Fingerprint>,
    from_candidate: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(observations: &'a ObservationSet) -> Self {
        Self { observations }
    }

    pub fn reconcile_all(&self, expected: &[ExpectedScreen]) -> Vec<ReachabilityVerdict> {
        let verdicts: Vec<_> = expected.iter().map(|e| self.reconcile(e)).collect();
        let reachable = verdicts.iter().filter(|v| v.is_reachable()).count();
        info!(
            "Reconciled {} screens: {} reachable, {} unreachable",
            verdicts.len(),
            reachable,
            verdicts.len() - reachable
        );
        verdicts
    }

    pub fn reconcile(&self, expected: &ExpectedScreen) -> ReachabilityVerdict {
        if !expected.reachable {
            return ReachabilityVerdict::Unreachable {
                name: expected.name.clone(),
                reason: expected
                    .reason
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "declared unreachable by the screen list".to_string()),
            };
        }

        let required = &expected.required_preferences;
        let states: Vec<&StateObservation> = self
            .observations
            .states
            .iter()
            .filter(|s| s.world_state.satisfies(required) && !s.screens.is_empty())
            .collect();

        if states.is_empty() {
            return unreachable(
                expected,
                format!(
                    "no snapshots captured under a world state satisfying {}",
                    required.label()
                ),
            );
        }

        let mut routes = Vec::new();
        let mut failures = Vec::new();

        if let Some(steps) = &expected.candidate_steps {
            for state in &states {
                match validate_steps(steps, state) {
                    Ok(actions) => routes.push(Route {
                        world_state: state.world_state.clone(),
                        actions,
                        fingerprint: None,
                        from_candidate: true,
                    }),
                    Err(reason) => failures.push(reason),
                }
            }
        }

        // Discovered paths compete only with a validated proposal, or
        // stand in when nothing was proposed.
        let keywords = expected.intent_keywords();
        if expected.candidate_steps.is_none() || !routes.is_empty() {
            for state in &states {
                for screen in &state.screens {
                    if matches_intent(screen, &keywords) && path_is_grounded(&screen.path, state) {
                        routes.push(Route {
                            world_state: state.world_state.clone(),
                            actions: screen.path.clone(),
                            fingerprint: Some(screen.snapshot.fingerprint.clone()),
                            from_candidate: false,
                        });
                    }
                }
            }
        }

        // Shortest wins; on a tie the proposal beats a discovered path.
        let best = routes
            .into_iter()
            .enumerate()
            .min_by_key(|(i, r)| (r.actions.len(), !r.from_candidate, *i))
            .map(|(_, r)| r);

        match best {
            Some(route) => {
                debug!(
                    "'{}' reachable in {} actions under '{}'",
                    expected.name,
                    route.actions.len(),
                    route.world_state.label()
                );
                ReachabilityVerdict::Reachable {
                    name: expected.name.clone(),
                    world_state: route.world_state,
                    actions: route.actions,
                    caption: expected.caption.clone(),
                    fingerprint: route.fingerprint,
                }
            }
            None => {
                let reason = match failures.first() {
                    Some(first) => first.clone(),
                    None if expected.candidate_steps.is_none() => format!(
                        "no candidate steps and no discovered screen matching {:?}",
                        keywords
                    ),
                    None => "no validated navigation".to_string(),
                };
                unreachable(expected, reason)
            }
        }
    }
}

fn unreachable(expected: &ExpectedScreen, reason: String) -> ReachabilityVerdict {
    debug!("'{}' unreachable: {}", expected.name, reason);
    ReachabilityVerdict::Unreachable {
        name: expected.name.clone(),
        reason,
    }
}

/// Turn proposed steps into element-exact actions using only elements
/// observed under `state`.
pub fn validate_steps(
    steps: &[CandidateStep],
    state: &StateObservation,
) -> Result<Vec<Action>, String> {
    let mut actions = Vec::with_capacity(steps.len());
    for step in steps {
        if let Some(action) = step.element_free_action() {
            actions.push(action);
            continue;
        }
        let element = resolve_step(step, state).ok_or_else(|| {
            format!(
                "no element matching {} in any captured snapshot for {}",
                step,
                state.world_state.label()
            )
        })?;
        actions.push(Action::tap(element));
    }
    Ok(actions)
}

/// Find the observed element a tap step refers to.
///
/// The requested role is tried first; failing that, an element with the
/// same label under another role is used with its observed role. A plain
/// `tap` prefers buttons.
fn resolve_step<'s>(step: &CandidateStep, state: &'s StateObservation) -> Option<&'s Element> {
    let snapshots = || state.screens.iter().map(|s| &s.snapshot);
    match step {
        CandidateStep::TapId(id) => snapshots().find_map(|snap| {
            snap.elements
                .iter()
                .find(|e| e.identifier.as_deref() == Some(id.as_str()))
        }),
        CandidateStep::Tap { role, key } => {
            let preferred = role.unwrap_or(ElementRole::Button);
            snapshots()
                .find_map(|snap| snap.find(Some(preferred), key))
                .or_else(|| snapshots().find_map(|snap| snap.find(None, key)))
        }
        _ => None,
    }
}

/// Whether every tap on `path` targets an element observed under `state`.
fn path_is_grounded(path: &[Action], state: &StateObservation) -> bool {
    path.iter().all(|action| match action {
        Action::Tap { selector, .. } => state
            .screens
            .iter()
            .any(|s| s.snapshot.elements.iter().any(|e| selector.matches(e))),
        _ => true,
    })
}

/// A discovered screen matches when the label of the action that reached
/// it, or its leading static text, mentions one of the keywords.
fn matches_intent(screen: &ObservedScreen, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let mut haystacks: Vec<String> = Vec::new();
    if let Some(Action::Tap { selector, .. }) = screen.path.last() {
        haystacks.push(selector_text(selector));
    }
    if let Some(title) = screen.snapshot.texts().first() {
        haystacks.push(title.to_lowercase());
    }
    haystacks
        .iter()
        .any(|h| keywords.iter().any(|k| h.contains(k.as_str())))
}

fn selector_text(selector: &Selector) -> String {
    selector.value().to_lowercase()
}
