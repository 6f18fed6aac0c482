use screen_discovery::explorer::action::{Action, Selector, SwipeDirection};
use screen_discovery::explorer::driver::{
    ObservationSet, ObservedScreen, StateObservation, dump_states,
};
use screen_discovery::explorer::world_state::WorldState;
use screen_discovery::reconcile::expected::{CandidateStep, ExpectedScreen, ReachabilityVerdict};
use screen_discovery::reconcile::reconciler::{Reconciler, validate_steps};
use screen_discovery::screen::element::ElementRole;

use crate::common::{button, config, onboarded, onboarding_app, premium, settings_help_app, snapshot, text};

mod common;

/// Dump of the onboarding app under default, onboarded, and premium.
fn observations() -> ObservationSet {
    let mut app = onboarding_app();
    dump_states(&mut app, &[onboarded(), premium()], &config())
}

fn reason(verdict: &ReachabilityVerdict) -> &str {
    match verdict {
        ReachabilityVerdict::Unreachable { reason, .. } => reason,
        ReachabilityVerdict::Reachable { .. } => panic!("expected unreachable: {:?}", verdict),
    }
}

fn actions(verdict: &ReachabilityVerdict) -> &[Action] {
    match verdict {
        ReachabilityVerdict::Reachable { actions, .. } => actions,
        ReachabilityVerdict::Unreachable { reason, .. } => panic!("unreachable: {}", reason),
    }
}

// =========================================================================
// Candidate validation
// =========================================================================

#[test]
fn invented_button_is_unreachable_with_reason() {
    let obs = observations();
    let paywall = ExpectedScreen::new("premium-paywall")
        .requiring(premium())
        .with_steps(vec![CandidateStep::tap("Upgrade")]);

    let verdict = Reconciler::new(&obs).reconcile(&paywall);

    assert!(!verdict.is_reachable());
    assert_eq!(verdict.name(), "premium-paywall");
    let why = reason(&verdict);
    assert!(!why.is_empty());
    assert!(why.contains("Upgrade"), "reason: {}", why);
}

#[test]
fn failed_proposal_is_not_replaced_by_a_keyword_match() {
    // The root's title mentions "upgrade", but no "Upgrade" control exists.
    let obs = ObservationSet {
        states: vec![StateObservation {
            world_state: premium(),
            screens: vec![ObservedScreen {
                name: Some("root".into()),
                path: Vec::new(),
                snapshot: snapshot(vec![text("Upgrade complete"), button("Continue")]),
            }],
            error: None,
        }],
    };
    let upgrade = ExpectedScreen::new("upgrade")
        .requiring(premium())
        .with_steps(vec![CandidateStep::tap("Upgrade")]);

    let verdict = Reconciler::new(&obs).reconcile(&upgrade);

    assert!(!verdict.is_reachable(), "tap \"Upgrade\" was never observed");
    assert!(reason(&verdict).contains("Upgrade"));
}

#[test]
fn keyword_match_stands_in_when_nothing_was_proposed() {
    let obs = ObservationSet {
        states: vec![StateObservation {
            world_state: premium(),
            screens: vec![ObservedScreen {
                name: Some("root".into()),
                path: Vec::new(),
                snapshot: snapshot(vec![text("Upgrade complete"), button("Continue")]),
            }],
            error: None,
        }],
    };
    let upgrade = ExpectedScreen::new("upgrade").requiring(premium());

    let verdict = Reconciler::new(&obs).reconcile(&upgrade);
    assert!(actions(&verdict).is_empty());
}

#[test]
fn observed_tab_is_reachable() {
    let obs = observations();
    let search = ExpectedScreen::new("Search")
        .requiring(onboarded())
        .with_steps(vec![CandidateStep::tap_role(ElementRole::Tab, "Search")])
        .with_caption("Find anything");

    let verdict = Reconciler::new(&obs).reconcile(&search);

    match verdict {
        ReachabilityVerdict::Reachable {
            world_state,
            actions,
            caption,
            ..
        } => {
            assert_eq!(world_state, onboarded());
            assert_eq!(actions, vec![Action::tap_label(ElementRole::Tab, "Search")]);
            assert_eq!(caption.as_deref(), Some("Find anything"));
        }
        other => panic!("expected reachable, got {:?}", other),
    }
}

#[test]
fn plain_tap_takes_the_observed_role() {
    let obs = observations();
    let search = ExpectedScreen::new("Search")
        .requiring(onboarded())
        .with_steps(vec![CandidateStep::tap("Search")]);

    let verdict = Reconciler::new(&obs).reconcile(&search);

    // no button labelled "Search" exists; the tab is used instead
    assert_eq!(
        actions(&verdict),
        &[Action::tap_label(ElementRole::Tab, "Search")]
    );
}

#[test]
fn candidate_wins_a_tie_with_discovery() {
    let obs = observations();
    let search = ExpectedScreen::new("search")
        .requiring(onboarded())
        .with_steps(vec![CandidateStep::tap_role(ElementRole::Tab, "Search")]);

    let verdict = Reconciler::new(&obs).reconcile(&search);

    match verdict {
        ReachabilityVerdict::Reachable { fingerprint, .. } => assert!(fingerprint.is_none()),
        other => panic!("expected reachable, got {:?}", other),
    }
}

#[test]
fn label_match_is_exact() {
    let mut app = settings_help_app();
    let obs = dump_states(&mut app, &[], &config());
    let settings = ExpectedScreen::new("x").with_steps(vec![CandidateStep::tap("Sett")]);

    let verdict = Reconciler::new(&obs).reconcile(&settings);
    assert!(!verdict.is_reachable());
}

#[test]
fn element_free_steps_pass_through() {
    let mut app = settings_help_app();
    let obs = dump_states(&mut app, &[], &config());
    let screen = ExpectedScreen::new("help").with_steps(vec![
        CandidateStep::Wait { seconds: 1.5 },
        CandidateStep::tap("Help"),
        CandidateStep::Swipe(SwipeDirection::Up),
    ]);

    let verdict = Reconciler::new(&obs).reconcile(&screen);
    assert_eq!(
        actions(&verdict),
        &[
            Action::Wait { duration_ms: 1500 },
            Action::tap_label(ElementRole::Button, "Help"),
            Action::swipe(SwipeDirection::Up),
        ]
    );
}

#[test]
fn empty_navigation_means_the_launch_screen() {
    let obs = observations();
    let welcome = ExpectedScreen::new("welcome").with_steps(Vec::new());

    let verdict = Reconciler::new(&obs).reconcile(&welcome);
    assert!(actions(&verdict).is_empty());
}

#[test]
fn tap_by_identifier_uses_identifier_selector() {
    let state = StateObservation {
        world_state: WorldState::empty(),
        screens: vec![ObservedScreen {
            name: None,
            path: Vec::new(),
            snapshot: snapshot(vec![
                text("Plans"),
                button("").with_identifier("upgrade.cta"),
            ]),
        }],
        error: None,
    };

    let actions = validate_steps(&[CandidateStep::TapId("upgrade.cta".into())], &state).unwrap();
    assert_eq!(
        actions,
        vec![Action::Tap {
            role: ElementRole::Button,
            selector: Selector::Identifier("upgrade.cta".into()),
        }]
    );
}

#[test]
fn validation_stops_at_first_unmatched_step() {
    let state = StateObservation {
        world_state: WorldState::empty(),
        screens: vec![ObservedScreen {
            name: None,
            path: Vec::new(),
            snapshot: snapshot(vec![button("Settings")]),
        }],
        error: None,
    };

    let err = validate_steps(
        &[CandidateStep::tap("Settings"), CandidateStep::tap("Privacy")],
        &state,
    )
    .unwrap_err();
    assert!(err.contains("tap \"Privacy\""));
    assert!(err.contains("default"));
}

// =========================================================================
// World-state filtering and declared verdicts
// =========================================================================

#[test]
fn no_satisfying_state_is_unreachable() {
    let mut app = onboarding_app();
    let obs = dump_states(&mut app, &[onboarded()], &config());
    let paywall = ExpectedScreen::new("paywall")
        .requiring(premium())
        .with_steps(vec![CandidateStep::tap("Welcome")]);

    let verdict = Reconciler::new(&obs).reconcile(&paywall);
    assert!(reason(&verdict).contains("no snapshots captured"));
}

#[test]
fn failed_state_observations_are_ignored() {
    let mut app = onboarding_app().reject_preference("premium");
    let obs = dump_states(&mut app, &[premium()], &config());
    let paywall = ExpectedScreen::new("paywall")
        .requiring(premium())
        .with_steps(Vec::new());

    let verdict = Reconciler::new(&obs).reconcile(&paywall);
    assert!(!verdict.is_reachable());
}

#[test]
fn elements_from_other_states_do_not_count() {
    let obs = observations();
    // "Search" exists only once onboarded; the default state cannot use it
    let screen = ExpectedScreen::new("x")
        .requiring(premium())
        .with_steps(vec![CandidateStep::tap("Search")]);

    let verdict = Reconciler::new(&obs).reconcile(&screen);
    assert!(!verdict.is_reachable());
}

#[test]
fn declared_unreachable_keeps_its_reason() {
    let obs = observations();
    let screen = ExpectedScreen::new("Crash reporter").declared_unreachable("needs a crash");

    let verdict = Reconciler::new(&obs).reconcile(&screen);
    assert_eq!(reason(&verdict), "needs a crash");
}

#[test]
fn declared_unreachable_without_reason_gets_one() {
    let obs = observations();
    let mut screen = ExpectedScreen::new("Hidden");
    screen.reachable = false;

    let verdict = Reconciler::new(&obs).reconcile(&screen);
    assert!(!reason(&verdict).is_empty());
}

// =========================================================================
// Discovered paths
// =========================================================================

#[test]
fn discovered_screen_matches_by_name_keyword() {
    let obs = observations();
    let profile = ExpectedScreen::new("05-profile").requiring(onboarded());

    let verdict = Reconciler::new(&obs).reconcile(&profile);

    match verdict {
        ReachabilityVerdict::Reachable {
            actions,
            fingerprint,
            ..
        } => {
            assert_eq!(actions, vec![Action::tap_label(ElementRole::Tab, "Profile")]);
            assert_eq!(
                fingerprint.as_ref(),
                Some(&obs.states[1].screens[2].snapshot.fingerprint)
            );
        }
        other => panic!("expected reachable, got {:?}", other),
    }
}

#[test]
fn shorter_discovered_path_beats_longer_candidate() {
    let obs = observations();
    let profile = ExpectedScreen::new("profile")
        .requiring(onboarded())
        .with_steps(vec![CandidateStep::tap("Home"), CandidateStep::tap("Profile")]);

    let verdict = Reconciler::new(&obs).reconcile(&profile);
    assert_eq!(actions(&verdict).len(), 1);
}

#[test]
fn no_steps_and_no_match_is_unreachable() {
    let obs = observations();
    let screen = ExpectedScreen::new("04-billing-history").requiring(onboarded());

    let verdict = Reconciler::new(&obs).reconcile(&screen);
    let why = reason(&verdict);
    assert!(why.contains("billing"), "reason: {}", why);
}

#[test]
fn intent_keywords_skip_numbers_and_short_words() {
    let screen = ExpectedScreen::new("03-premium-paywall_of");
    assert_eq!(screen.intent_keywords(), vec!["premium", "paywall"]);
}

// =========================================================================
// Soundness
// =========================================================================

#[test]
fn every_reachable_tap_was_observed_under_a_satisfying_state() {
    let obs = observations();
    let expected = vec![
        ExpectedScreen::new("home").with_steps(Vec::new()),
        ExpectedScreen::new("search").requiring(onboarded()),
        ExpectedScreen::new("profile")
            .requiring(onboarded())
            .with_steps(vec![CandidateStep::tap("Profile")]),
        ExpectedScreen::new("upgrade")
            .requiring(premium())
            .with_steps(vec![CandidateStep::tap("Upgrade")]),
        ExpectedScreen::new("settings").with_steps(vec![CandidateStep::tap("Settings")]),
    ];
    let lookup: std::collections::HashMap<&str, &ExpectedScreen> =
        expected.iter().map(|e| (e.name.as_str(), e)).collect();

    let verdicts = Reconciler::new(&obs).reconcile_all(&expected);
    assert_eq!(verdicts.len(), expected.len());

    for verdict in &verdicts {
        let ReachabilityVerdict::Reachable {
            name,
            world_state,
            actions,
            ..
        } = verdict
        else {
            assert!(!reason(verdict).is_empty());
            continue;
        };
        let required = &lookup[name.as_str()].required_preferences;
        assert!(world_state.satisfies(required));

        for action in actions {
            let Action::Tap { selector, .. } = action else {
                continue;
            };
            let seen = obs
                .states
                .iter()
                .filter(|s| s.world_state.satisfies(required))
                .flat_map(|s| &s.screens)
                .any(|s| s.snapshot.elements.iter().any(|e| selector.matches(e)));
            assert!(seen, "{} taps unobserved {}", name, selector);
        }
    }

    assert!(verdicts[0].is_reachable());
    assert!(verdicts[1].is_reachable());
    assert!(verdicts[2].is_reachable());
    assert!(!verdicts[3].is_reachable());
    assert!(!verdicts[4].is_reachable());
}

// =========================================================================
// Screen list parsing
// =========================================================================

#[test]
fn compact_steps_parse_from_yaml() {
    let yaml = r#"
- name: 02-search
  defaults:
    onboardingDone: true
  caption: Find anything
  navigation:
    - Search
    - tap_tab: Profile
    - wait: 2
    - swipe: left
    - tap_id: settings.button
    - alert_accept: true
    - back: true
- name: 09-crash
  reachable: false
  reason: requires a crash
"#;
    let screens: Vec<ExpectedScreen> = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(screens[0].required_preferences, onboarded());
    assert_eq!(screens[0].caption.as_deref(), Some("Find anything"));
    let steps = screens[0].candidate_steps.as_ref().unwrap();
    assert_eq!(steps[0], CandidateStep::tap("Search"));
    assert_eq!(steps[1], CandidateStep::tap_role(ElementRole::Tab, "Profile"));
    assert_eq!(
        steps[2].element_free_action(),
        Some(Action::Wait { duration_ms: 2000 })
    );
    assert_eq!(steps[3], CandidateStep::Swipe(SwipeDirection::Left));
    assert_eq!(steps[4], CandidateStep::TapId("settings.button".into()));
    assert_eq!(steps[6], CandidateStep::Back);

    assert!(screens[0].reachable);
    assert!(!screens[1].reachable);
    assert!(screens[1].candidate_steps.is_none());
}

#[test]
fn unknown_step_key_is_rejected() {
    let yaml = r#"
- name: x
  navigation:
    - teleport: Home
"#;
    let err = serde_yaml::from_str::<Vec<ExpectedScreen>>(yaml).unwrap_err();
    assert!(err.to_string().contains("teleport"));
}

#[test]
fn verdicts_serialize_with_verdict_tag() {
    let verdict = ReachabilityVerdict::Unreachable {
        name: "paywall".into(),
        reason: "no element".into(),
    };
    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["verdict"], "unreachable");
    assert_eq!(json["reason"], "no element");
}
