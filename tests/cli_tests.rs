use clap::Parser;
use screen_discovery::cli::commands::{
    cmd_reconcile, install_app, load_expected_screens, load_observations, load_world_states,
};
use screen_discovery::cli::config::{
    AgentSettings, AppConfig, Cli, Commands, ExploreSettings, LimitOverrides,
    build_explorer_config, default_log_filter, load_config, resolve_agent_command,
};
use screen_discovery::explorer::driver::{ObservationSet, dump_states, run_world_states};
use screen_discovery::explorer::screenshots::NoScreenshots;
use screen_discovery::trace::logger::TraceLogger;

use crate::common::{config, onboarded, onboarding_app, settings_help_app};

mod common;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

// ============================================================================
// CLI Argument Parsing Tests
// ============================================================================

#[test]
fn cli_parse_explore_minimal() {
    let cli = Cli::parse_from([
        "screen-discovery",
        "explore",
        "--device",
        "booted",
        "--bundle-id",
        "com.example.app",
    ]);
    match cli.command {
        Commands::Explore {
            device,
            bundle_id,
            states,
            max_depth,
            output_dir,
            agent,
            ..
        } => {
            assert_eq!(device, "booted");
            assert_eq!(bundle_id, "com.example.app");
            assert!(states.is_none());
            assert!(max_depth.is_none());
            assert!(output_dir.is_none());
            assert!(agent.is_none());
        }
        _ => panic!("Expected Explore command"),
    }
}

#[test]
fn cli_parse_explore_all_args() {
    let cli = Cli::parse_from([
        "screen-discovery",
        "explore",
        "--device",
        "ABC-123",
        "--bundle-id",
        "com.example.app",
        "--states",
        "states.yaml",
        "--max-depth",
        "2",
        "--max-screens",
        "12",
        "--max-actions",
        "4",
        "--output-dir",
        "shots",
        "--report",
        "report.json",
        "--trace",
        "trace.jsonl",
        "--agent",
        "xcrun",
        "ui-agent",
        "--port",
    ]);
    match cli.command {
        Commands::Explore {
            states,
            max_depth,
            max_screens,
            max_actions,
            output_dir,
            report,
            trace,
            agent,
            ..
        } => {
            assert_eq!(states.as_deref(), Some("states.yaml"));
            assert_eq!(max_depth, Some(2));
            assert_eq!(max_screens, Some(12));
            assert_eq!(max_actions, Some(4));
            assert_eq!(output_dir.as_deref(), Some("shots"));
            assert_eq!(report.as_deref(), Some("report.json"));
            assert_eq!(trace.as_deref(), Some("trace.jsonl"));
            assert_eq!(
                agent,
                Some(vec![
                    "xcrun".to_string(),
                    "ui-agent".to_string(),
                    "--port".to_string()
                ])
            );
        }
        _ => panic!("Expected Explore command"),
    }
}

#[test]
fn cli_parse_dump() {
    let cli = Cli::parse_from([
        "screen-discovery",
        "dump",
        "--device",
        "booted",
        "--bundle-id",
        "com.example.app",
        "-o",
        "obs.json",
    ]);
    match cli.command {
        Commands::Dump { output, states, .. } => {
            assert_eq!(output.as_deref(), Some("obs.json"));
            assert!(states.is_none());
        }
        _ => panic!("Expected Dump command"),
    }
}

#[test]
fn cli_parse_app_bundle() {
    let explore = Cli::parse_from([
        "screen-discovery",
        "explore",
        "--device",
        "booted",
        "--bundle-id",
        "com.example.app",
        "--app",
        "build/Demo.app",
    ]);
    match explore.command {
        Commands::Explore { app, .. } => assert_eq!(app.as_deref(), Some("build/Demo.app")),
        _ => panic!("Expected Explore command"),
    }

    let dump = Cli::parse_from([
        "screen-discovery",
        "dump",
        "--device",
        "booted",
        "--bundle-id",
        "com.example.app",
    ]);
    match dump.command {
        Commands::Dump { app, .. } => assert!(app.is_none()),
        _ => panic!("Expected Dump command"),
    }
}

#[test]
fn cli_parse_reconcile() {
    let cli = Cli::parse_from([
        "screen-discovery",
        "reconcile",
        "--expected",
        "screens.yaml",
        "--observations",
        "obs.json",
    ]);
    match cli.command {
        Commands::Reconcile {
            expected,
            observations,
            output,
        } => {
            assert_eq!(expected, "screens.yaml");
            assert_eq!(observations, "obs.json");
            assert!(output.is_none());
        }
        _ => panic!("Expected Reconcile command"),
    }
}

#[test]
fn cli_parse_global_flags() {
    let cli = Cli::parse_from([
        "screen-discovery",
        "-vv",
        "--config",
        "custom.yaml",
        "reconcile",
        "--expected",
        "a.yaml",
        "--observations",
        "b.json",
    ]);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.config.as_deref(), Some("custom.yaml"));
}

#[test]
fn cli_requires_device_for_explore() {
    let result = Cli::try_parse_from(["screen-discovery", "explore", "--bundle-id", "x"]);
    assert!(result.is_err());
}

#[test]
fn verbosity_maps_to_log_filter() {
    assert_eq!(default_log_filter(0), "warn");
    assert_eq!(default_log_filter(1), "info");
    assert_eq!(default_log_filter(2), "debug");
    assert_eq!(default_log_filter(7), "trace");
}

// ============================================================================
// Config File Tests
// ============================================================================

#[test]
fn config_load_missing_file() {
    let config = load_config(Some("nonexistent_file_that_does_not_exist.yaml"));
    assert!(config.explore.max_depth.is_none());
    assert_eq!(config.agent.command, vec!["ui-agent".to_string()]);
    assert_eq!(config.settle.launch_ms, 3000);
}

#[test]
fn config_load_malformed_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bad.yaml", "explore: [not, a, map");
    let config = load_config(Some(&path));
    assert!(config.explore.max_screens.is_none());
}

#[test]
fn config_partial_yaml() {
    let yaml = r#"
explore:
  max_screens: 50
  probe_swipes: false
agent:
  command: ["xcrun", "agent"]
settle:
  action_ms: 500
"#;
    let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.explore.max_screens, Some(50));
    assert_eq!(config.explore.probe_swipes, Some(false));
    assert!(config.explore.max_depth.is_none());
    assert_eq!(config.agent.command, vec!["xcrun", "agent"]);
    assert_eq!(config.settle.action_ms, 500);
    // unset settle fields keep their defaults
    assert_eq!(config.settle.launch_ms, 3000);
}

// ============================================================================
// Builder / Helper Tests
// ============================================================================

#[test]
fn explorer_config_defaults() {
    let config = build_explorer_config(LimitOverrides::default(), &ExploreSettings::default());
    assert_eq!(config.max_depth, 3);
    assert_eq!(config.max_screens, 30);
    assert_eq!(config.max_actions, 15);
    assert!(config.probe_swipes);
}

#[test]
fn explorer_config_cli_beats_file() {
    let file = ExploreSettings {
        max_depth: Some(5),
        max_screens: Some(40),
        max_cells: Some(2),
        ..ExploreSettings::default()
    };
    let cli = LimitOverrides {
        max_depth: Some(1),
        ..LimitOverrides::default()
    };
    let config = build_explorer_config(cli, &file);
    assert_eq!(config.max_depth, 1);
    assert_eq!(config.max_screens, 40);
    assert_eq!(config.max_cells, 2);
    assert_eq!(config.max_actions, 15);
}

#[test]
fn agent_command_resolution() {
    let file = AgentSettings {
        command: vec!["from-file".into()],
    };
    assert_eq!(resolve_agent_command(None, &file), vec!["from-file"]);
    assert_eq!(resolve_agent_command(Some(Vec::new()), &file), vec!["from-file"]);
    assert_eq!(
        resolve_agent_command(Some(vec!["cli".into()]), &file),
        vec!["cli"]
    );
}

#[test]
fn install_app_installs_given_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("Demo.app");
    std::fs::create_dir(&bundle).unwrap();
    let mut app = settings_help_app();

    install_app(&mut app, bundle.to_str()).unwrap();
    assert_eq!(app.installed(), [bundle.display().to_string()]);
}

#[test]
fn install_app_without_bundle_is_a_no_op() {
    let mut app = settings_help_app();
    install_app(&mut app, None).unwrap();
    assert!(app.installed().is_empty());
}

#[test]
fn install_app_rejects_missing_bundle() {
    let mut app = settings_help_app();
    let err = install_app(&mut app, Some("/nonexistent/Demo.app")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/Demo.app"));
    assert!(app.installed().is_empty());
}

// ============================================================================
// Input Loading Tests
// ============================================================================

#[test]
fn load_world_states_yaml_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = write(&dir, "states.yaml", "- onboardingDone: true\n- premium: true\n");
    let json = write(&dir, "states.json", r#"[{"onboardingDone": true}]"#);

    let from_yaml = load_world_states(&yaml).unwrap();
    assert_eq!(from_yaml.len(), 2);
    assert_eq!(from_yaml[0], onboarded());

    let from_json = load_world_states(&json).unwrap();
    assert_eq!(from_json, vec![onboarded()]);
}

#[test]
fn load_expected_screens_bare_and_wrapped() {
    let dir = tempfile::tempdir().unwrap();
    let bare = write(&dir, "bare.yaml", "- name: home\n- name: search\n");
    let wrapped = write(
        &dir,
        "wrapped.yaml",
        "screens:\n  - name: home\n    navigation: []\n",
    );

    assert_eq!(load_expected_screens(&bare).unwrap().len(), 2);
    let screens = load_expected_screens(&wrapped).unwrap();
    assert_eq!(screens[0].name, "home");
    assert_eq!(screens[0].candidate_steps, Some(Vec::new()));
}

#[test]
fn load_expected_screens_rejects_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "empty.yaml", "[]\n");
    assert!(load_expected_screens(&path).is_err());
}

#[test]
fn load_missing_file_is_an_io_error() {
    let err = load_world_states("/nonexistent/states.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/states.yaml"));
}

#[test]
fn load_observations_accepts_report_or_dump() {
    let dir = tempfile::tempdir().unwrap();

    let mut app = onboarding_app();
    let report = run_world_states(
        &mut app,
        &[onboarded()],
        &config(),
        &TraceLogger::disabled(),
        &mut NoScreenshots,
    );
    let report_path = write(&dir, "report.json", &serde_json::to_string(&report).unwrap());

    let mut app = onboarding_app();
    let dump = dump_states(&mut app, &[onboarded()], &config());
    let dump_path = write(&dir, "obs.json", &serde_json::to_string(&dump).unwrap());

    let from_report = load_observations(&report_path).unwrap();
    assert_eq!(from_report.screen_count(), report.total_screens);
    assert_eq!(
        from_report.states[1].screens[0].name.as_deref(),
        Some("01-initial")
    );

    let from_dump = load_observations(&dump_path).unwrap();
    assert_eq!(from_dump.screen_count(), dump.screen_count());
}

#[test]
fn load_observations_reads_report_with_duration() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = onboarding_app();
    let report = run_world_states(
        &mut app,
        &[onboarded()],
        &config(),
        &TraceLogger::disabled(),
        &mut NoScreenshots,
    )
    .with_duration(1234);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"duration_ms\":1234"));
    let path = write(&dir, "report.json", &json);

    let observations = load_observations(&path).unwrap();
    assert_eq!(observations.states.len(), 2);
    assert_eq!(observations.screen_count(), report.total_screens);
}

#[test]
fn load_observations_reports_malformed_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "report.json", r#"{"passes": "not a list"}"#);

    let err = load_observations(&path).unwrap_err();
    assert!(err.to_string().contains("report.json"));
}

// ============================================================================
// reconcile subcommand
// ============================================================================

fn observations_file(dir: &tempfile::TempDir) -> String {
    let mut app = onboarding_app();
    let observations: ObservationSet = dump_states(&mut app, &[onboarded()], &config());
    write(dir, "obs.json", &serde_json::to_string(&observations).unwrap())
}

#[test]
fn reconcile_writes_capture_plan() {
    let dir = tempfile::tempdir().unwrap();
    let obs = observations_file(&dir);
    let expected = write(
        &dir,
        "screens.yaml",
        r#"
- name: 01-welcome
  navigation: []
- name: 02-search
  defaults: {onboardingDone: true}
  navigation:
    - tap: Search
"#,
    );
    let out = dir.path().join("plan.json");

    let all_reachable = cmd_reconcile(&expected, &obs, out.to_str()).unwrap();
    assert!(all_reachable);

    let plan: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(plan["targets"].as_array().unwrap().len(), 2);
    assert!(plan["unreachable"].as_array().unwrap().is_empty());
}

#[test]
fn reconcile_reports_unreachable_screens() {
    let dir = tempfile::tempdir().unwrap();
    let obs = observations_file(&dir);
    let expected = write(
        &dir,
        "screens.yaml",
        r#"
screens:
  - name: 03-upgrade
    navigation:
      - tap: Upgrade
"#,
    );
    let out = dir.path().join("plan.json");

    let all_reachable = cmd_reconcile(&expected, &obs, out.to_str()).unwrap();
    assert!(!all_reachable);

    let plan: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(plan["unreachable"][0]["name"], "03-upgrade");
    assert!(
        plan["unreachable"][0]["reason"]
            .as_str()
            .is_some_and(|r| !r.is_empty())
    );
}
