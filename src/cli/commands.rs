use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::config::{AppConfig, LimitOverrides, build_explorer_config, resolve_agent_command};
use crate::device::controller::DeviceController;
use crate::device::simulator::SimulatorDevice;
use crate::error::DiscoveryError;
use crate::explorer::driver::{ObservationSet, dump_states, run_world_states};
use crate::explorer::screenshots::{DirectorySink, NoScreenshots, ScreenshotSink};
use crate::explorer::world_state::WorldState;
use crate::reconcile::expected::ExpectedScreen;
use crate::reconcile::reconciler::Reconciler;
use crate::report::console::{format_discovery_report, format_reconcile_report};
use crate::report::report_model::{DiscoveryReport, ReconcileReport};
use crate::trace::logger::TraceLogger;

/// Install a freshly built app bundle, when one was given.
pub fn install_app<D: DeviceController + ?Sized>(
    device: &mut D,
    app: Option<&str>,
) -> Result<(), DiscoveryError> {
    let Some(path) = app else {
        return Ok(());
    };
    let path = Path::new(path);
    if !path.exists() {
        return Err(DiscoveryError::InvalidInput(format!(
            "app bundle {} does not exist",
            path.display()
        )));
    }
    info!("Installing {}", path.display());
    device.install(path)?;
    Ok(())
}

// ============================================================================
// explore subcommand
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ExploreArgs {
    pub device: String,
    pub bundle_id: String,
    pub app: Option<String>,
    pub states: Option<String>,
    pub limits: LimitOverrides,
    pub output_dir: Option<String>,
    pub report: Option<String>,
    pub trace: Option<String>,
    pub agent: Option<Vec<String>>,
}

/// Run the Multi-State Driver against a simulator. Returns whether every
/// pass completed without error.
pub fn cmd_explore(args: ExploreArgs, config: &AppConfig) -> Result<bool, DiscoveryError> {
    let explorer_config = build_explorer_config(args.limits, &config.explore);
    let states = match &args.states {
        Some(path) => load_world_states(path)?,
        None => Vec::new(),
    };
    let agent = resolve_agent_command(args.agent, &config.agent);
    let mut device = SimulatorDevice::new(&args.device, &args.bundle_id, agent, config.settle);
    install_app(&mut device, args.app.as_deref())?;

    let tracer = match &args.trace {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };
    let mut sink: Box<dyn ScreenshotSink> = match &args.output_dir {
        Some(dir) => Box::new(DirectorySink::new(dir).map_err(|e| DiscoveryError::Io {
            path: dir.clone(),
            source: e,
        })?),
        None => Box::new(NoScreenshots),
    };

    info!(
        "Exploring {} on {} (max_depth={}, max_screens={})",
        args.bundle_id, args.device, explorer_config.max_depth, explorer_config.max_screens
    );

    let report = run_world_states(&mut device, &states, &explorer_config, &tracer, sink.as_mut());
    print!("{}", format_discovery_report(&report));

    if let Some(path) = &args.report {
        write_json(path, &report)?;
        println!("Report written to: {}", path);
    }

    Ok(report.all_passed())
}

// ============================================================================
// dump subcommand
// ============================================================================

pub fn cmd_dump(
    device: &str,
    bundle_id: &str,
    app: Option<&str>,
    states: Option<&str>,
    output: Option<&str>,
    agent: Option<Vec<String>>,
    config: &AppConfig,
) -> Result<ObservationSet, DiscoveryError> {
    let explorer_config = build_explorer_config(LimitOverrides::default(), &config.explore);
    let states = match states {
        Some(path) => load_world_states(path)?,
        None => Vec::new(),
    };
    let agent = resolve_agent_command(agent, &config.agent);
    let mut device = SimulatorDevice::new(device, bundle_id, agent, config.settle);
    install_app(&mut device, app)?;

    let observations = dump_states(&mut device, &states, &explorer_config);

    match output {
        Some(path) => {
            write_json(path, &observations)?;
            println!(
                "Dumped {} screens across {} world states to: {}",
                observations.screen_count(),
                observations.states.len(),
                path
            );
        }
        None => println!("{}", to_json(&observations, "observations")?),
    }
    Ok(observations)
}

// ============================================================================
// reconcile subcommand
// ============================================================================

/// Reconcile expected screens against observations. Returns whether every
/// screen is reachable.
pub fn cmd_reconcile(
    expected_path: &str,
    observations_path: &str,
    output: Option<&str>,
) -> Result<bool, DiscoveryError> {
    let expected = load_expected_screens(expected_path)?;
    let observations = load_observations(observations_path)?;

    let verdicts = Reconciler::new(&observations).reconcile_all(&expected);
    let report = ReconcileReport::from_verdicts(verdicts);
    print!("{}", format_reconcile_report(&report));

    if let Some(path) = output {
        write_json(path, &report)?;
        println!("Capture plan written to: {}", path);
    }
    Ok(report.all_reachable())
}

// ============================================================================
// Input loading
// ============================================================================

fn read_file(path: &str) -> Result<String, DiscoveryError> {
    std::fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
        path: path.to_string(),
        source: e,
    })
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse YAML or JSON (by extension) into `T`.
fn parse_document<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T, DiscoveryError> {
    let content = read_file(path)?;
    if is_json(path) {
        serde_json::from_str(&content).map_err(|e| DiscoveryError::Json {
            path: path.to_string(),
            source: e,
        })
    } else {
        serde_yaml::from_str(&content).map_err(|e| DiscoveryError::Yaml {
            path: path.to_string(),
            source: e,
        })
    }
}

/// A list of preference maps. The empty state is added by the driver.
pub fn load_world_states(path: &str) -> Result<Vec<WorldState>, DiscoveryError> {
    parse_document(path)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpectedDocument {
    List(Vec<ExpectedScreen>),
    Wrapped { screens: Vec<ExpectedScreen> },
}

/// Either a bare list or `{ screens: [...] }`.
pub fn load_expected_screens(path: &str) -> Result<Vec<ExpectedScreen>, DiscoveryError> {
    let doc: ExpectedDocument = parse_document(path)?;
    let screens = match doc {
        ExpectedDocument::List(s) | ExpectedDocument::Wrapped { screens: s } => s,
    };
    if screens.is_empty() {
        return Err(DiscoveryError::InvalidInput(format!(
            "no expected screens in {}",
            path
        )));
    }
    Ok(screens)
}

/// Accepts the output of either `dump` or `explore --report`.
///
/// A report is recognised by its `passes` key so that a malformed report
/// surfaces its own parse error instead of a generic untagged mismatch.
pub fn load_observations(path: &str) -> Result<ObservationSet, DiscoveryError> {
    let content = read_file(path)?;
    let json_err = |e: serde_json::Error| DiscoveryError::Json {
        path: path.to_string(),
        source: e,
    };
    let value: serde_json::Value = serde_json::from_str(&content).map_err(json_err)?;
    if value.get("passes").is_some() {
        let report: DiscoveryReport = serde_json::from_value(value).map_err(json_err)?;
        Ok(ObservationSet::from_report(&report))
    } else {
        serde_json::from_value(value).map_err(json_err)
    }
}

// ============================================================================
// Output
// ============================================================================

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String, DiscoveryError> {
    serde_json::to_string_pretty(value).map_err(|e| DiscoveryError::Json {
        path: what.to_string(),
        source: e,
    })
}

fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), DiscoveryError> {
    let json = to_json(value, path)?;
    std::fs::write(path, json).map_err(|e| DiscoveryError::Io {
        path: path.to_string(),
        source: e,
    })
}
