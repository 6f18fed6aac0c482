use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::device::simulator::SettleConfig;
use crate::explorer::app_map::ExplorerConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "screen-discovery",
    version,
    about = "Discover and map every screen of a mobile app for store screenshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: screen-discovery.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the app once per world state and record every screen
    Explore {
        /// Simulator UDID
        #[arg(long)]
        device: String,

        /// App bundle identifier
        #[arg(long)]
        bundle_id: String,

        /// Built .app bundle to install before exploring
        #[arg(long)]
        app: Option<String>,

        /// YAML/JSON list of world states (preference maps)
        #[arg(long)]
        states: Option<String>,

        /// Maximum action-path length
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum screens per world state
        #[arg(long)]
        max_screens: Option<usize>,

        /// Maximum buttons tried per screen
        #[arg(long)]
        max_actions: Option<usize>,

        /// Directory for per-screen screenshots
        #[arg(long)]
        output_dir: Option<String>,

        /// JSON report path
        #[arg(long)]
        report: Option<String>,

        /// JSONL crawl trace path
        #[arg(long)]
        trace: Option<String>,

        /// UI agent command (program and arguments)
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        agent: Option<Vec<String>>,
    },

    /// Snapshot the root screen and each tab per world state
    Dump {
        #[arg(long)]
        device: String,

        #[arg(long)]
        bundle_id: String,

        #[arg(long)]
        app: Option<String>,

        #[arg(long)]
        states: Option<String>,

        /// Observations JSON path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        agent: Option<Vec<String>>,
    },

    /// Validate expected screens against recorded observations
    Reconcile {
        /// YAML/JSON expected-screen list
        #[arg(long)]
        expected: String,

        /// Observations JSON (from `dump`) or a discovery report (from `explore`)
        #[arg(long)]
        observations: String,

        /// Capture plan JSON path (default: console only)
        #[arg(short, long)]
        output: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `screen-discovery.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub explore: ExploreSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub settle: SettleConfig,
}

/// Crawl limits; every unset field falls back to `ExplorerConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExploreSettings {
    pub max_depth: Option<usize>,
    pub max_screens: Option<usize>,
    pub max_actions: Option<usize>,
    pub max_cells: Option<usize>,
    pub max_iterations: Option<usize>,
    pub probe_swipes: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_command")]
    pub command: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
        }
    }
}

fn default_agent_command() -> Vec<String> {
    vec!["ui-agent".to_string()]
}

// ============================================================================
// Config File Loading
// ============================================================================

pub const DEFAULT_CONFIG_FILE: &str = "screen-discovery.yaml";

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring malformed config '{}': {}", config_path, e);
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Command-line overrides for crawl limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOverrides {
    pub max_depth: Option<usize>,
    pub max_screens: Option<usize>,
    pub max_actions: Option<usize>,
}

/// Resolve each limit as CLI flag > config file > built-in default.
pub fn build_explorer_config(cli: LimitOverrides, file: &ExploreSettings) -> ExplorerConfig {
    let defaults = ExplorerConfig::default();
    ExplorerConfig {
        max_depth: cli.max_depth.or(file.max_depth).unwrap_or(defaults.max_depth),
        max_screens: cli
            .max_screens
            .or(file.max_screens)
            .unwrap_or(defaults.max_screens),
        max_actions: cli
            .max_actions
            .or(file.max_actions)
            .unwrap_or(defaults.max_actions),
        max_cells: file.max_cells.unwrap_or(defaults.max_cells),
        max_iterations: file.max_iterations.unwrap_or(defaults.max_iterations),
        probe_swipes: file.probe_swipes.unwrap_or(defaults.probe_swipes),
        ..defaults
    }
}

/// Agent command: CLI flag > config file > default.
pub fn resolve_agent_command(cli: Option<Vec<String>>, file: &AgentSettings) -> Vec<String> {
    cli.filter(|c| !c.is_empty())
        .unwrap_or_else(|| file.command.clone())
}

/// Map `-v` count onto a default tracing filter.
pub fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
