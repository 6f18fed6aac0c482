use std::process::ExitStatus;

use thiserror::Error;

/// Failures of the execution environment itself.
///
/// Any of these reaching the crawler ends the current world-state pass;
/// screens recorded before the failure are kept.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Device cannot be reached, booted, or has stopped responding
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// Target bundle is not installed on the device
    #[error("App '{0}' is not installed")]
    AppNotInstalled(String),

    /// A helper process (xcrun, UI agent) failed to spawn
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A helper process exited with non-zero status
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Agent session stdin/stdout broke
    #[error("Agent session I/O error: {0}")]
    SessionIo(String),

    /// Agent answered with ok=false or an unexpected shape
    #[error("Agent command '{command}' failed: {error}")]
    SessionProtocol { command: String, error: String },

    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        source: serde_json::Error,
    },

    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Whether this failure means the environment is gone, as opposed to a
    /// single command misbehaving.
    pub fn is_environment_failure(&self) -> bool {
        matches!(
            self,
            DeviceError::EnvironmentUnavailable(_)
                | DeviceError::AppNotInstalled(_)
                | DeviceError::Spawn { .. }
                | DeviceError::SessionIo(_)
        )
    }
}

/// Failures of one primitive interaction.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No element matching {selector} on the current screen")]
    ElementNotFound { selector: String },

    #[error("Element {selector} is not hittable")]
    NotHittable { selector: String },

    /// The agent refused or could not carry out the action
    #[error("Action rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl ActionError {
    /// Whether the action failed because the device itself went away.
    pub fn is_environment_failure(&self) -> bool {
        matches!(self, ActionError::Device(e) if e.is_environment_failure())
    }
}

/// Top-level error for CLI commands and input/output files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
