use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ActionError, DeviceError};
use crate::explorer::action::Action;
use crate::screen::element::{Element, RawElement};
use crate::screen::reader::{SnapshotCaps, collect_elements};

/// Request sent to the UI agent over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AgentRequest<'a> {
    Snapshot {
        cmd: &'static str,
        caps: &'a SnapshotCaps,
    },
    Perform {
        cmd: &'static str,
        action: &'a Action,
    },
    Quit {
        cmd: &'static str,
    },
}

impl<'a> AgentRequest<'a> {
    pub fn snapshot(caps: &'a SnapshotCaps) -> Self {
        AgentRequest::Snapshot {
            cmd: "snapshot",
            caps,
        }
    }

    pub fn perform(action: &'a Action) -> Self {
        AgentRequest::Perform {
            cmd: "perform",
            action,
        }
    }

    pub fn quit() -> Self {
        AgentRequest::Quit { cmd: "quit" }
    }
}

/// Response received from the UI agent over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct AgentResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,

    /// Machine-readable failure kind: `not_found`, `not_hittable`, ...
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub elements: Option<Vec<RawElement>>,

    #[serde(default)]
    pub ready: Option<bool>,
}

/// A long-lived UI automation agent attached to the running app.
///
/// Commands are sent as NDJSON over stdin, responses read from stdout, one
/// line each. The agent prints `{"ok":true,"ready":true}` once attached.
pub struct AgentSession {
    program: String,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl AgentSession {
    /// Spawn `program args..` and wait for its ready signal.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, DeviceError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DeviceError::Spawn {
                program: program.to_string(),
                source: e,
            })?;

        let (stdin, reader) = match await_ready(program, &mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                // Reap the agent so a failed attach leaves no stray process.
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        debug!("Agent '{}' ready", program);
        Ok(AgentSession {
            program: program.to_string(),
            child,
            stdin,
            reader,
        })
    }

    fn send(&mut self, request: &AgentRequest<'_>) -> Result<AgentResponse, DeviceError> {
        let json = serde_json::to_string(request).map_err(|e| DeviceError::JsonSerialize {
            context: "AgentRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json).map_err(|e| {
            DeviceError::SessionIo(format!("Failed to write to {}: {}", self.program, e))
        })?;
        self.stdin.flush().map_err(|e| {
            DeviceError::SessionIo(format!("Failed to flush {}: {}", self.program, e))
        })?;

        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|e| {
            DeviceError::SessionIo(format!("Failed to read from {}: {}", self.program, e))
        })?;

        if line.trim().is_empty() {
            return Err(DeviceError::SessionIo(format!(
                "Empty response from {} (process may have died)",
                self.program
            )));
        }

        serde_json::from_str(line.trim()).map_err(|e| DeviceError::JsonParse {
            context: format!("{} response", self.program),
            source: e,
        })
    }

    /// Current elements, capped per role.
    pub fn snapshot(&mut self, caps: &SnapshotCaps) -> Result<Vec<Element>, DeviceError> {
        let response = self.send(&AgentRequest::snapshot(caps))?;
        if !response.ok {
            return Err(DeviceError::SessionProtocol {
                command: "snapshot".into(),
                error: response.error.unwrap_or_else(|| "Unknown error".into()),
            });
        }
        Ok(collect_elements(response.elements.unwrap_or_default(), caps))
    }

    pub fn perform(&mut self, action: &Action) -> Result<(), ActionError> {
        let response = self.send(&AgentRequest::perform(action))?;
        if response.ok {
            return Ok(());
        }
        let error = response.error.unwrap_or_else(|| "Unknown error".into());
        let selector = match action {
            Action::Tap { selector, .. } => selector.to_string(),
            other => other.to_string(),
        };
        Err(match response.code.as_deref() {
            Some("not_found") => ActionError::ElementNotFound { selector },
            Some("not_hittable") => ActionError::NotHittable { selector },
            _ => ActionError::Rejected(error),
        })
    }

    /// Ask the agent to exit and reap it. Best effort.
    pub fn quit(&mut self) {
        let _ = self.send(&AgentRequest::quit());
        let _ = self.child.wait();
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.quit();
    }
}

/// Take the agent's pipes and read its ready signal.
fn await_ready(
    program: &str,
    child: &mut Child,
) -> Result<(ChildStdin, BufReader<ChildStdout>), DeviceError> {
    let stdin = child.stdin.take().ok_or_else(|| {
        DeviceError::SessionIo(format!("Failed to capture stdin of {}", program))
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        DeviceError::SessionIo(format!("Failed to capture stdout of {}", program))
    })?;
    let mut reader = BufReader::new(stdout);

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| DeviceError::SessionIo(format!("Failed to read ready signal: {}", e)))?;
    if line.trim().is_empty() {
        return Err(DeviceError::EnvironmentUnavailable(format!(
            "{} exited before reporting ready",
            program
        )));
    }

    let response: AgentResponse =
        serde_json::from_str(line.trim()).map_err(|e| DeviceError::JsonParse {
            context: format!("{} ready signal", program),
            source: e,
        })?;

    if !response.ok || response.ready != Some(true) {
        return Err(DeviceError::EnvironmentUnavailable(format!(
            "{} did not report ready: {}",
            program,
            response.error.unwrap_or_default()
        )));
    }
    Ok((stdin, reader))
}
