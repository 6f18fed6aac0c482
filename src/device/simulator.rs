use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ActionError, DeviceError};
use crate::explorer::action::{Action, SwipeDirection};
use crate::explorer::world_state::WorldState;
use crate::screen::element::Element;
use crate::screen::reader::SnapshotCaps;

use super::controller::{DeviceController, SnapshotReader};
use super::session::AgentSession;
use super::simctl::Simctl;

/// Fixed waits after each kind of operation. The simulator gives no
/// "animations finished" signal, so every operation sleeps before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub launch_ms: u64,
    pub action_ms: u64,
    pub recovery_ms: u64,
    pub terminate_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            launch_ms: 3000,
            action_ms: 2000,
            recovery_ms: 1000,
            terminate_ms: 500,
        }
    }
}

fn settle(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// A booted iOS simulator driven through `simctl` for lifecycle and a UI
/// agent subprocess for inspection and interaction.
pub struct SimulatorDevice {
    simctl: Simctl,
    agent_command: Vec<String>,
    settle: SettleConfig,
    session: Option<AgentSession>,
}

impl SimulatorDevice {
    /// `agent_command` is the program and leading arguments of the UI agent;
    /// `--device` and `--bundle-id` are appended.
    pub fn new(device: &str, bundle_id: &str, agent_command: Vec<String>, settle: SettleConfig) -> Self {
        Self {
            simctl: Simctl::new(device, bundle_id),
            agent_command,
            settle,
            session: None,
        }
    }

    fn session(&mut self) -> Result<&mut AgentSession, DeviceError> {
        if self.session.is_none() {
            let (program, rest) = self.agent_command.split_first().ok_or_else(|| {
                DeviceError::EnvironmentUnavailable("no UI agent command configured".into())
            })?;
            let mut args = rest.to_vec();
            args.extend([
                "--device".to_string(),
                self.simctl.device.clone(),
                "--bundle-id".to_string(),
                self.simctl.bundle_id.clone(),
            ]);
            self.session = Some(AgentSession::spawn(program, &args)?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| DeviceError::SessionIo("agent session missing".into()))
    }

    fn settle_after(&self, action: &Action) -> u64 {
        match action {
            Action::GoBack
            | Action::Swipe {
                direction: SwipeDirection::Down,
            } => self.settle.recovery_ms,
            Action::Wait { .. } => 0,
            _ => self.settle.action_ms,
        }
    }
}

impl DeviceController for SimulatorDevice {
    fn install(&mut self, app_path: &Path) -> Result<(), DeviceError> {
        self.simctl.install(app_path)
    }

    fn set_preferences(&mut self, prefs: &WorldState) -> Result<(), DeviceError> {
        self.simctl.write_defaults(prefs)
    }

    fn clear_preferences(&mut self) -> Result<(), DeviceError> {
        self.simctl.delete_defaults()
    }

    fn launch(&mut self) -> Result<(), DeviceError> {
        self.terminate()?;
        self.simctl.launch()?;
        settle(self.settle.launch_ms);
        debug!("Launched {}", self.simctl.bundle_id);
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), DeviceError> {
        // The agent is attached to the running process; drop it with the app.
        self.session = None;
        self.simctl.terminate()?;
        settle(self.settle.terminate_ms);
        Ok(())
    }

    fn capture_screenshot(&mut self) -> Result<Vec<u8>, DeviceError> {
        self.simctl.screenshot()
    }

    fn perform(&mut self, action: &Action) -> Result<(), ActionError> {
        if let Action::Wait { duration_ms } = action {
            settle(*duration_ms);
            return Ok(());
        }
        let wait = self.settle_after(action);
        self.session()?.perform(action)?;
        settle(wait);
        Ok(())
    }
}

impl SnapshotReader for SimulatorDevice {
    fn read_elements(&mut self, caps: &SnapshotCaps) -> Result<Vec<Element>, DeviceError> {
        self.session()?.snapshot(caps)
    }
}
