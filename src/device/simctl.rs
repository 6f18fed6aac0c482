use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::explorer::world_state::WorldState;

/// `xcrun simctl` bound to one simulator and one app bundle.
#[derive(Debug, Clone)]
pub struct Simctl {
    pub device: String,
    pub bundle_id: String,
}

impl Simctl {
    pub fn new(device: &str, bundle_id: &str) -> Self {
        Self {
            device: device.to_string(),
            bundle_id: bundle_id.to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, DeviceError> {
        debug!("$ xcrun simctl {}", args.join(" "));
        Command::new("xcrun")
            .arg("simctl")
            .args(args)
            .output()
            .map_err(|e| DeviceError::Spawn {
                program: "xcrun simctl".into(),
                source: e,
            })
    }

    /// Run and require success, classifying well-known failures.
    fn run_checked(&self, args: &[&str]) -> Result<Output, DeviceError> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(args, output.status, stderr, &self.bundle_id))
    }

    pub fn install(&self, app_path: &Path) -> Result<(), DeviceError> {
        let path = app_path.to_string_lossy();
        self.run_checked(&["install", &self.device, &path])?;
        Ok(())
    }

    pub fn launch(&self) -> Result<(), DeviceError> {
        self.run_checked(&["launch", &self.device, &self.bundle_id])?;
        Ok(())
    }

    /// Not running is not an error.
    pub fn terminate(&self) -> Result<(), DeviceError> {
        let output = self.run(&["terminate", &self.device, &self.bundle_id])?;
        if !output.status.success() {
            debug!(
                "terminate {}: {}",
                self.bundle_id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    pub fn write_defaults(&self, state: &WorldState) -> Result<(), DeviceError> {
        for (key, value) in &state.prefs {
            let (flag, text) = value.defaults_args();
            self.run_checked(&[
                "spawn",
                &self.device,
                "defaults",
                "write",
                &self.bundle_id,
                key,
                flag,
                &text,
            ])?;
        }
        Ok(())
    }

    /// Delete the app's defaults domain. A missing domain is not an error.
    pub fn delete_defaults(&self) -> Result<(), DeviceError> {
        let output = self.run(&["spawn", &self.device, "defaults", "delete", &self.bundle_id])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("does not exist") {
                warn!("defaults delete {}: {}", self.bundle_id, stderr.trim());
            }
        }
        Ok(())
    }

    /// PNG bytes of the simulator screen.
    pub fn screenshot(&self) -> Result<Vec<u8>, DeviceError> {
        let output = self.run_checked(&["io", &self.device, "screenshot", "--type=png", "-"])?;
        if output.stdout.is_empty() {
            return Err(DeviceError::CommandFailed {
                command: "simctl io screenshot".into(),
                status: output.status,
                stderr: "empty image".into(),
            });
        }
        Ok(output.stdout)
    }
}

/// Map simctl stderr onto the error taxonomy.
fn classify_failure(
    args: &[&str],
    status: std::process::ExitStatus,
    stderr: String,
    bundle_id: &str,
) -> DeviceError {
    let lower = stderr.to_lowercase();
    if lower.contains("invalid device") || lower.contains("unable to lookup") || lower.contains("not booted")
    {
        DeviceError::EnvironmentUnavailable(stderr)
    } else if lower.contains("not installed") {
        DeviceError::AppNotInstalled(bundle_id.to_string())
    } else {
        DeviceError::CommandFailed {
            command: format!("simctl {}", args.first().copied().unwrap_or_default()),
            status,
            stderr,
        }
    }
}
