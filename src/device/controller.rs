use std::path::Path;

use crate::error::{ActionError, DeviceError};
use crate::explorer::action::Action;
use crate::explorer::world_state::WorldState;
use crate::screen::element::{Element, Snapshot};
use crate::screen::fingerprint::ScreenHasher;
use crate::screen::reader::SnapshotCaps;

// ============================================================================
// DeviceController: lifecycle, preferences, capture, interaction
// ============================================================================

/// Primitive operations against one already-selected execution environment.
///
/// Only one operation may be in flight at a time; implementations apply
/// their own settle delay before returning.
pub trait DeviceController {
    /// Install the app bundle at `app_path`.
    fn install(&mut self, app_path: &Path) -> Result<(), DeviceError>;

    /// Write each preference into the app's persisted store.
    fn set_preferences(&mut self, prefs: &WorldState) -> Result<(), DeviceError>;

    /// Remove the app's persisted store. Absence is not an error.
    fn clear_preferences(&mut self) -> Result<(), DeviceError>;

    /// Terminate any running instance, then start the app fresh.
    fn launch(&mut self) -> Result<(), DeviceError>;

    /// Stop the app. Not running is not an error.
    fn terminate(&mut self) -> Result<(), DeviceError>;

    /// PNG bytes of the current screen.
    fn capture_screenshot(&mut self) -> Result<Vec<u8>, DeviceError>;

    /// Carry out one interaction on the running app.
    fn perform(&mut self, action: &Action) -> Result<(), ActionError>;
}

// ============================================================================
// SnapshotReader: observation only
// ============================================================================

/// Produces the inventory of elements currently on screen. Never mutates UI.
pub trait SnapshotReader {
    /// Elements in on-screen order, at most `caps` per role. Elements that
    /// vanish mid-read are omitted, never reported as errors.
    fn read_elements(&mut self, caps: &SnapshotCaps) -> Result<Vec<Element>, DeviceError>;

    fn snapshot(
        &mut self,
        caps: &SnapshotCaps,
        hasher: &ScreenHasher,
    ) -> Result<Snapshot, DeviceError> {
        let elements = self.read_elements(caps)?;
        Ok(Snapshot::new(elements, hasher))
    }
}

/// Anything the crawler can drive.
pub trait Device: DeviceController + SnapshotReader {}

impl<T: DeviceController + SnapshotReader + ?Sized> Device for T {}
