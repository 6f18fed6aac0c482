use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::controller::Device;
use crate::error::{ActionError, DeviceError};
use crate::explorer::action::{Action, SwipeDirection};
use crate::screen::element::{Element, ElementRole, RawElement, Snapshot};
use crate::screen::fingerprint::ScreenHasher;

// ============================================================================
// Per-role inspection caps
// ============================================================================

/// Maximum number of elements inspected per role, bounding the cost of
/// deeply nested or infinite-scroll screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCaps {
    pub buttons: usize,
    pub static_texts: usize,
    pub tabs: usize,
    pub cells: usize,
    pub switches: usize,
    pub nav_bar_buttons: usize,
    pub images: usize,
    pub text_fields: usize,
}

impl Default for SnapshotCaps {
    fn default() -> Self {
        Self {
            buttons: 50,
            static_texts: 50,
            tabs: 10,
            cells: 30,
            switches: 10,
            nav_bar_buttons: 10,
            images: 20,
            text_fields: 20,
        }
    }
}

impl SnapshotCaps {
    pub fn limit(&self, role: ElementRole) -> usize {
        match role {
            ElementRole::Button => self.buttons,
            ElementRole::StaticText => self.static_texts,
            ElementRole::Tab => self.tabs,
            ElementRole::Cell => self.cells,
            ElementRole::Switch => self.switches,
            ElementRole::NavBarButton => self.nav_bar_buttons,
            ElementRole::Image => self.images,
            ElementRole::TextField => self.text_fields,
        }
    }
}

/// Keep at most `caps.limit(role)` elements of each role, in order.
pub fn apply_caps(elements: impl IntoIterator<Item = Element>, caps: &SnapshotCaps) -> Vec<Element> {
    let mut seen: HashMap<ElementRole, usize> = HashMap::new();
    elements
        .into_iter()
        .filter(|el| {
            let count = seen.entry(el.role).or_insert(0);
            if *count >= caps.limit(el.role) {
                return false;
            }
            *count += 1;
            true
        })
        .collect()
}

/// Convert raw agent records into capped elements, silently dropping
/// records that vanished or carry no usable role.
pub fn collect_elements(raw: Vec<RawElement>, caps: &SnapshotCaps) -> Vec<Element> {
    apply_caps(raw.into_iter().filter_map(RawElement::into_element), caps)
}

// ============================================================================
// Multi-snapshot variants
// ============================================================================

/// Snapshot taken after an action sequence from the current screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    pub actions: Vec<Action>,
    pub snapshot: Snapshot,
}

/// Tap each tab-bar entry and snapshot what it shows.
///
/// Tab content is invisible until selected. Tabs that do not change the
/// screen still yield a snapshot (the current tab). Leaves the app on the
/// last tab.
pub fn snapshot_per_tab<D: Device + ?Sized>(
    device: &mut D,
    root: &Snapshot,
    caps: &SnapshotCaps,
    hasher: &ScreenHasher,
) -> Result<Vec<ProbeSnapshot>, DeviceError> {
    let mut out = Vec::new();
    let tabs: Vec<Element> = root
        .by_role(ElementRole::Tab)
        .filter(|t| t.hittable)
        .cloned()
        .collect();

    for tab in &tabs {
        let action = Action::tap(tab);
        match device.perform(&action) {
            Ok(()) => {}
            Err(ActionError::Device(e)) if e.is_environment_failure() => return Err(e),
            Err(e) => {
                debug!("Tab '{}' could not be tapped: {}", tab.label, e);
                continue;
            }
        }
        let snapshot = device.snapshot(caps, hasher)?;
        out.push(ProbeSnapshot {
            actions: vec![action],
            snapshot,
        });
    }

    Ok(out)
}

/// Probe paged content by swiping left, then (after swiping back) right.
/// Only screens whose fingerprint differs from `root` are returned.
pub fn probe_swipes<D: Device + ?Sized>(
    device: &mut D,
    root: &Snapshot,
    caps: &SnapshotCaps,
    hasher: &ScreenHasher,
) -> Result<Vec<ProbeSnapshot>, DeviceError> {
    let mut out = Vec::new();

    for (direction, undo) in [
        (SwipeDirection::Left, SwipeDirection::Right),
        (SwipeDirection::Right, SwipeDirection::Left),
    ] {
        let action = Action::swipe(direction);
        match device.perform(&action) {
            Ok(()) => {}
            Err(ActionError::Device(e)) if e.is_environment_failure() => return Err(e),
            Err(_) => continue,
        }
        let snapshot = device.snapshot(caps, hasher)?;
        if snapshot.fingerprint != root.fingerprint {
            out.push(ProbeSnapshot {
                actions: vec![action],
                snapshot,
            });
            // Best effort; the next probe re-checks the fingerprint anyway.
            let _ = device.perform(&Action::swipe(undo));
        }
    }

    Ok(out)
}
