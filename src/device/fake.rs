use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{ActionError, DeviceError};
use crate::explorer::action::{Action, SwipeDirection};
use crate::explorer::world_state::WorldState;
use crate::screen::element::{Element, ElementRole};
use crate::screen::reader::{SnapshotCaps, apply_caps};

use super::controller::{DeviceController, SnapshotReader};

// ============================================================================
// FakeScreen: one screen of the modelled app
// ============================================================================

#[derive(Debug, Clone)]
struct FakeElement {
    element: Element,
    /// Screen shown after tapping
    target: Option<String>,
    /// Removed from the app for good once tapped
    once: bool,
}

/// A screen of a `FakeApp`: its elements in order plus where each one leads.
#[derive(Debug, Clone, Default)]
pub struct FakeScreen {
    elements: Vec<FakeElement>,
    swipes: HashMap<SwipeDirection, String>,
}

impl FakeScreen {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, element: Element, target: Option<&str>) -> Self {
        self.elements.push(FakeElement {
            element,
            target: target.map(str::to_string),
            once: false,
        });
        self
    }

    pub fn text(self, label: &str) -> Self {
        self.push(Element::new(ElementRole::StaticText, label), None)
    }

    /// Inert element (no navigation).
    pub fn element(self, element: Element) -> Self {
        self.push(element, None)
    }

    pub fn button(self, label: &str, target: &str) -> Self {
        self.push(Element::new(ElementRole::Button, label), Some(target))
    }

    /// Button that navigates once, then disappears from the app.
    pub fn button_once(mut self, label: &str, target: &str) -> Self {
        self.elements.push(FakeElement {
            element: Element::new(ElementRole::Button, label),
            target: Some(target.to_string()),
            once: true,
        });
        self
    }

    pub fn tab(self, label: &str, target: &str) -> Self {
        self.push(Element::new(ElementRole::Tab, label), Some(target))
    }

    pub fn cell(self, label: &str, target: &str) -> Self {
        self.push(Element::new(ElementRole::Cell, label), Some(target))
    }

    /// Leading navigation-bar button returning to `target`.
    pub fn nav_back(self, label: &str, target: &str) -> Self {
        self.push(Element::new(ElementRole::NavBarButton, label), Some(target))
    }

    /// Dismiss control (e.g. "Close") returning to `target`.
    pub fn close_button(self, label: &str, target: &str) -> Self {
        self.push(Element::new(ElementRole::Button, label), Some(target))
    }

    pub fn swipe(mut self, direction: SwipeDirection, target: &str) -> Self {
        self.swipes.insert(direction, target.to_string());
        self
    }

    /// Modal sheet dismissed by swiping down.
    pub fn swipe_down(self, target: &str) -> Self {
        self.swipe(SwipeDirection::Down, target)
    }
}

// ============================================================================
// FakeApp: deterministic in-memory device
// ============================================================================

/// A scripted app implementing `DeviceController` and `SnapshotReader`.
///
/// Launch always lands on the root screen for the current preferences, so
/// action paths replay exactly. Failures can be injected to exercise the
/// abort and divergence paths.
#[derive(Debug, Clone)]
pub struct FakeApp {
    screens: HashMap<String, FakeScreen>,
    root: String,
    state_roots: Vec<(WorldState, String)>,
    relaunch_root: Option<String>,
    prefs: WorldState,
    current: Option<String>,
    consumed: HashSet<(String, usize)>,
    launches: usize,
    performed: Vec<Action>,
    die_after_actions: Option<usize>,
    broken_pref_keys: Vec<String>,
    dead: bool,
    installed: Vec<String>,
}

impl FakeApp {
    pub fn new(root: &str) -> Self {
        Self {
            screens: HashMap::new(),
            root: root.to_string(),
            state_roots: Vec::new(),
            relaunch_root: None,
            prefs: WorldState::empty(),
            current: None,
            consumed: HashSet::new(),
            launches: 0,
            performed: Vec::new(),
            die_after_actions: None,
            broken_pref_keys: Vec::new(),
            dead: false,
            installed: Vec::new(),
        }
    }

    pub fn screen(mut self, id: &str, screen: FakeScreen) -> Self {
        self.screens.insert(id.to_string(), screen);
        self
    }

    /// Launch into `root` when the stored preferences satisfy `state`.
    /// Earlier registrations win.
    pub fn root_when(mut self, state: WorldState, root: &str) -> Self {
        self.state_roots.push((state, root.to_string()));
        self
    }

    /// Every launch after the first lands on `root` instead.
    pub fn relaunch_into(mut self, root: &str) -> Self {
        self.relaunch_root = Some(root.to_string());
        self
    }

    /// The device stops responding after `n` performed actions.
    pub fn die_after_actions(mut self, n: usize) -> Self {
        self.die_after_actions = Some(n);
        self
    }

    /// Writing preference `key` fails with an environment error.
    pub fn reject_preference(mut self, key: &str) -> Self {
        self.broken_pref_keys.push(key.to_string());
        self
    }

    pub fn launches(&self) -> usize {
        self.launches
    }

    pub fn performed(&self) -> &[Action] {
        &self.performed
    }

    pub fn current_screen(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn preferences(&self) -> &WorldState {
        &self.prefs
    }

    pub fn installed(&self) -> &[String] {
        &self.installed
    }

    fn alive(&self) -> Result<(), DeviceError> {
        if self.dead {
            Err(DeviceError::SessionIo("device stopped responding".into()))
        } else {
            Ok(())
        }
    }

    fn root_for_prefs(&self) -> String {
        if self.launches > 1 {
            if let Some(root) = &self.relaunch_root {
                return root.clone();
            }
        }
        self.state_roots
            .iter()
            .find(|(state, _)| self.prefs.satisfies(state))
            .map(|(_, root)| root.clone())
            .unwrap_or_else(|| self.root.clone())
    }

    /// Elements currently visible, with their index in the screen model.
    fn visible(&self) -> Vec<(usize, &FakeElement)> {
        let Some(id) = &self.current else {
            return Vec::new();
        };
        let Some(screen) = self.screens.get(id) else {
            return Vec::new();
        };
        screen
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.consumed.contains(&(id.clone(), *i)))
            .collect()
    }

    fn tap(&mut self, role: ElementRole, action: &Action) -> Result<(), ActionError> {
        let Action::Tap { selector, .. } = action else {
            return Ok(());
        };
        let found = self
            .visible()
            .into_iter()
            .find(|(_, fe)| fe.element.role == role && selector.matches(&fe.element))
            .map(|(i, fe)| (i, fe.clone()));

        let Some((index, fe)) = found else {
            return Err(ActionError::ElementNotFound {
                selector: selector.to_string(),
            });
        };
        if !fe.element.is_actionable() {
            return Err(ActionError::NotHittable {
                selector: selector.to_string(),
            });
        }
        if fe.once {
            if let Some(id) = &self.current {
                self.consumed.insert((id.clone(), index));
            }
        }
        if let Some(target) = fe.target {
            self.current = Some(target);
        }
        Ok(())
    }
}

impl DeviceController for FakeApp {
    fn install(&mut self, app_path: &Path) -> Result<(), DeviceError> {
        self.alive()?;
        self.installed.push(app_path.display().to_string());
        Ok(())
    }

    fn set_preferences(&mut self, prefs: &WorldState) -> Result<(), DeviceError> {
        self.alive()?;
        if let Some(key) = prefs.prefs.keys().find(|k| self.broken_pref_keys.contains(*k)) {
            return Err(DeviceError::EnvironmentUnavailable(format!(
                "cannot write preference '{}'",
                key
            )));
        }
        for (k, v) in &prefs.prefs {
            self.prefs.prefs.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn clear_preferences(&mut self) -> Result<(), DeviceError> {
        self.alive()?;
        self.prefs = WorldState::empty();
        Ok(())
    }

    fn launch(&mut self) -> Result<(), DeviceError> {
        self.alive()?;
        self.launches += 1;
        self.current = Some(self.root_for_prefs());
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), DeviceError> {
        self.alive()?;
        self.current = None;
        Ok(())
    }

    fn capture_screenshot(&mut self) -> Result<Vec<u8>, DeviceError> {
        self.alive()?;
        let id = self.current.clone().ok_or_else(|| DeviceError::SessionProtocol {
            command: "screenshot".into(),
            error: "app not running".into(),
        })?;
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend(id.as_bytes());
        Ok(png)
    }

    fn perform(&mut self, action: &Action) -> Result<(), ActionError> {
        self.alive()?;
        if let Some(limit) = self.die_after_actions {
            if self.performed.len() >= limit {
                self.dead = true;
                return Err(DeviceError::SessionIo("device stopped responding".into()).into());
            }
        }
        self.performed.push(action.clone());

        if self.current.is_none() {
            return Err(ActionError::Rejected("app not running".into()));
        }

        match action {
            Action::Tap { role, .. } => self.tap(*role, action),
            Action::Swipe { direction } => {
                let target = self
                    .current
                    .as_ref()
                    .and_then(|id| self.screens.get(id))
                    .and_then(|s| s.swipes.get(direction))
                    .cloned();
                if let Some(target) = target {
                    self.current = Some(target);
                }
                Ok(())
            }
            Action::GoBack => {
                let back = self
                    .visible()
                    .into_iter()
                    .find(|(_, fe)| fe.element.role == ElementRole::NavBarButton)
                    .and_then(|(_, fe)| fe.target.clone());
                match back {
                    Some(target) => {
                        self.current = Some(target);
                        Ok(())
                    }
                    None => Err(ActionError::ElementNotFound {
                        selector: "navigation bar back button".into(),
                    }),
                }
            }
            Action::Wait { .. } | Action::Type { .. } | Action::DismissAlert { .. } => Ok(()),
        }
    }
}

impl SnapshotReader for FakeApp {
    fn read_elements(&mut self, caps: &SnapshotCaps) -> Result<Vec<Element>, DeviceError> {
        self.alive()?;
        let elements: Vec<Element> = self
            .visible()
            .into_iter()
            .map(|(_, fe)| fe.element.clone())
            .collect();
        Ok(apply_caps(elements, caps))
    }
}
