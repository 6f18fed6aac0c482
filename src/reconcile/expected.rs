use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::explorer::action::{Action, AlertResponse, SwipeDirection};
use crate::explorer::world_state::WorldState;
use crate::screen::element::ElementRole;
use crate::screen::fingerprint::Fingerprint;

// ============================================================================
// Expected screens: proposed without ground truth
// ============================================================================

/// A screen some external source believes exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedScreen {
    pub name: String,

    /// Preferences that must hold for the screen to appear
    #[serde(default, alias = "defaults", alias = "requiredPreferences")]
    pub required_preferences: WorldState,

    #[serde(default)]
    pub caption: Option<String>,

    /// Proposed navigation from a cold launch. `None` means no proposal;
    /// an empty list means the launch screen itself.
    #[serde(default, alias = "navigation", alias = "candidateActions")]
    pub candidate_steps: Option<Vec<CandidateStep>>,

    #[serde(default = "default_reachable")]
    pub reachable: bool,

    /// Why the source considers the screen unreachable
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_reachable() -> bool {
    true
}

impl ExpectedScreen {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required_preferences: WorldState::empty(),
            caption: None,
            candidate_steps: None,
            reachable: true,
            reason: None,
        }
    }

    pub fn requiring(mut self, prefs: WorldState) -> Self {
        self.required_preferences = prefs;
        self
    }

    pub fn with_steps(mut self, steps: Vec<CandidateStep>) -> Self {
        self.candidate_steps = Some(steps);
        self
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn declared_unreachable(mut self, reason: &str) -> Self {
        self.reachable = false;
        self.reason = Some(reason.to_string());
        self
    }

    /// Lowercase words of the name that describe the screen, e.g.
    /// `03-premium-paywall` gives `["premium", "paywall"]`.
    pub fn intent_keywords(&self) -> Vec<String> {
        self.name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
            .map(|w| w.to_lowercase())
            .collect()
    }
}

// ============================================================================
// Candidate steps: compact navigation vocabulary
// ============================================================================

/// One proposed navigation step, in the compact form external sources
/// write: `tap: "Settings"`, `tap_tab: "Home"`, `swipe: left`, `wait: 2`.
/// A bare string is a `tap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub enum CandidateStep {
    /// Tap by label or identifier; `role: None` means a button if one
    /// matches, otherwise any element
    Tap { role: Option<ElementRole>, key: String },
    /// Tap by accessibility identifier only
    TapId(String),
    Swipe(SwipeDirection),
    TypeText(String),
    Wait { seconds: f64 },
    Alert(AlertResponse),
    Back,
}

impl CandidateStep {
    pub fn tap(label: &str) -> Self {
        CandidateStep::Tap {
            role: None,
            key: label.to_string(),
        }
    }

    pub fn tap_role(role: ElementRole, label: &str) -> Self {
        CandidateStep::Tap {
            role: Some(role),
            key: label.to_string(),
        }
    }

    /// Action for steps that need no element; `None` for taps.
    pub fn element_free_action(&self) -> Option<Action> {
        match self {
            CandidateStep::Tap { .. } | CandidateStep::TapId(_) => None,
            CandidateStep::Swipe(direction) => Some(Action::swipe(*direction)),
            CandidateStep::TypeText(text) => Some(Action::Type { text: text.clone() }),
            CandidateStep::Wait { seconds } => Some(Action::Wait {
                duration_ms: (seconds.max(0.0) * 1000.0).round() as u64,
            }),
            CandidateStep::Alert(response) => Some(Action::DismissAlert {
                response: *response,
            }),
            CandidateStep::Back => Some(Action::GoBack),
        }
    }

    fn key_name(&self) -> &'static str {
        match self {
            CandidateStep::Tap { role, .. } => match role {
                None => "tap",
                Some(ElementRole::Tab) => "tap_tab",
                Some(ElementRole::StaticText) => "tap_text",
                Some(ElementRole::Cell) => "tap_cell",
                Some(ElementRole::NavBarButton) => "tap_nav",
                Some(ElementRole::Switch) => "tap_switch",
                Some(ElementRole::Image) => "tap_image",
                Some(ElementRole::TextField) => "tap_field",
                Some(ElementRole::Button) => "tap_button",
            },
            CandidateStep::TapId(_) => "tap_id",
            CandidateStep::Swipe(_) => "swipe",
            CandidateStep::TypeText(_) => "type_text",
            CandidateStep::Wait { .. } => "wait",
            CandidateStep::Alert(AlertResponse::Accept) => "alert_accept",
            CandidateStep::Alert(AlertResponse::Cancel) => "alert_dismiss",
            CandidateStep::Back => "back",
        }
    }
}

impl fmt::Display for CandidateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStep::Tap { key, .. } | CandidateStep::TapId(key) => {
                write!(f, "{} \"{}\"", self.key_name(), key)
            }
            CandidateStep::Swipe(d) => write!(f, "swipe {}", d.as_str()),
            CandidateStep::TypeText(t) => write!(f, "type_text \"{}\"", t),
            CandidateStep::Wait { seconds } => write!(f, "wait {}s", seconds),
            _ => f.write_str(self.key_name()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawStep {
    Label(String),
    Keyed(BTreeMap<String, serde_json::Value>),
}

impl TryFrom<RawStep> for CandidateStep {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let map = match raw {
            RawStep::Label(label) => return Ok(CandidateStep::tap(&label)),
            RawStep::Keyed(map) => map,
        };

        let mut entries = map.into_iter();
        let (key, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err("navigation step must have exactly one key".to_string()),
        };

        let text = || -> Result<String, String> {
            match &value {
                serde_json::Value::String(s) => Ok(s.clone()),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                other => Err(format!("'{}' expects a string, got {}", key, other)),
            }
        };

        let step = match key.as_str() {
            "tap" => CandidateStep::tap(&text()?),
            "tap_button" => CandidateStep::tap_role(ElementRole::Button, &text()?),
            "tap_tab" => CandidateStep::tap_role(ElementRole::Tab, &text()?),
            "tap_text" => CandidateStep::tap_role(ElementRole::StaticText, &text()?),
            "tap_cell" => CandidateStep::tap_role(ElementRole::Cell, &text()?),
            "tap_nav" => CandidateStep::tap_role(ElementRole::NavBarButton, &text()?),
            "tap_switch" => CandidateStep::tap_role(ElementRole::Switch, &text()?),
            "tap_image" => CandidateStep::tap_role(ElementRole::Image, &text()?),
            "tap_field" => CandidateStep::tap_role(ElementRole::TextField, &text()?),
            "tap_id" => CandidateStep::TapId(text()?),
            "swipe" => {
                let direction = match text()?.to_lowercase().as_str() {
                    "left" => SwipeDirection::Left,
                    "right" => SwipeDirection::Right,
                    "up" => SwipeDirection::Up,
                    "down" => SwipeDirection::Down,
                    other => return Err(format!("unknown swipe direction '{}'", other)),
                };
                CandidateStep::Swipe(direction)
            }
            "type_text" => CandidateStep::TypeText(text()?),
            "wait" => {
                let seconds = value
                    .as_f64()
                    .ok_or_else(|| format!("'wait' expects seconds, got {}", value))?;
                CandidateStep::Wait { seconds }
            }
            "alert_accept" => CandidateStep::Alert(AlertResponse::Accept),
            "alert_dismiss" => CandidateStep::Alert(AlertResponse::Cancel),
            "back" => CandidateStep::Back,
            other => return Err(format!("unknown navigation step '{}'", other)),
        };
        Ok(step)
    }
}

impl From<CandidateStep> for RawStep {
    fn from(step: CandidateStep) -> Self {
        let value = match &step {
            CandidateStep::Tap { key, .. } | CandidateStep::TapId(key) => {
                serde_json::Value::String(key.clone())
            }
            CandidateStep::Swipe(d) => serde_json::Value::String(d.as_str().to_string()),
            CandidateStep::TypeText(t) => serde_json::Value::String(t.clone()),
            CandidateStep::Wait { seconds } => serde_json::json!(seconds),
            CandidateStep::Alert(_) | CandidateStep::Back => serde_json::Value::Bool(true),
        };
        let mut map = BTreeMap::new();
        map.insert(step.key_name().to_string(), value);
        RawStep::Keyed(map)
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Outcome of reconciling one expected screen against observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ReachabilityVerdict {
    /// Every tap in `actions` targets an element seen under `world_state`
    Reachable {
        name: String,
        world_state: WorldState,
        actions: Vec<Action>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        /// Fingerprint of the discovered screen the path leads to, when
        /// the path came from discovery rather than the proposal
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<Fingerprint>,
    },
    Unreachable { name: String, reason: String },
}

impl ReachabilityVerdict {
    pub fn name(&self) -> &str {
        match self {
            ReachabilityVerdict::Reachable { name, .. }
            | ReachabilityVerdict::Unreachable { name, .. } => name,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ReachabilityVerdict::Reachable { .. })
    }
}
