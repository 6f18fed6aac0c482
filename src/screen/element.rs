use serde::{Deserialize, Serialize};

use super::fingerprint::{Fingerprint, ScreenHasher};

/// Accessibility role of an interactive or visible element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementRole {
    Button,
    Tab,
    Cell,
    Switch,
    TextField,
    StaticText,
    NavBarButton,
    Image,
}

impl ElementRole {
    /// Parse the role names reported by the UI agent. Unknown roles yield
    /// `None` and the element is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "button" => Some(ElementRole::Button),
            "tab" | "tabBarButton" => Some(ElementRole::Tab),
            "cell" => Some(ElementRole::Cell),
            "switch" | "toggle" => Some(ElementRole::Switch),
            "textField" | "secureTextField" | "searchField" => Some(ElementRole::TextField),
            "staticText" | "text" => Some(ElementRole::StaticText),
            "navBarButton" | "navbtn" => Some(ElementRole::NavBarButton),
            "image" => Some(ElementRole::Image),
            _ => None,
        }
    }

    /// Buttons, tabs and nav-bar buttons all count as button labels when
    /// fingerprinting a screen.
    pub fn is_button_like(&self) -> bool {
        matches!(
            self,
            ElementRole::Button | ElementRole::Tab | ElementRole::NavBarButton
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementRole::Button => "button",
            ElementRole::Tab => "tab",
            ElementRole::Cell => "cell",
            ElementRole::Switch => "switch",
            ElementRole::TextField => "textField",
            ElementRole::StaticText => "staticText",
            ElementRole::NavBarButton => "navBarButton",
            ElementRole::Image => "image",
        }
    }
}

/// One element as seen in a single snapshot. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub role: ElementRole,

    /// Display label (may be empty)
    pub label: String,

    /// Accessibility identifier, when the app sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(default = "default_true")]
    pub hittable: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Current value, e.g. switch state "1"/"0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Element {
    pub fn new(role: ElementRole, label: &str) -> Self {
        Self {
            role,
            label: label.to_string(),
            identifier: None,
            hittable: true,
            enabled: true,
            value: None,
        }
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn not_hittable(mut self) -> Self {
        self.hittable = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the element can receive a tap right now.
    pub fn is_actionable(&self) -> bool {
        self.hittable && self.enabled
    }
}

/// Element record as reported by the UI agent.
///
/// Every field is optional: elements can vanish between the agent listing
/// them and reading their attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    pub role: Option<String>,
    pub label: Option<String>,
    pub identifier: Option<String>,
    #[serde(rename = "isHittable")]
    pub is_hittable: Option<bool>,
    #[serde(rename = "isEnabled")]
    pub is_enabled: Option<bool>,
    pub value: Option<String>,
    pub exists: Option<bool>,
}

impl RawElement {
    /// Convert into an `Element`, or `None` if the element disappeared
    /// mid-read or has a role we do not track.
    pub fn into_element(self) -> Option<Element> {
        if self.exists == Some(false) {
            return None;
        }
        let role = ElementRole::parse(self.role.as_deref()?)?;
        Some(Element {
            role,
            label: self.label.map(|l| l.trim().to_string()).unwrap_or_default(),
            identifier: self.identifier.filter(|id| !id.is_empty()),
            hittable: self.is_hittable.unwrap_or(false),
            enabled: self.is_enabled.unwrap_or(true),
            value: self.value,
        })
    }
}

/// Ordered inventory of elements visible at one instant, plus its fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub elements: Vec<Element>,
    pub fingerprint: Fingerprint,
}

impl Snapshot {
    pub fn new(elements: Vec<Element>, hasher: &ScreenHasher) -> Self {
        let fingerprint = hasher.fingerprint(&elements);
        Self {
            elements,
            fingerprint,
        }
    }

    pub fn by_role(&self, role: ElementRole) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.role == role)
    }

    pub fn has_tab_bar(&self) -> bool {
        self.elements.iter().any(|e| e.role == ElementRole::Tab)
    }

    /// First element whose label or identifier equals `key` exactly.
    pub fn find(&self, role: Option<ElementRole>, key: &str) -> Option<&Element> {
        self.elements.iter().find(|e| {
            role.is_none_or(|r| r == e.role)
                && (e.label == key || e.identifier.as_deref() == Some(key))
        })
    }

    /// Labels of all static texts, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.by_role(ElementRole::StaticText)
            .map(|e| e.label.as_str())
            .collect()
    }
}
