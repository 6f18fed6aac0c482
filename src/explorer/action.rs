use std::fmt;

use serde::{Deserialize, Serialize};

use crate::screen::element::{Element, ElementRole};

/// How a tap target is located.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Label(String),
    Identifier(String),
}

impl Selector {
    /// Prefer the identifier; labels can be localized or dynamic.
    pub fn for_element(element: &Element) -> Self {
        match &element.identifier {
            Some(id) => Selector::Identifier(id.clone()),
            None => Selector::Label(element.label.clone()),
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Selector::Label(label) => &element.label == label,
            Selector::Identifier(id) => element.identifier.as_deref() == Some(id.as_str()),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Selector::Label(v) | Selector::Identifier(v) => v,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Label(l) => write!(f, "label \"{}\"", l),
            Selector::Identifier(id) => write!(f, "id \"{}\"", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertResponse {
    Accept,
    Cancel,
}

/// A single primitive interaction. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Tap { role: ElementRole, selector: Selector },
    Swipe { direction: SwipeDirection },
    Wait { duration_ms: u64 },
    Type { text: String },
    DismissAlert { response: AlertResponse },
    GoBack,
}

impl Action {
    pub fn tap(element: &Element) -> Self {
        Action::Tap {
            role: element.role,
            selector: Selector::for_element(element),
        }
    }

    pub fn tap_label(role: ElementRole, label: &str) -> Self {
        Action::Tap {
            role,
            selector: Selector::Label(label.to_string()),
        }
    }

    pub fn swipe(direction: SwipeDirection) -> Self {
        Action::Swipe { direction }
    }

    /// Short name used in screen names, e.g. `tap-Settings`, `swipe-left`.
    pub fn context(&self) -> String {
        match self {
            Action::Tap { role, selector } => {
                let prefix = match role {
                    ElementRole::Cell => "cell",
                    ElementRole::Tab => "tab",
                    _ => "tap",
                };
                format!("{}-{}", prefix, safe_name(selector.value()))
            }
            Action::Swipe { direction } => format!("swipe-{}", direction.as_str()),
            Action::Wait { .. } => "wait".into(),
            Action::Type { .. } => "type".into(),
            Action::DismissAlert { .. } => "alert".into(),
            Action::GoBack => "back".into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tap { role, selector } => write!(f, "tap {} {}", role.as_str(), selector),
            Action::Swipe { direction } => write!(f, "swipe {}", direction.as_str()),
            Action::Wait { duration_ms } => write!(f, "wait {}ms", duration_ms),
            Action::Type { text } => write!(f, "type \"{}\"", text),
            Action::DismissAlert { response } => write!(f, "alert {:?}", response),
            Action::GoBack => f.write_str("back"),
        }
    }
}

/// Replace separators and cap length so a label can live in a file name.
pub fn safe_name(label: &str) -> String {
    label
        .chars()
        .map(|c| if c == ' ' || c == '/' { '-' } else { c })
        .take(30)
        .collect()
}
