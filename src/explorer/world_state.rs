use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed persisted-preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPref", into = "RawPref")]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// ISO-8601 timestamp, written with the `-date` type
    Date(String),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPref {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<RawPref> for PrefValue {
    fn from(raw: RawPref) -> Self {
        match raw {
            RawPref::Bool(b) => PrefValue::Bool(b),
            RawPref::Int(i) => PrefValue::Int(i),
            RawPref::Float(f) => PrefValue::Float(f),
            RawPref::Text(s) => PrefValue::from_text(&s),
        }
    }
}

impl From<PrefValue> for RawPref {
    fn from(value: PrefValue) -> Self {
        match value {
            PrefValue::Bool(b) => RawPref::Bool(b),
            PrefValue::Int(i) => RawPref::Int(i),
            PrefValue::Float(f) => RawPref::Float(f),
            PrefValue::Date(s) | PrefValue::String(s) => RawPref::Text(s),
        }
    }
}

impl PrefValue {
    /// Strings that look like ISO-8601 timestamps become dates.
    pub fn from_text(text: &str) -> Self {
        if looks_like_date(text) {
            PrefValue::Date(text.to_string())
        } else {
            PrefValue::String(text.to_string())
        }
    }

    /// Type flag and value for `defaults write`.
    pub fn defaults_args(&self) -> (&'static str, String) {
        match self {
            PrefValue::Bool(b) => ("-bool", if *b { "YES" } else { "NO" }.to_string()),
            PrefValue::Int(i) => ("-int", i.to_string()),
            PrefValue::Float(f) => ("-float", f.to_string()),
            PrefValue::Date(d) => ("-date", d.clone()),
            PrefValue::String(s) => ("-string", s.clone()),
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{}", b),
            PrefValue::Int(i) => write!(f, "{}", i),
            PrefValue::Float(x) => write!(f, "{}", x),
            PrefValue::Date(s) | PrefValue::String(s) => f.write_str(s),
        }
    }
}

fn looks_like_date(text: &str) -> bool {
    text.contains('T') && (text.contains('Z') || text.contains('+'))
}

/// One persisted-configuration hypothesis to explore under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState {
    pub prefs: BTreeMap<String, PrefValue>,
}

const MAX_LABEL_KEYS: usize = 3;
const MAX_LABEL_LEN: usize = 50;

impl WorldState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: PrefValue) -> Self {
        self.prefs.insert(key.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.prefs.is_empty()
    }

    /// Whether every required key is present here with an equal value.
    pub fn satisfies(&self, required: &WorldState) -> bool {
        required
            .prefs
            .iter()
            .all(|(k, v)| self.prefs.get(k) == Some(v))
    }

    /// Short name used in logs and screenshot file names.
    pub fn label(&self) -> String {
        if self.prefs.is_empty() {
            return "default".to_string();
        }
        let joined = self
            .prefs
            .iter()
            .take(MAX_LABEL_KEYS)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("_");
        joined
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(MAX_LABEL_LEN)
            .collect()
    }
}

/// Put the empty world state first, adding it if absent, and drop duplicates.
pub fn with_empty_first(states: &[WorldState]) -> Vec<WorldState> {
    let mut ordered = vec![WorldState::empty()];
    for state in states {
        if !ordered.contains(state) {
            ordered.push(state.clone());
        }
    }
    ordered
}
