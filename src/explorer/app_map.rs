use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::screen::element::Snapshot;
use crate::screen::fingerprint::{Fingerprint, FingerprintConfig};
use crate::screen::reader::SnapshotCaps;

use super::action::Action;

// ============================================================================
// Explorer configuration
// ============================================================================

/// Configuration for one discovery crawl.
///
/// Controls the hard caps that bound the search and the label lists that
/// separate exploration candidates from recovery controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Maximum action-path length of any recorded screen (default 3)
    pub max_depth: usize,

    /// Maximum number of screens recorded per pass (default 30)
    pub max_screens: usize,

    /// Maximum buttons tried per screen (default 15)
    pub max_actions: usize,

    /// Maximum list cells tried per screen (default 10)
    pub max_cells: usize,

    /// Maximum candidate actions performed per pass (default 500)
    pub max_iterations: usize,

    /// Try swipe-left/right on screens without a tab bar (default true)
    pub probe_swipes: bool,

    /// Button labels never used as exploration candidates
    pub exit_labels: Vec<String>,

    /// Controls tried, in order, to dismiss a presented screen
    pub dismiss_labels: Vec<String>,

    pub fingerprint: FingerprintConfig,

    pub caps: SnapshotCaps,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_screens: 30,
            max_actions: 15,
            max_cells: 10,
            max_iterations: 500,
            probe_swipes: true,
            exit_labels: ["Back", "Cancel", "Done", "Close"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dismiss_labels: ["Close", "\u{00d7}", "xmark", "Done", "Cancel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fingerprint: FingerprintConfig::default(),
            caps: SnapshotCaps::default(),
        }
    }
}

// ============================================================================
// Screen graph data model
// ============================================================================

/// A distinct UI state discovered during one world-state pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screen {
    /// `NN-context`, e.g. `02-tap-Settings`
    pub name: String,

    pub fingerprint: Fingerprint,

    /// Actions that reach this screen from a cold launch
    pub path: Vec<Action>,

    pub snapshot: Snapshot,

    /// Where the screenshot taken on first sight was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl Screen {
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// A navigation observed between two recorded screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: Fingerprint,
    pub to: Fingerprint,
    pub action: Action,
}

/// Deduplicated screens of one pass, keyed by fingerprint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenMap {
    /// Screens in recording order
    screens: Vec<Screen>,

    /// Directed edges between screens
    pub transitions: Vec<Transition>,

    #[serde(skip)]
    index: HashMap<Fingerprint, usize>,
}

impl ScreenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a screen unless its fingerprint is already present.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, screen: Screen) -> bool {
        if self.index.contains_key(&screen.fingerprint) {
            return false;
        }
        self.index
            .insert(screen.fingerprint.clone(), self.screens.len());
        self.screens.push(screen);
        true
    }

    pub fn add_transition(&mut self, transition: Transition) {
        let exists = self.transitions.iter().any(|t| {
            t.from == transition.from && t.to == transition.to && t.action == transition.action
        });
        if !exists {
            self.transitions.push(transition);
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Screen> {
        self.index.get(fingerprint).and_then(|&i| self.screens.get(i))
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    pub fn into_screens(self) -> Vec<Screen> {
        self.screens
    }
}
