use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::element::{Element, ElementRole};

/// Compact screen identity. Equal fingerprints mean "same screen" within
/// one world-state pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much of a snapshot contributes to its fingerprint.
///
/// Content past these prefixes is invisible to identity: two screens that
/// differ only in an image or in the 21st label hash the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Leading static-text labels hashed (default 20)
    pub max_texts: usize,

    /// Leading button-like labels hashed (default 10)
    pub max_buttons: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            max_texts: 20,
            max_buttons: 10,
        }
    }
}

const FINGERPRINT_HEX_LEN: usize = 16;

/// Reduces a snapshot's element list to a `Fingerprint`.
#[derive(Debug, Clone, Default)]
pub struct ScreenHasher {
    config: FingerprintConfig,
}

impl ScreenHasher {
    pub fn new(config: FingerprintConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Order-sensitive hash over the first `max_texts` static texts followed
    /// by the first `max_buttons` button-like labels.
    ///
    /// Each label is written as `T<len>:<label>` or `B<len>:<label>`, so no
    /// label text can forge a field boundary.
    pub fn fingerprint(&self, elements: &[Element]) -> Fingerprint {
        let texts = elements
            .iter()
            .filter(|e| e.role == ElementRole::StaticText)
            .take(self.config.max_texts)
            .map(|e| format!("T{}:{}", e.label.len(), e.label));

        let buttons = elements
            .iter()
            .filter(|e| e.role.is_button_like())
            .take(self.config.max_buttons)
            .map(|e| format!("B{}:{}", e.label.len(), e.label));

        let content: String = texts.chain(buttons).collect();
        Fingerprint(label_digest(&content))
    }
}

/// Truncated SHA-1 hex digest of `text`.
pub fn label_digest(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
