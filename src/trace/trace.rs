use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::explorer::action::Action;
use crate::screen::fingerprint::Fingerprint;

/// One line of the JSONL crawl trace.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u64,

    /// Label of the world state being explored
    pub world_state: String,

    /// e.g. `screen_recorded`, `action_no_effect`, `relaunched`
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn now(step: u64, world_state: &str, event: &str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            step,
            world_state: world_state.to_string(),
            event: event.to_string(),
            phase: None,
            depth: None,
            fingerprint: None,
            action: None,
            detail: None,
        }
    }

    pub fn with_phase(mut self, phase: impl std::fmt::Debug) -> Self {
        self.phase = Some(format!("{:?}", phase));
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint.to_string());
        self
    }

    pub fn with_action(mut self, action: &Action) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
