//! Session identity and lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single session.
///
/// Within a session transitions only move forward:
/// `Idle → Running → Stopping → Stopped`. A stopped controller returns to
/// `Idle` when the next session is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Running)
                | (SessionState::Running, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Stopped)
                | (SessionState::Stopped, SessionState::Idle)
        )
    }
}

/// Identity of a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub label: String,
    pub start_epoch_ms: i64,
}

/// Fallback session id for null or blank input.
pub const UNKNOWN_SESSION: &str = "unknown";
/// Fallback label for null or blank input.
pub const UNLABELED: &str = "unlabeled";

impl SessionInfo {
    /// Build session info, trimming the inputs and substituting the
    /// fallbacks for blank values.
    pub fn new(id: Option<&str>, label: Option<&str>, start_epoch_ms: i64) -> Self {
        Self {
            id: non_blank(id, UNKNOWN_SESSION),
            label: non_blank(label, UNLABELED),
            start_epoch_ms,
        }
    }
}

fn non_blank(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub state: SessionState,
}
