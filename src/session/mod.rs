//! Session lifecycle, statistics, persistence and events.
//!
//! This module contains:
//! - The lifecycle state machine and session identity
//! - Running per-axis aggregates
//! - The append-only CSV log writer
//! - Event types and their fan-out
//! - The controller tying them together

pub mod aggregate;
pub mod controller;
pub mod events;
pub mod state;
pub mod writer;

// Re-export commonly used types
pub use aggregate::{Aggregates, KindSummary, RunningAggregate};
pub use controller::{ControllerConfig, SessionController, StartError, StartOutcome};
pub use events::{EventBus, FaultKind, LiveThrottle, SessionEvent, DEFAULT_LIVE_CADENCE};
pub use state::{Session, SessionInfo, SessionState};
pub use writer::{LogWriter, SummaryRecord, WriterError, HEADER};
