//! Motion Logger - session-scoped motion sensor capture.
//!
//! This library records accelerometer and gyroscope samples during a bounded
//! session into a self-describing CSV log, keeps running per-axis means, and
//! publishes lifecycle and throttled live events to in-process observers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Motion Logger                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐     │
//! │  │   Source    │──▶│ Multiplexer │──▶│   Controller    │     │
//! │  │ (IIO/synth) │   │ (tag, time) │   │ (state machine) │     │
//! │  └─────────────┘   └─────────────┘   └─────────────────┘     │
//! │                                        │      │      │       │
//! │                                        ▼      ▼      ▼       │
//! │                              Aggregates  LogWriter  EventBus │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use motion_logger::{epoch_now_ms, ControllerConfig, SessionController, SyntheticSource};
//!
//! let source = SyntheticSource::generator(100);
//! let controller = SessionController::new(Box::new(source), ControllerConfig::default());
//! let events = controller.subscribe_events();
//!
//! controller
//!     .start("walk", "S1", epoch_now_ms())
//!     .expect("Failed to open session log");
//! // ... samples flow; events arrive on `events`
//! controller.stop();
//! ```

pub mod config;
pub mod ledger;
pub mod sensor;
pub mod session;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SourceConfig};
pub use ledger::{LedgerStats, SessionLedger, SharedLedger};
pub use sensor::{
    epoch_now_ms, ClockOffset, IioSource, Multiplexer, RawSample, Sample, SensorError,
    SensorKind, SensorSource, SyntheticFeed, SyntheticSource, Vector3,
};
pub use session::{
    ControllerConfig, FaultKind, Session, SessionController, SessionEvent, SessionInfo,
    SessionState, StartError, StartOutcome,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
