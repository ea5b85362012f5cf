//! The subscription seam between the logger and sensor hardware.

use crate::sensor::types::{RawSample, SensorKind};

/// Callback invoked for every reading a source delivers for one kind.
pub type SampleCallback = Box<dyn FnMut(RawSample) + Send + 'static>;

/// A provider of motion samples.
///
/// Each kind is subscribed independently. Callbacks may run on a thread
/// owned by the source; `unsubscribe` must not return until the callback
/// for that kind will no longer be invoked.
pub trait SensorSource: Send {
    /// Start delivering samples of `kind` to `callback`.
    fn subscribe(&mut self, kind: SensorKind, callback: SampleCallback) -> Result<(), SensorError>;

    /// Stop delivering samples of `kind`.
    fn unsubscribe(&mut self, kind: SensorKind) -> Result<(), SensorError>;
}

/// Errors reported by sensor sources.
#[derive(Debug)]
pub enum SensorError {
    /// No hardware (or simulated hardware) exists for this kind.
    Unavailable(SensorKind),
    AlreadySubscribed(SensorKind),
    NotSubscribed(SensorKind),
    Io(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::Unavailable(kind) => write!(f, "{kind} sensor not available"),
            SensorError::AlreadySubscribed(kind) => write!(f, "{kind} sensor already subscribed"),
            SensorError::NotSubscribed(kind) => write!(f, "{kind} sensor not subscribed"),
            SensorError::Io(e) => write!(f, "Sensor IO error: {e}"),
        }
    }
}

impl std::error::Error for SensorError {}
