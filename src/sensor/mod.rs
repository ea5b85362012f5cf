//! Sensor access for the motion logger.
//!
//! Hardware sits behind the [`SensorSource`] trait. Two implementations are
//! provided: [`IioSource`] for Linux IIO devices and [`SyntheticSource`] for
//! deterministic tests and demos. The [`Multiplexer`] subscribes a source to
//! every requested kind and normalizes timestamps.

pub mod clock;
pub mod iio;
pub mod multiplexer;
pub mod source;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use clock::{epoch_now_ms, monotonic_now_ns, ClockOffset};
pub use iio::{IioSource, DEFAULT_IIO_PATH};
pub use multiplexer::{Multiplexer, SampleSink, SubscribeReport};
pub use source::{SampleCallback, SensorError, SensorSource};
pub use synthetic::{SyntheticFeed, SyntheticSource};
pub use types::{RawSample, Sample, SensorKind, Vector3};
