//! Sample types shared by sensor sources, the multiplexer and the session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two motion sensor kinds the logger understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Linear acceleration (m/s²)
    Accel,
    /// Angular velocity (rad/s)
    Gyro,
}

impl SensorKind {
    /// Every kind, in subscription order.
    pub const ALL: [SensorKind; 2] = [SensorKind::Accel, SensorKind::Gyro];

    /// Tag used in the `sensor` column of the CSV log.
    pub fn tag(&self) -> &'static str {
        match self {
            SensorKind::Accel => "ACC",
            SensorKind::Gyro => "GYRO",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A three-axis reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A reading as delivered by a sensor source, before it is tagged.
///
/// The timestamp is on the source's monotonic clock, not wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub timestamp_ns: i64,
    pub values: Vector3,
}

impl RawSample {
    pub fn new(timestamp_ns: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ns,
            values: Vector3::new(x, y, z),
        }
    }
}

/// A tagged sample with its timestamp translated to epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub kind: SensorKind,
    pub monotonic_timestamp_ns: i64,
    pub epoch_ms: i64,
    pub values: Vector3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_tags() {
        assert_eq!(SensorKind::Accel.tag(), "ACC");
        assert_eq!(SensorKind::Gyro.tag(), "GYRO");
        assert_eq!(SensorKind::Gyro.to_string(), "GYRO");
    }

    #[test]
    fn test_raw_sample_values() {
        let raw = RawSample::new(42, 1.0, 2.0, 3.0);
        assert_eq!(raw.timestamp_ns, 42);
        assert_eq!(raw.values, Vector3::new(1.0, 2.0, 3.0));
    }
}
