//! Running per-axis statistics for each sensor kind.

use crate::sensor::types::{SensorKind, Vector3};
use serde::{Deserialize, Serialize};

/// Count and per-axis sums for one sensor kind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAggregate {
    pub count: u64,
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_z: f64,
}

impl RunningAggregate {
    pub fn add(&mut self, x: f64, y: f64, z: f64) {
        self.count += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_z += z;
    }

    /// Per-axis mean; all zeros when nothing was added.
    pub fn mean(&self) -> Vector3 {
        if self.count == 0 {
            return Vector3::default();
        }
        let n = self.count as f64;
        Vector3::new(self.sum_x / n, self.sum_y / n, self.sum_z / n)
    }
}

/// Finalized statistics for one sensor kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub count: u64,
    pub mean: Vector3,
}

/// Aggregates for every sensor kind in a session.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    accel: RunningAggregate,
    gyro: RunningAggregate,
}

impl Aggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, kind: SensorKind, x: f64, y: f64, z: f64) {
        self.get_mut(kind).add(x, y, z);
    }

    pub fn finalize(&self, kind: SensorKind) -> KindSummary {
        let aggregate = self.get(kind);
        KindSummary {
            count: aggregate.count,
            mean: aggregate.mean(),
        }
    }

    pub fn get(&self, kind: SensorKind) -> &RunningAggregate {
        match kind {
            SensorKind::Accel => &self.accel,
            SensorKind::Gyro => &self.gyro,
        }
    }

    fn get_mut(&mut self, kind: SensorKind) -> &mut RunningAggregate {
        match kind {
            SensorKind::Accel => &mut self.accel,
            SensorKind::Gyro => &mut self.gyro,
        }
    }
}
