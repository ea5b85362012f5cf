//! Cumulative counters across sessions.
//!
//! The ledger records how much the logger has captured over its lifetime,
//! independent of any single session's CSV file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::sensor::types::SensorKind;

/// Service-lifetime statistics.
#[derive(Debug)]
pub struct SessionLedger {
    sessions_started: AtomicU64,
    sessions_completed: AtomicU64,
    accel_samples: AtomicU64,
    gyro_samples: AtomicU64,
    write_failures: AtomicU64,
    service_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            accel_samples: AtomicU64::new(0),
            gyro_samples: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            service_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a ledger backed by `path`, loading any previous totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut ledger = Self::new();
        ledger.persist_path = Some(path);

        if let Err(e) = ledger.load() {
            tracing::warn!("Could not load previous ledger: {}", e);
        }

        ledger
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_samples(&self, kind: SensorKind, count: u64) {
        let counter = match kind {
            SensorKind::Accel => &self.accel_samples,
            SensorKind::Gyro => &self.gyro_samples,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            accel_samples: self.accel_samples.load(Ordering::Relaxed),
            gyro_samples: self.gyro_samples.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            service_start: self.service_start,
            uptime_secs: (Utc::now() - self.service_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Logger Statistics:\n\
             - Sessions started: {}\n\
             - Sessions completed: {}\n\
             - Accelerometer samples: {}\n\
             - Gyroscope samples: {}\n\
             - Record write failures: {}\n\
             - Uptime: {} seconds",
            stats.sessions_started,
            stats.sessions_completed,
            stats.accel_samples,
            stats.gyro_samples,
            stats.write_failures,
            stats.uptime_secs
        )
    }

    /// Save totals to disk. A ledger without a path does nothing.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedLedger {
                sessions_started: stats.sessions_started,
                sessions_completed: stats.sessions_completed,
                accel_samples: stats.accel_samples,
                gyro_samples: stats.gyro_samples,
                write_failures: stats.write_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedLedger =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
                self.sessions_completed
                    .store(persisted.sessions_completed, Ordering::Relaxed);
                self.accel_samples
                    .store(persisted.accel_samples, Ordering::Relaxed);
                self.gyro_samples
                    .store(persisted.gyro_samples, Ordering::Relaxed);
                self.write_failures
                    .store(persisted.write_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ledger counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub accel_samples: u64,
    pub gyro_samples: u64,
    pub write_failures: u64,
    pub service_start: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedLedger {
    sessions_started: u64,
    sessions_completed: u64,
    accel_samples: u64,
    gyro_samples: u64,
    write_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared ledger.
pub type SharedLedger = Arc<SessionLedger>;
