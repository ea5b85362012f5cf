//! Session events and their in-process fan-out.
//!
//! Lifecycle events are published exactly once per transition. Live sample
//! events are a throttled projection of the sample stream: see
//! [`LiveThrottle`].

use crate::sensor::types::{SensorKind, Vector3};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Default live-sample cadence (publish every Nth sample).
pub const DEFAULT_LIVE_CADENCE: u32 = 5;

/// Everything an observer can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        label: String,
        start_epoch_ms: i64,
    },
    Stopped {
        session_id: String,
        label: String,
        duration_ms: i64,
        acc_count: u64,
        gyro_count: u64,
        acc_mean: Vector3,
        gyro_mean: Vector3,
    },
    LiveSample {
        session_id: String,
        label: String,
        sensor: SensorKind,
        x: f64,
        y: f64,
        z: f64,
    },
    /// A mid-session fault that was absorbed; the session keeps running.
    Fault {
        session_id: String,
        label: String,
        fault: FaultKind,
        message: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Started { session_id, .. }
            | SessionEvent::Stopped { session_id, .. }
            | SessionEvent::LiveSample { session_id, .. }
            | SessionEvent::Fault { session_id, .. } => session_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    WriteFailed,
    SensorUnavailable,
}

/// Fan-out publisher over unbounded channels.
///
/// Publishing never blocks. Subscribers whose receiver was dropped are
/// pruned on the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Per-session counter deciding which samples become live events.
#[derive(Debug, Clone)]
pub struct LiveThrottle {
    cadence: u64,
    counter: u64,
}

impl LiveThrottle {
    /// A cadence of 0 is treated as 1.
    pub fn new(cadence: u32) -> Self {
        Self {
            cadence: u64::from(cadence.max(1)),
            counter: 0,
        }
    }

    /// Count one processed sample; true when it should be published.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.cadence == 0
    }
}
