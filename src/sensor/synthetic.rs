//! Synthetic sensor source for deterministic testing and demos.
//!
//! Two modes are available:
//! - [`SyntheticSource::manual`] hands back a [`SyntheticFeed`] that pushes
//!   samples synchronously into whatever callback is subscribed.
//! - [`SyntheticSource::generator`] spawns one thread per subscribed kind that
//!   emits a fixed waveform at the requested rate.

use crate::sensor::clock::monotonic_now_ns;
use crate::sensor::source::{SampleCallback, SensorError, SensorSource};
use crate::sensor::types::{RawSample, SensorKind};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type CallbackTable = Arc<Mutex<HashMap<SensorKind, SampleCallback>>>;

enum Mode {
    Manual(CallbackTable),
    Generator {
        rate_hz: u32,
        workers: HashMap<SensorKind, Worker>,
    },
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A sensor source that fabricates samples instead of reading hardware.
pub struct SyntheticSource {
    mode: Mode,
    missing: HashSet<SensorKind>,
}

impl SyntheticSource {
    /// Create a source driven by the returned feed.
    pub fn manual() -> (Self, SyntheticFeed) {
        let table: CallbackTable = Arc::new(Mutex::new(HashMap::new()));
        let feed = SyntheticFeed {
            table: table.clone(),
        };
        let source = Self {
            mode: Mode::Manual(table),
            missing: HashSet::new(),
        };
        (source, feed)
    }

    /// Create a source that emits a waveform at `rate_hz` per subscribed kind.
    pub fn generator(rate_hz: u32) -> Self {
        Self {
            mode: Mode::Generator {
                rate_hz: rate_hz.max(1),
                workers: HashMap::new(),
            },
            missing: HashSet::new(),
        }
    }

    /// Pretend the hardware for `kind` does not exist.
    pub fn without(mut self, kind: SensorKind) -> Self {
        self.missing.insert(kind);
        self
    }
}

impl SensorSource for SyntheticSource {
    fn subscribe(&mut self, kind: SensorKind, callback: SampleCallback) -> Result<(), SensorError> {
        if self.missing.contains(&kind) {
            return Err(SensorError::Unavailable(kind));
        }

        match &mut self.mode {
            Mode::Manual(table) => {
                let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
                if table.contains_key(&kind) {
                    return Err(SensorError::AlreadySubscribed(kind));
                }
                table.insert(kind, callback);
            }
            Mode::Generator { rate_hz, workers } => {
                if workers.contains_key(&kind) {
                    return Err(SensorError::AlreadySubscribed(kind));
                }
                workers.insert(kind, spawn_generator(kind, *rate_hz, callback));
            }
        }
        Ok(())
    }

    fn unsubscribe(&mut self, kind: SensorKind) -> Result<(), SensorError> {
        match &mut self.mode {
            Mode::Manual(table) => table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind)
                .map(|_| ())
                .ok_or(SensorError::NotSubscribed(kind)),
            Mode::Generator { workers, .. } => {
                let worker = workers.remove(&kind).ok_or(SensorError::NotSubscribed(kind))?;
                worker.running.store(false, Ordering::SeqCst);
                worker
                    .handle
                    .join()
                    .map_err(|_| SensorError::Io(format!("{kind} generator thread panicked")))
            }
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        if let Mode::Generator { workers, .. } = &mut self.mode {
            for (_, worker) in workers.drain() {
                worker.running.store(false, Ordering::SeqCst);
                let _ = worker.handle.join();
            }
        }
    }
}

fn spawn_generator(kind: SensorKind, rate_hz: u32, mut callback: SampleCallback) -> Worker {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let period = Duration::from_secs_f64(1.0 / rate_hz as f64);

    let handle = thread::spawn(move || {
        let mut tick: u64 = 0;
        while flag.load(Ordering::SeqCst) {
            let phase = tick as f64 * period.as_secs_f64() * std::f64::consts::TAU;
            callback(waveform(kind, monotonic_now_ns(), phase));
            tick += 1;
            thread::sleep(period);
        }
    });

    Worker { running, handle }
}

/// Gravity on z plus a 1 Hz wobble for the accelerometer; a slow
/// rotation about z for the gyroscope.
fn waveform(kind: SensorKind, timestamp_ns: i64, phase: f64) -> RawSample {
    match kind {
        SensorKind::Accel => RawSample::new(
            timestamp_ns,
            0.5 * phase.sin(),
            0.5 * phase.cos(),
            9.81 + 0.1 * (2.0 * phase).sin(),
        ),
        SensorKind::Gyro => RawSample::new(timestamp_ns, 0.0, 0.0, 0.2 * phase.sin()),
    }
}

/// Handle for pushing samples into a manual [`SyntheticSource`].
#[derive(Clone)]
pub struct SyntheticFeed {
    table: CallbackTable,
}

impl SyntheticFeed {
    /// Deliver one sample on the calling thread.
    ///
    /// Returns `false` when nothing is subscribed for `kind`.
    pub fn push(&self, kind: SensorKind, sample: RawSample) -> bool {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        match table.get_mut(&kind) {
            Some(callback) => {
                callback(sample);
                true
            }
            None => false,
        }
    }

    /// Whether a callback is currently subscribed for `kind`.
    pub fn is_subscribed(&self, kind: SensorKind) -> bool {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_manual_feed_delivers_to_subscriber() {
        let (mut source, feed) = SyntheticSource::manual();
        let (tx, rx) = unbounded();

        source
            .subscribe(
                SensorKind::Accel,
                Box::new(move |s| {
                    let _ = tx.send(s);
                }),
            )
            .unwrap();

        assert!(feed.push(SensorKind::Accel, RawSample::new(1, 1.0, 2.0, 3.0)));
        assert!(!feed.push(SensorKind::Gyro, RawSample::new(2, 0.0, 0.0, 0.0)));
        assert_eq!(rx.try_recv().unwrap().timestamp_ns, 1);

        source.unsubscribe(SensorKind::Accel).unwrap();
        assert!(!feed.is_subscribed(SensorKind::Accel));
        assert!(!feed.push(SensorKind::Accel, RawSample::new(3, 1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_missing_kind_is_unavailable() {
        let (source, _feed) = SyntheticSource::manual();
        let mut source = source.without(SensorKind::Gyro);

        let result = source.subscribe(SensorKind::Gyro, Box::new(|_| {}));
        assert!(matches!(result, Err(SensorError::Unavailable(SensorKind::Gyro))));
    }

    #[test]
    fn test_double_subscribe_rejected() {
        let (mut source, _feed) = SyntheticSource::manual();
        source.subscribe(SensorKind::Accel, Box::new(|_| {})).unwrap();
        let result = source.subscribe(SensorKind::Accel, Box::new(|_| {}));
        assert!(matches!(result, Err(SensorError::AlreadySubscribed(_))));
        assert!(matches!(
            source.unsubscribe(SensorKind::Gyro),
            Err(SensorError::NotSubscribed(SensorKind::Gyro))
        ));
    }

    #[test]
    fn test_generator_emits_until_unsubscribed() {
        let mut source = SyntheticSource::generator(500);
        let (tx, rx) = unbounded();

        source
            .subscribe(
                SensorKind::Gyro,
                Box::new(move |s| {
                    let _ = tx.send(s);
                }),
            )
            .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second.timestamp_ns >= first.timestamp_ns);

        source.unsubscribe(SensorKind::Gyro).unwrap();
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(20));
        assert!(rx.try_recv().is_err());
    }
}
