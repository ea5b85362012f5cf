//! The session controller: the only control surface of the logger.
//!
//! # Locking
//!
//! Two mutexes are involved:
//! - `control` serializes `start`/`stop` and owns the multiplexer, so a
//!   `start` never observes a half-finished `stop`.
//! - `Shared::inner` guards the state and the active session's resources.
//!   The sample path takes only this lock.
//!
//! `stop` moves the state to `Stopping` and takes the active session out of
//! `inner` before unsubscribing. A sample racing with `stop` is either
//! written before that point or dropped; nothing is ever written through a
//! closed file.

use crate::ledger::SharedLedger;
use crate::sensor::clock::epoch_now_ms;
use crate::sensor::multiplexer::{Multiplexer, SampleSink};
use crate::sensor::source::SensorSource;
use crate::sensor::types::{Sample, SensorKind};
use crate::session::aggregate::Aggregates;
use crate::session::events::{
    EventBus, FaultKind, LiveThrottle, SessionEvent, DEFAULT_LIVE_CADENCE,
};
use crate::session::state::{Session, SessionInfo, SessionState};
use crate::session::writer::{LogWriter, SummaryRecord, WriterError};
use chrono::Local;
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Log every Nth consecutive write failure (plus the first).
const WRITE_FAILURE_REPORT_EVERY: u64 = 1000;

/// Settings fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory receiving one CSV file per session.
    pub logs_dir: PathBuf,
    /// Sensor kinds to subscribe on start.
    pub kinds: Vec<SensorKind>,
    /// Publish every Nth processed sample as a live event.
    pub live_cadence: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            kinds: SensorKind::ALL.to_vec(),
            live_cadence: DEFAULT_LIVE_CADENCE,
        }
    }
}

/// Result of an accepted or ignored `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session is already running; nothing changed.
    AlreadyRunning,
}

impl StartOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

/// Errors that abort a `start`.
#[derive(Debug)]
pub enum StartError {
    /// The session log could not be created.
    Open(WriterError),
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Open(e) => write!(f, "Could not open session log: {e}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartError::Open(e) => Some(e),
        }
    }
}

/// Resources that exist only while a session is running.
struct ActiveSession {
    info: SessionInfo,
    aggregates: Aggregates,
    writer: LogWriter,
    throttle: LiveThrottle,
    write_failures: u64,
}

struct Inner {
    state: SessionState,
    info: Option<SessionInfo>,
    active: Option<ActiveSession>,
    last_log_path: Option<PathBuf>,
}

impl Inner {
    /// Move to `next` if the state machine allows it.
    fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::error!(from = ?self.state, to = ?next, "Illegal session state transition");
            return false;
        }
        self.state = next;
        true
    }
}

struct Shared {
    inner: Mutex<Inner>,
    events: EventBus,
    ledger: Option<SharedLedger>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Sample delivery path. Runs on the source's threads.
    fn on_sample(&self, sample: Sample) {
        let mut inner = lock(&self.inner);
        if !inner.state.is_running() {
            return;
        }
        let Some(active) = inner.active.as_mut() else {
            return;
        };

        active.aggregates.update(
            sample.kind,
            sample.values.x,
            sample.values.y,
            sample.values.z,
        );

        let mut fault = None;
        if let Err(e) = active.writer.append(&sample) {
            active.write_failures += 1;
            if let Some(ledger) = &self.ledger {
                ledger.record_write_failure();
            }
            let failures = active.write_failures;
            if failures == 1 || failures % WRITE_FAILURE_REPORT_EVERY == 0 {
                tracing::error!(session_id = %active.info.id, failures, "{}", e);
                fault = Some(SessionEvent::Fault {
                    session_id: active.info.id.clone(),
                    label: active.info.label.clone(),
                    fault: FaultKind::WriteFailed,
                    message: e.to_string(),
                });
            }
        }

        let live = active.throttle.tick().then(|| SessionEvent::LiveSample {
            session_id: active.info.id.clone(),
            label: active.info.label.clone(),
            sensor: sample.kind,
            x: sample.values.x,
            y: sample.values.y,
            z: sample.values.z,
        });

        drop(inner);

        if let Some(event) = fault {
            self.events.publish(event);
        }
        if let Some(event) = live {
            self.events.publish(event);
        }
    }
}

/// Owns the single session of a logger instance.
pub struct SessionController {
    shared: Arc<Shared>,
    control: Mutex<Multiplexer>,
    config: ControllerConfig,
}

impl SessionController {
    /// Create a controller over `source`. The clock offset is captured now.
    pub fn new(source: Box<dyn SensorSource>, config: ControllerConfig) -> Self {
        Self::build(Multiplexer::new(source), config, None)
    }

    /// Like [`SessionController::new`], also feeding `ledger`.
    pub fn with_ledger(
        source: Box<dyn SensorSource>,
        config: ControllerConfig,
        ledger: SharedLedger,
    ) -> Self {
        Self::build(Multiplexer::new(source), config, Some(ledger))
    }

    /// Create a controller over a prepared multiplexer.
    pub fn with_multiplexer(multiplexer: Multiplexer, config: ControllerConfig) -> Self {
        Self::build(multiplexer, config, None)
    }

    fn build(
        multiplexer: Multiplexer,
        config: ControllerConfig,
        ledger: Option<SharedLedger>,
    ) -> Self {
        tracing::debug!(
            offset_ms = multiplexer.offset().as_millis(),
            logs_dir = %config.logs_dir.display(),
            "Session controller created"
        );
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    info: None,
                    active: None,
                    last_log_path: None,
                }),
                events: EventBus::new(),
                ledger,
            }),
            control: Mutex::new(multiplexer),
            config,
        }
    }

    /// Register an observer for lifecycle, live and fault events.
    pub fn subscribe_events(&self) -> Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    /// The current (or most recent) session, if any start was attempted.
    pub fn current_session(&self) -> Option<Session> {
        let inner = lock(&self.shared.inner);
        inner.info.clone().map(|info| Session {
            info,
            state: inner.state,
        })
    }

    /// Path of the most recently closed log.
    pub fn last_log_path(&self) -> Option<PathBuf> {
        lock(&self.shared.inner).last_log_path.clone()
    }

    pub fn logs_dir(&self) -> &Path {
        &self.config.logs_dir
    }

    /// Start a session.
    ///
    /// Returns [`StartOutcome::AlreadyRunning`] without side effects when a
    /// session is running. If the log cannot be opened the controller stays
    /// `Idle` and no event is published.
    pub fn start(
        &self,
        label: &str,
        session_id: &str,
        start_epoch_ms: i64,
    ) -> Result<StartOutcome, StartError> {
        let mut multiplexer = lock(&self.control);

        let info = SessionInfo::new(Some(session_id), Some(label), start_epoch_ms);
        {
            let inner = lock(&self.shared.inner);
            if inner.state.is_running() {
                tracing::info!(
                    requested = %info.id,
                    running = ?inner.info.as_ref().map(|i| i.id.as_str()),
                    "Already running; ignoring start"
                );
                return Ok(StartOutcome::AlreadyRunning);
            }
        }

        // Nothing observable changes until the log is open.
        let writer = LogWriter::create(&self.config.logs_dir, &info, Local::now()).map_err(|e| {
            tracing::error!(session_id = %info.id, "Could not open session log: {}", e);
            StartError::Open(e)
        })?;
        tracing::info!(path = %writer.path().display(), "Writing session log");

        {
            let mut inner = lock(&self.shared.inner);
            if inner.state == SessionState::Stopped {
                inner.advance(SessionState::Idle);
            }
            inner.info = Some(info.clone());
            inner.active = Some(ActiveSession {
                info: info.clone(),
                aggregates: Aggregates::new(),
                writer,
                throttle: LiveThrottle::new(self.config.live_cadence),
                write_failures: 0,
            });
            inner.advance(SessionState::Running);
        }

        if let Some(ledger) = &self.shared.ledger {
            ledger.record_session_started();
        }
        self.shared.events.publish(SessionEvent::Started {
            session_id: info.id.clone(),
            label: info.label.clone(),
            start_epoch_ms: info.start_epoch_ms,
        });

        let shared = self.shared.clone();
        let sink: SampleSink = Arc::new(move |sample| shared.on_sample(sample));
        let report = multiplexer.subscribe_all(&self.config.kinds, sink);

        for (kind, e) in report.failed {
            self.shared.events.publish(SessionEvent::Fault {
                session_id: info.id.clone(),
                label: info.label.clone(),
                fault: FaultKind::SensorUnavailable,
                message: format!("{kind}: {e}"),
            });
        }
        if report.subscribed.is_empty() {
            tracing::warn!(session_id = %info.id, "No sensors available; log will hold no samples");
        }

        tracing::info!(
            session_id = %info.id,
            label = %info.label,
            sensors = ?report.subscribed,
            observers = self.shared.events.subscriber_count(),
            "Session started"
        );
        Ok(StartOutcome::Started)
    }

    /// Stop the running session. Does nothing unless a session is running.
    pub fn stop(&self) {
        let mut multiplexer = lock(&self.control);

        let active = {
            let mut inner = lock(&self.shared.inner);
            if !inner.state.is_running() {
                tracing::debug!(state = ?inner.state, "Not running; ignoring stop");
                return;
            }
            inner.advance(SessionState::Stopping);
            inner.active.take()
        };

        tracing::debug!(sensors = ?multiplexer.subscribed(), "Unsubscribing sensors");
        multiplexer.unsubscribe_all();

        let Some(active) = active else {
            lock(&self.shared.inner).advance(SessionState::Stopped);
            return;
        };
        let ActiveSession {
            info,
            aggregates,
            writer,
            write_failures,
            ..
        } = active;

        let summary = SummaryRecord {
            duration_ms: epoch_now_ms() - info.start_epoch_ms,
            accel: aggregates.finalize(SensorKind::Accel),
            gyro: aggregates.finalize(SensorKind::Gyro),
        };

        let path = writer.path().to_path_buf();
        let records = writer.records_written();
        if let Err(e) = writer.finish(&summary) {
            tracing::error!(path = %path.display(), "Error closing session log: {}", e);
        }

        {
            let mut inner = lock(&self.shared.inner);
            inner.advance(SessionState::Stopped);
            inner.last_log_path = Some(path.clone());
        }

        if let Some(ledger) = &self.shared.ledger {
            ledger.record_session_completed();
            ledger.record_samples(SensorKind::Accel, summary.accel.count);
            ledger.record_samples(SensorKind::Gyro, summary.gyro.count);
        }

        self.shared.events.publish(SessionEvent::Stopped {
            session_id: info.id.clone(),
            label: info.label.clone(),
            duration_ms: summary.duration_ms,
            acc_count: summary.accel.count,
            gyro_count: summary.gyro.count,
            acc_mean: summary.accel.mean,
            gyro_mean: summary.gyro.mean,
        });

        tracing::info!(
            session_id = %info.id,
            duration_ms = summary.duration_ms,
            acc = summary.accel.count,
            gyro = summary.gyro.count,
            records,
            write_failures,
            path = %path.display(),
            "Session stopped"
        );
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
