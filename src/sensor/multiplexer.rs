//! Fans samples from every sensor kind into one sink.
//!
//! The multiplexer tags each raw reading with its kind and translates its
//! monotonic timestamp to epoch milliseconds using the [`ClockOffset`] fixed
//! at construction. Each kind keeps its source arrival order; there is no
//! merge ordering across kinds.

use crate::sensor::clock::ClockOffset;
use crate::sensor::source::{SensorError, SensorSource};
use crate::sensor::types::{RawSample, Sample, SensorKind};
use std::sync::Arc;

/// Receiver of tagged samples. Called from the source's delivery threads.
pub type SampleSink = Arc<dyn Fn(Sample) + Send + Sync>;

/// Outcome of subscribing to a set of kinds.
#[derive(Debug, Default)]
pub struct SubscribeReport {
    pub subscribed: Vec<SensorKind>,
    pub failed: Vec<(SensorKind, SensorError)>,
}

pub struct Multiplexer {
    source: Box<dyn SensorSource>,
    offset: ClockOffset,
    subscribed: Vec<SensorKind>,
}

impl Multiplexer {
    /// Wrap `source`, capturing the clock offset now.
    pub fn new(source: Box<dyn SensorSource>) -> Self {
        Self::with_offset(source, ClockOffset::capture())
    }

    pub fn with_offset(source: Box<dyn SensorSource>, offset: ClockOffset) -> Self {
        Self {
            source,
            offset,
            subscribed: Vec::new(),
        }
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    /// Kinds currently subscribed.
    pub fn subscribed(&self) -> &[SensorKind] {
        &self.subscribed
    }

    /// Subscribe each of `kinds` independently.
    ///
    /// A kind that fails to subscribe is logged and reported; the others
    /// still proceed.
    pub fn subscribe_all(&mut self, kinds: &[SensorKind], sink: SampleSink) -> SubscribeReport {
        let mut report = SubscribeReport::default();

        for &kind in kinds {
            if self.subscribed.contains(&kind) {
                continue;
            }

            let sink = sink.clone();
            let offset = self.offset;
            let callback = Box::new(move |raw: RawSample| {
                sink(Sample {
                    kind,
                    monotonic_timestamp_ns: raw.timestamp_ns,
                    epoch_ms: offset.to_epoch_ms(raw.timestamp_ns),
                    values: raw.values,
                });
            });

            match self.source.subscribe(kind, callback) {
                Ok(()) => {
                    tracing::debug!(%kind, "Sensor subscribed");
                    self.subscribed.push(kind);
                    report.subscribed.push(kind);
                }
                Err(e) => {
                    tracing::error!(%kind, "Sensor subscription failed: {}", e);
                    report.failed.push((kind, e));
                }
            }
        }

        report
    }

    /// Unsubscribe every subscribed kind. Errors are logged and dropped.
    pub fn unsubscribe_all(&mut self) {
        for kind in std::mem::take(&mut self.subscribed) {
            if let Err(e) = self.source.unsubscribe(kind) {
                tracing::debug!(%kind, "Ignoring unsubscribe error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::synthetic::SyntheticSource;
    use std::sync::Mutex;

    fn collecting_sink() -> (SampleSink, Arc<Mutex<Vec<Sample>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = seen.clone();
        let sink: SampleSink = Arc::new(move |s| store.lock().unwrap().push(s));
        (sink, seen)
    }

    #[test]
    fn test_tags_and_normalizes() {
        let (source, feed) = SyntheticSource::manual();
        let mut mux = Multiplexer::with_offset(Box::new(source), ClockOffset::from_millis(1_000));
        let (sink, seen) = collecting_sink();

        let report = mux.subscribe_all(&SensorKind::ALL, sink);
        assert_eq!(report.subscribed, vec![SensorKind::Accel, SensorKind::Gyro]);
        assert!(report.failed.is_empty());

        feed.push(SensorKind::Gyro, RawSample::new(5_000_000, 0.1, 0.2, 0.3));
        feed.push(SensorKind::Accel, RawSample::new(7_900_000, 1.0, 2.0, 3.0));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, SensorKind::Gyro);
        assert_eq!(seen[0].epoch_ms, 1_005);
        assert_eq!(seen[1].kind, SensorKind::Accel);
        assert_eq!(seen[1].epoch_ms, 1_007);
        assert_eq!(seen[1].monotonic_timestamp_ns, 7_900_000);
    }

    #[test]
    fn test_missing_kind_is_not_fatal() {
        let (source, feed) = SyntheticSource::manual();
        let source = source.without(SensorKind::Gyro);
        let mut mux = Multiplexer::with_offset(Box::new(source), ClockOffset::from_millis(0));
        let (sink, seen) = collecting_sink();

        let report = mux.subscribe_all(&SensorKind::ALL, sink);
        assert_eq!(report.subscribed, vec![SensorKind::Accel]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, SensorKind::Gyro);

        assert!(feed.push(SensorKind::Accel, RawSample::new(1, 0.0, 0.0, 0.0)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_all_stops_delivery() {
        let (source, feed) = SyntheticSource::manual();
        let mut mux = Multiplexer::with_offset(Box::new(source), ClockOffset::from_millis(0));
        let (sink, seen) = collecting_sink();

        mux.subscribe_all(&SensorKind::ALL, sink);
        mux.unsubscribe_all();
        assert!(mux.subscribed().is_empty());

        assert!(!feed.push(SensorKind::Accel, RawSample::new(1, 0.0, 0.0, 0.0)));
        assert!(seen.lock().unwrap().is_empty());

        // A second call has nothing left to release.
        mux.unsubscribe_all();
    }
}
