//! Linux Industrial I/O (IIO) sysfs binding for accelerometers and gyroscopes.
//!
//! Devices live under `/sys/bus/iio/devices/iio:deviceN`. Each axis is exposed
//! as a raw integer file (`in_accel_x_raw`, `in_anglvel_x_raw`, ...) and a
//! shared scale (`in_accel_scale`, `in_anglvel_scale`). This source polls
//! those files on one thread per subscribed kind.

use crate::sensor::clock::monotonic_now_ns;
use crate::sensor::source::{SampleCallback, SensorError, SensorSource};
use crate::sensor::types::{RawSample, SensorKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default sysfs location of IIO devices.
pub const DEFAULT_IIO_PATH: &str = "/sys/bus/iio/devices";

/// A sensor source polling IIO sysfs channels.
pub struct IioSource {
    base: PathBuf,
    rate_hz: u32,
    pollers: HashMap<SensorKind, Poller>,
}

struct Poller {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// The sysfs files backing one sensor kind on one device.
#[derive(Debug, Clone)]
struct Channels {
    axes: [PathBuf; 3],
    scale: f64,
}

impl IioSource {
    /// Create a source scanning `base` for devices, polling at `rate_hz`.
    pub fn new(base: impl Into<PathBuf>, rate_hz: u32) -> Self {
        Self {
            base: base.into(),
            rate_hz: rate_hz.max(1),
            pollers: HashMap::new(),
        }
    }

    /// Whether any device under the base path exposes `kind`.
    pub fn is_available(&self, kind: SensorKind) -> bool {
        find_channels(&self.base, kind).is_some()
    }
}

impl SensorSource for IioSource {
    fn subscribe(&mut self, kind: SensorKind, callback: SampleCallback) -> Result<(), SensorError> {
        if self.pollers.contains_key(&kind) {
            return Err(SensorError::AlreadySubscribed(kind));
        }
        let channels = find_channels(&self.base, kind).ok_or(SensorError::Unavailable(kind))?;
        tracing::debug!(%kind, axes = ?channels.axes, scale = channels.scale, "IIO channels found");

        self.pollers
            .insert(kind, spawn_poller(kind, channels, self.rate_hz, callback));
        Ok(())
    }

    fn unsubscribe(&mut self, kind: SensorKind) -> Result<(), SensorError> {
        let poller = self
            .pollers
            .remove(&kind)
            .ok_or(SensorError::NotSubscribed(kind))?;
        poller.running.store(false, Ordering::SeqCst);
        poller
            .handle
            .join()
            .map_err(|_| SensorError::Io(format!("{kind} poller thread panicked")))
    }
}

impl Drop for IioSource {
    fn drop(&mut self) {
        for (_, poller) in self.pollers.drain() {
            poller.running.store(false, Ordering::SeqCst);
            let _ = poller.handle.join();
        }
    }
}

fn channel_prefix(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Accel => "in_accel",
        SensorKind::Gyro => "in_anglvel",
    }
}

/// Find the first device (in name order) exposing all three axes of `kind`
/// with a usable scale.
fn find_channels(base: &Path, kind: SensorKind) -> Option<Channels> {
    let prefix = channel_prefix(kind);

    let mut devices: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    devices.sort();

    devices.into_iter().find_map(|dir| {
        let axes = ["x", "y", "z"].map(|axis| dir.join(format!("{prefix}_{axis}_raw")));
        if !axes.iter().all(|p| p.is_file()) {
            return None;
        }
        let scale = read_scale(&dir.join(format!("{prefix}_scale")))?;
        Some(Channels { axes, scale })
    })
}

/// Scale factor for a channel group: 1.0 when the file is absent, `None`
/// (device skipped) when it exists but cannot be read as a number.
fn read_scale(path: &Path) -> Option<f64> {
    if !path.exists() {
        return Some(1.0);
    }
    match read_number(path) {
        Ok(scale) => Some(scale),
        Err(e) => {
            tracing::warn!("Skipping IIO device with unusable scale: {}", e);
            None
        }
    }
}

fn read_number(path: &Path) -> Result<f64, SensorError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SensorError::Io(format!("{}: {e}", path.display())))?;
    content
        .trim()
        .parse::<f64>()
        .map_err(|e| SensorError::Io(format!("{}: {e}", path.display())))
}

fn read_sample(channels: &Channels) -> Result<RawSample, SensorError> {
    let timestamp_ns = monotonic_now_ns();
    let x = read_number(&channels.axes[0])?;
    let y = read_number(&channels.axes[1])?;
    let z = read_number(&channels.axes[2])?;
    let s = channels.scale;
    Ok(RawSample::new(timestamp_ns, x * s, y * s, z * s))
}

fn spawn_poller(
    kind: SensorKind,
    channels: Channels,
    rate_hz: u32,
    mut callback: SampleCallback,
) -> Poller {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let period = Duration::from_secs_f64(1.0 / rate_hz as f64);

    let handle = thread::spawn(move || {
        let mut failures: u64 = 0;
        while flag.load(Ordering::SeqCst) {
            match read_sample(&channels) {
                Ok(sample) => callback(sample),
                Err(e) => {
                    failures += 1;
                    // A sysfs read can fail transiently while the driver resumes.
                    if failures == 1 || failures % 1000 == 0 {
                        tracing::warn!(%kind, failures, "IIO read failed: {}", e);
                    }
                }
            }
            thread::sleep(period);
        }
    });

    Poller { running, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn fake_device(base: &Path, name: &str, prefix: &str, raw: [&str; 3], scale: Option<&str>) {
        let dir = base.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (axis, value) in ["x", "y", "z"].iter().zip(raw) {
            std::fs::write(dir.join(format!("{prefix}_{axis}_raw")), value).unwrap();
        }
        if let Some(scale) = scale {
            std::fs::write(dir.join(format!("{prefix}_scale")), scale).unwrap();
        }
    }

    #[test]
    fn test_discovery() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "iio:device0", "in_accel", ["1", "2", "3"], Some("0.5\n"));

        let source = IioSource::new(tmp.path(), 100);
        assert!(source.is_available(SensorKind::Accel));
        assert!(!source.is_available(SensorKind::Gyro));
    }

    #[test]
    fn test_missing_base_is_unavailable() {
        let mut source = IioSource::new("/nonexistent/iio/devices", 100);
        let result = source.subscribe(SensorKind::Accel, Box::new(|_| {}));
        assert!(matches!(result, Err(SensorError::Unavailable(SensorKind::Accel))));
    }

    #[test]
    fn test_polls_scaled_values() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "iio:device1", "in_anglvel", ["10", "-20", "4\n"], Some("0.25"));

        let mut source = IioSource::new(tmp.path(), 200);
        let (tx, rx) = unbounded();
        source
            .subscribe(
                SensorKind::Gyro,
                Box::new(move |s| {
                    let _ = tx.send(s);
                }),
            )
            .unwrap();

        let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        source.unsubscribe(SensorKind::Gyro).unwrap();

        assert!((sample.values.x - 2.5).abs() < 1e-9);
        assert!((sample.values.y + 5.0).abs() < 1e-9);
        assert!((sample.values.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_defaults_to_one() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "iio:device0", "in_accel", ["7", "8", "9"], None);

        let channels = find_channels(tmp.path(), SensorKind::Accel).unwrap();
        let sample = read_sample(&channels).unwrap();
        assert_eq!(sample.values.x, 7.0);
        assert_eq!(sample.values.z, 9.0);
    }

    #[test]
    fn test_malformed_scale_skips_device() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "iio:device0", "in_accel", ["7", "8", "9"], Some("n/a"));

        let source = IioSource::new(tmp.path(), 100);
        assert!(!source.is_available(SensorKind::Accel));

        // A later device with a valid scale is used instead.
        fake_device(tmp.path(), "iio:device1", "in_accel", ["7", "8", "9"], Some("2"));
        let channels = find_channels(tmp.path(), SensorKind::Accel).unwrap();
        assert_eq!(channels.scale, 2.0);
        assert!(channels.axes[0].starts_with(tmp.path().join("iio:device1")));
    }
}
