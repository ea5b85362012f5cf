//! Append-only CSV log, one file per session.
//!
//! Layout:
//!
//! ```text
//! # epoch_ms,event_ts_ns,sensor,x,y,z,label,sessionId
//! 1718000000123,5123000000,ACC,0.01,9.79,0.2,walk,S1
//! ...
//! # SUMMARY,duration_ms=12034,accN=601,gyroN=598,accAvg=(..),gyroAvg=(..)
//! ```
//!
//! Only the header is flushed when written. Records go through a
//! `BufWriter` and reach disk on buffer spill or at close.

use crate::sensor::types::{Sample, Vector3};
use crate::session::aggregate::KindSummary;
use crate::session::state::{SessionInfo, UNKNOWN_SESSION, UNLABELED};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header line written at the top of every log.
pub const HEADER: &str = "# epoch_ms,event_ts_ns,sensor,x,y,z,label,sessionId";

/// Device tag embedded in file names.
pub const DEVICE_TAG: &str = "PHONE";

/// End-of-session statistics written as the trailer line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRecord {
    pub duration_ms: i64,
    pub accel: KindSummary,
    pub gyro: KindSummary,
}

impl SummaryRecord {
    pub fn to_line(&self) -> String {
        format!(
            "# SUMMARY,duration_ms={},accN={},gyroN={},accAvg={},gyroAvg={}",
            self.duration_ms,
            self.accel.count,
            self.gyro.count,
            triple(&self.accel.mean),
            triple(&self.gyro.mean),
        )
    }
}

fn triple(v: &Vector3) -> String {
    format!("({},{},{})", v.x, v.y, v.z)
}

/// Errors from the log writer.
#[derive(Debug)]
pub enum WriterError {
    CreateDir { path: PathBuf, source: std::io::Error },
    Create { path: PathBuf, source: std::io::Error },
    Write(std::io::Error),
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::CreateDir { path, source } => {
                write!(f, "Could not create log directory {}: {source}", path.display())
            }
            WriterError::Create { path, source } => {
                write!(f, "Could not create log file {}: {source}", path.display())
            }
            WriterError::Write(e) => write!(f, "Log write failed: {e}"),
        }
    }
}

impl std::error::Error for WriterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::CreateDir { source, .. } | WriterError::Create { source, .. } => {
                Some(source)
            }
            WriterError::Write(e) => Some(e),
        }
    }
}

/// Writer for one session's log file.
pub struct LogWriter {
    path: PathBuf,
    out: BufWriter<File>,
    label: String,
    session_id: String,
    records_written: u64,
}

impl LogWriter {
    /// Create `logs_dir` if needed, create the session file and write the header.
    ///
    /// Fails with [`WriterError::Create`] if a file of the same name already
    /// exists. If the header cannot be written the new file is removed again,
    /// so a failed open never leaves anything behind.
    pub fn create(
        logs_dir: &Path,
        session: &SessionInfo,
        created_at: DateTime<Local>,
    ) -> Result<Self, WriterError> {
        std::fs::create_dir_all(logs_dir).map_err(|source| WriterError::CreateDir {
            path: logs_dir.to_path_buf(),
            source,
        })?;

        // Never reuse a name: an existing log from the same second stays intact.
        let path = logs_dir.join(file_name(session, created_at));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| WriterError::Create {
                path: path.clone(),
                source,
            })?;

        let mut writer = Self {
            path,
            out: BufWriter::new(file),
            label: field(&session.label),
            session_id: field(&session.id),
            records_written: 0,
        };

        if let Err(source) = writer.write_header() {
            let path = writer.path.clone();
            drop(writer);
            let _ = std::fs::remove_file(&path);
            return Err(WriterError::Create { path, source });
        }

        Ok(writer)
    }

    /// Wrap an already open file without writing a header or buffering.
    #[cfg(test)]
    pub(crate) fn unbuffered(path: PathBuf, file: File, session: &SessionInfo) -> Self {
        Self {
            path,
            out: BufWriter::with_capacity(0, file),
            label: field(&session.label),
            session_id: field(&session.id),
            records_written: 0,
        }
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "{HEADER}")?;
        self.out.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Append one record. The write is buffered.
    pub fn append(&mut self, sample: &Sample) -> Result<(), WriterError> {
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{}",
            sample.epoch_ms,
            sample.monotonic_timestamp_ns,
            sample.kind.tag(),
            sample.values.x,
            sample.values.y,
            sample.values.z,
            self.label,
            self.session_id,
        )
        .map_err(WriterError::Write)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write the trailer, flush, sync and close the file.
    pub fn finish(mut self, summary: &SummaryRecord) -> Result<PathBuf, WriterError> {
        writeln!(self.out, "{}", summary.to_line()).map_err(WriterError::Write)?;
        self.out.flush().map_err(WriterError::Write)?;
        if let Err(e) = self.out.get_ref().sync_all() {
            tracing::warn!(path = %self.path.display(), "fsync failed: {}", e);
        }
        Ok(self.path)
    }
}

/// `SESSION_<id>_PHONE_<label>_<yyyyMMdd_HHmmss>.csv`
pub fn file_name(session: &SessionInfo, created_at: DateTime<Local>) -> String {
    format!(
        "SESSION_{}_{}_{}_{}.csv",
        file_component(&session.id, UNKNOWN_SESSION),
        DEVICE_TAG,
        file_component(&session.label, UNLABELED),
        created_at.format("%Y%m%d_%H%M%S"),
    )
}

/// Restrict a file name component to `[A-Za-z0-9_-]`.
fn file_component(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return fallback.to_string();
    }
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Keep a record field from splitting the line or adding columns.
fn field(value: &str) -> String {
    value.replace([',', '\n', '\r'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::types::SensorKind;
    use chrono::TimeZone;

    fn info(id: &str, label: &str) -> SessionInfo {
        SessionInfo::new(Some(id), Some(label), 1_000)
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
    }

    fn sample(kind: SensorKind, ts: i64) -> Sample {
        Sample {
            kind,
            monotonic_timestamp_ns: ts,
            epoch_ms: 1_000 + ts / 1_000_000,
            values: Vector3::new(1.5, -2.0, 3.0),
        }
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            file_name(&info("S1", "walk"), at()),
            "SESSION_S1_PHONE_walk_20240309_070502.csv"
        );
        assert_eq!(
            file_name(&SessionInfo::new(None, None, 0), at()),
            "SESSION_unknown_PHONE_unlabeled_20240309_070502.csv"
        );
        assert_eq!(
            file_name(&info("a/b", "../up stairs"), at()),
            "SESSION_a_b_PHONE____up_stairs_20240309_070502.csv"
        );
    }

    #[test]
    fn test_header_records_and_trailer() {
        let tmp = tempfile::tempdir().unwrap();
        let logs = tmp.path().join("logs");

        let mut writer = LogWriter::create(&logs, &info("S1", "walk"), at()).unwrap();
        let path = writer.path().to_path_buf();

        // Header is on disk before any record is written.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{HEADER}\n"));

        writer.append(&sample(SensorKind::Accel, 2_000_000)).unwrap();
        writer.append(&sample(SensorKind::Gyro, 3_000_000)).unwrap();
        assert_eq!(writer.records_written(), 2);

        let summary = SummaryRecord {
            duration_ms: 42,
            accel: KindSummary {
                count: 1,
                mean: Vector3::new(1.5, -2.0, 3.0),
            },
            gyro: KindSummary::default(),
        };
        let closed = writer.finish(&summary).unwrap();
        assert_eq!(closed, path);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "1002,2000000,ACC,1.5,-2,3,walk,S1");
        assert_eq!(lines[2], "1003,3000000,GYRO,1.5,-2,3,walk,S1");
        assert_eq!(
            lines[3],
            "# SUMMARY,duration_ms=42,accN=1,gyroN=0,accAvg=(1.5,-2,3),gyroAvg=(0,0,0)"
        );
    }

    #[test]
    fn test_record_fields_stay_in_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = LogWriter::create(tmp.path(), &info("S,2", "sit,\nstill"), at()).unwrap();
        writer.append(&sample(SensorKind::Accel, 0)).unwrap();
        let path = writer.finish(&SummaryRecord {
            duration_ms: 0,
            accel: KindSummary::default(),
            gyro: KindSummary::default(),
        });
        let content = std::fs::read_to_string(path.unwrap()).unwrap();
        let record = content.lines().nth(1).unwrap();
        assert_eq!(record.split(',').count(), 8);
        assert!(record.ends_with("sit__still,S_2"));
    }

    #[test]
    fn test_create_fails_when_logs_dir_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = LogWriter::create(&blocker, &info("S1", "walk"), at());
        assert!(matches!(result, Err(WriterError::CreateDir { .. })));
    }

    #[test]
    fn test_name_collision_keeps_existing_log() {
        let tmp = tempfile::tempdir().unwrap();

        let mut first = LogWriter::create(tmp.path(), &info("S1", "walk"), at()).unwrap();
        for i in 0..10 {
            first.append(&sample(SensorKind::Accel, i)).unwrap();
        }
        let path = first
            .finish(&SummaryRecord {
                duration_ms: 10,
                accel: KindSummary::default(),
                gyro: KindSummary::default(),
            })
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let second = LogWriter::create(tmp.path(), &info("S1", "walk"), at());
        match second {
            Err(WriterError::Create { path: clash, source }) => {
                assert_eq!(clash, path);
                assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists);
            }
            _ => panic!("expected a create error"),
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(before.lines().filter(|l| l.contains(",ACC,")).count(), 10);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
