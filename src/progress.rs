//! Progress feed delivery.
//!
//! The engine hands every [`FileRecord`] to a [`ProgressSink`] as soon as the
//! file is done. Sinks must return promptly; a failing sink is logged by the
//! engine and the run carries on.

use crate::record::{FileRecord, RecordStatus, RunResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    /// The receiving end of a channel sink is gone.
    #[error("progress receiver disconnected")]
    Disconnected,
    #[error("progress sink failed: {0}")]
    Failed(String),
    #[error("Failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives file records in processing order.
pub trait ProgressSink {
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError>;
}

impl<F> ProgressSink for F
where
    F: FnMut(FileRecord) -> Result<(), SinkError>,
{
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError> {
        self(record)
    }
}

/// Forwards records over an unbounded channel, for runs on another thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<FileRecord>,
}

impl ChannelSink {
    pub fn new(tx: Sender<FileRecord>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError> {
        self.tx.send(record).map_err(|_| SinkError::Disconnected)
    }
}

/// Appends records to a shared list.
///
/// Clones share the list, so one clone can be given to a run while another
/// is read from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    records: Arc<Mutex<Vec<FileRecord>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far.
    pub fn records(&self) -> Vec<FileRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for CollectingSink {
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Delivers each record to two sinks in turn.
///
/// A failure of the first sink does not keep the record from the second.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A, B> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for Tee<A, B> {
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError> {
        let first = self.first.deliver(record.clone());
        let second = self.second.deliver(record);
        first.and(second)
    }
}

/// Count of records per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_records(records: &[FileRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            if record.classification.is_some() {
                if record.is_matched() {
                    summary.matched += 1;
                } else {
                    summary.unmatched += 1;
                }
            }
            *summary
                .by_status
                .entry(status_label(record.status).to_string())
                .or_insert(0) += 1;
        }
        summary
    }

    pub fn count(&self, status: RecordStatus) -> usize {
        self.by_status
            .get(status_label(status))
            .copied()
            .unwrap_or(0)
    }
}

pub fn status_label(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Skipped => "skipped",
        RecordStatus::Planned => "planned",
        RecordStatus::Relocated => "relocated",
        RecordStatus::Failed => "failed",
    }
}

/// Everything a finished run reported, as written by `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// RFC 3339 time the report was generated.
    pub generated_at: DateTime<Utc>,
    pub result: RunResult,
    pub summary: Summary,
    pub records: Vec<FileRecord>,
}

impl RunReport {
    pub fn new(result: RunResult, records: Vec<FileRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            result,
            summary: Summary::from_records(&records),
            records,
        }
    }

    /// Saves the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SinkError::ReportWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            ),
        })?;

        fs::write(path, json).map_err(|source| SinkError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Classification;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn record(index: usize, status: RecordStatus, matched: Option<bool>) -> FileRecord {
        let mut record = FileRecord::new(format!("file{index}.mp4"), Path::new("/in"));
        record.index = index;
        record.status = status;
        record.classification = matched.map(|matched| Classification {
            matched,
            ..Default::default()
        });
        record
    }

    #[test]
    fn test_collecting_sink_clones_share_records() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();

        writer.deliver(record(0, RecordStatus::Planned, Some(true))).unwrap();
        writer.deliver(record(1, RecordStatus::Skipped, None)).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[1].index, 1);
    }

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);

        sink.deliver(record(0, RecordStatus::Planned, Some(false))).unwrap();
        assert_eq!(rx.recv().unwrap().index, 0);

        drop(rx);
        assert!(matches!(
            sink.deliver(record(1, RecordStatus::Planned, None)),
            Err(SinkError::Disconnected)
        ));
    }

    #[test]
    fn test_tee_delivers_to_second_even_if_first_fails() {
        let collected = CollectingSink::new();
        let failing = |_record: FileRecord| -> Result<(), SinkError> {
            Err(SinkError::Failed("boom".to_string()))
        };
        let mut tee = Tee::new(failing, collected.clone());

        assert!(tee.deliver(record(0, RecordStatus::Planned, None)).is_err());
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(0, RecordStatus::Relocated, Some(true)),
            record(1, RecordStatus::Relocated, Some(false)),
            record(2, RecordStatus::Skipped, None),
            record(3, RecordStatus::Failed, Some(true)),
        ];
        let summary = Summary::from_records(&records);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.count(RecordStatus::Relocated), 2);
        assert_eq!(summary.count(RecordStatus::Planned), 0);
    }

    #[test]
    fn test_report_is_written_as_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("report.json");

        let report = RunReport::new(
            RunResult::Completed,
            vec![record(0, RecordStatus::Planned, Some(true))],
        );
        report.save(&path).expect("Failed to save report");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["result"], "completed");
        assert_eq!(json["summary"]["total"], 1);
        assert_eq!(json["records"][0]["status"], "planned");
    }
}
