//! Per-file result records and run-level outcome types.
//!
//! A [`FileRecord`] is produced once for every file the engine visits and is
//! handed to a [`ProgressSink`](crate::progress::ProgressSink) immediately
//! afterwards. The engine keeps no copy.

use crate::matcher::Classification;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether a run moves files or only computes where they would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Move files and remove emptied directories.
    Live,
    /// Compute every decision but write nothing to disk.
    Dry,
}

impl Mode {
    /// Returns true for [`Mode::Dry`].
    pub fn is_dry(self) -> bool {
        matches!(self, Mode::Dry)
    }

    /// Short lowercase tag used in logs and flag file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Dry => "dry",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunResult {
    /// The walk and both cleanup passes finished.
    Completed,
    /// A stop request was observed at a file boundary.
    StoppedByUser,
}

impl RunResult {
    pub fn as_str(self) -> &'static str {
        match self {
            RunResult::Completed => "completed",
            RunResult::StoppedByUser => "stopped-by-user",
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a file, as far as the feed is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The preprocessor declined the file; it was neither classified nor moved.
    Skipped,
    /// A destination was decided but nothing was moved (dry run).
    Planned,
    /// The file was moved to its destination.
    Relocated,
    /// A step failed; the notes say which. The file is still at its origin.
    Failed,
}

/// The result record for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Position in the progress feed, starting at 0.
    pub index: usize,
    /// File name as found in the source tree.
    pub filename: String,
    /// Directory the file was found in.
    pub folder: PathBuf,
    /// Free-form notes appended by each pipeline step, in order.
    pub log: Vec<String>,
    /// Cleaned file name; `None` means the file was skipped.
    pub filename_pre: Option<String>,
    /// Matcher output; `None` until classification has run.
    pub classification: Option<Classification>,
    /// Folder the file goes to.
    pub result_folder: Option<PathBuf>,
    /// File name inside `result_folder`.
    pub result_filename: Option<String>,
    /// Final path after collision resolution, live runs only.
    pub moved_to: Option<PathBuf>,
    pub status: RecordStatus,
}

impl FileRecord {
    /// Starts a record for `filename` found in `folder`.
    ///
    /// The index is assigned by the engine when the record is emitted.
    pub fn new(filename: impl Into<String>, folder: &Path) -> Self {
        Self {
            index: 0,
            filename: filename.into(),
            folder: folder.to_path_buf(),
            log: Vec::new(),
            filename_pre: None,
            classification: None,
            result_folder: None,
            result_filename: None,
            moved_to: None,
            status: RecordStatus::Skipped,
        }
    }

    /// Appends a note to the record log.
    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Full path of the file at its origin.
    pub fn source_path(&self) -> PathBuf {
        self.folder.join(&self.filename)
    }

    /// Planned destination path, once a destination has been decided.
    pub fn destination_path(&self) -> Option<PathBuf> {
        match (&self.result_folder, &self.result_filename) {
            (Some(folder), Some(name)) => Some(folder.join(name)),
            _ => None,
        }
    }

    /// True when the matcher recognised the file.
    pub fn is_matched(&self) -> bool {
        self.classification.as_ref().is_some_and(|c| c.matched)
    }
}
