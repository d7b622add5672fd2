//! The batch engine: one full pass over the source tree.
//!
//! For every directory, top-down and in name order, each file goes through
//! preprocess -> classify -> decide destination -> relocate -> report. When a
//! directory's files are done and it is left empty it is removed. After the
//! walk a second, children-first sweep removes directories that only became
//! empty because their own subdirectories went away.
//!
//! Per-file and per-directory failures are logged and never end the run.
//! The only fatal error is a source root that cannot be read.

use crate::cancel::CancellationToken;
use crate::config::{ConfigError, RunConfig, Settings};
use crate::matcher::{Classification, Matcher, ReleaseNameMatcher};
use crate::preprocess::{Preprocessor, RulePreprocessor};
use crate::progress::ProgressSink;
use crate::record::{FileRecord, RecordStatus, RunResult};
use crate::relocate::{FsRelocator, Relocator};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors that end a run before it can start walking.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Source directory {} cannot be read: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Source path {} is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),
}

/// Direct children of one directory, sorted by name.
struct Listing {
    files: Vec<String>,
    dirs: Vec<PathBuf>,
}

/// Sequential classify-and-move engine.
///
/// Holds the three collaborators; the run inputs and the progress sink are
/// supplied per run.
pub struct BatchEngine {
    preprocessor: Box<dyn Preprocessor>,
    matcher: Box<dyn Matcher>,
    relocator: Box<dyn Relocator>,
}

impl BatchEngine {
    pub fn new(
        preprocessor: impl Preprocessor + 'static,
        matcher: impl Matcher + 'static,
        relocator: impl Relocator + 'static,
    ) -> Self {
        Self {
            preprocessor: Box::new(preprocessor),
            matcher: Box::new(matcher),
            relocator: Box::new(relocator),
        }
    }

    /// Builds the engine with the stock collaborators configured from
    /// `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if any filter, strip or matcher pattern is invalid.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            RulePreprocessor::from_settings(&settings.preprocess)?,
            ReleaseNameMatcher::from_settings(&settings.matcher)?,
            FsRelocator,
        ))
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Box::new(preprocessor);
        self
    }

    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_relocator(mut self, relocator: impl Relocator + 'static) -> Self {
        self.relocator = Box::new(relocator);
        self
    }

    /// Runs one full pass.
    ///
    /// `token` is cleared first and then checked before every file; once it
    /// is set the run returns [`RunResult::StoppedByUser`] without touching
    /// further files or cleaning up. Every visited file yields exactly one
    /// record on `sink`, numbered from 0.
    ///
    /// # Errors
    ///
    /// Returns an error only if the source root is missing, not a directory
    /// or unreadable.
    pub fn run(
        &self,
        config: &RunConfig,
        token: &CancellationToken,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunResult, EngineError> {
        token.reset();
        self.run_armed(config, token, sink)
    }

    /// Like [`BatchEngine::run`], but takes `token` as it is.
    ///
    /// For callers that clear the token themselves before handing it out, so
    /// that a stop raised in between is not lost. A token that is already
    /// set ends the run before its first file.
    pub fn run_armed(
        &self,
        config: &RunConfig,
        token: &CancellationToken,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunResult, EngineError> {
        let root = &config.source;
        if !root.is_dir() {
            if root.exists() {
                return Err(EngineError::SourceNotDirectory(root.clone()));
            }
            return Err(EngineError::SourceUnreadable {
                path: root.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "source path does not exist"),
            });
        }

        info!(
            mode = %config.mode,
            source = %root.display(),
            target = %config.target.display(),
            error = %config.error.display(),
            "starting run"
        );

        let mut next_index = 0usize;
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let listing = match list_dir(&dir, config) {
                Ok(listing) => listing,
                Err(source) if dir == *root => {
                    return Err(EngineError::SourceUnreadable {
                        path: dir,
                        source,
                    });
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot read directory, skipping it");
                    continue;
                }
            };
            debug!(dir = %dir.display(), files = listing.files.len(), "entering directory");

            for (position, filename) in listing.files.iter().enumerate() {
                if token.is_cancelled() {
                    info!(processed = next_index, "stop requested, ending run");
                    return Ok(RunResult::StoppedByUser);
                }
                debug!(
                    "{} / {} : {}",
                    position + 1,
                    listing.files.len(),
                    filename
                );

                let mut record = FileRecord::new(filename.as_str(), &dir);
                self.process_file(config, &dir, filename, &mut record);
                record.index = next_index;
                next_index += 1;

                if let Err(e) = sink.deliver(record) {
                    warn!(file = %filename, error = %e, "progress sink rejected record");
                }
            }

            if dir != *root {
                prune_if_empty(&dir, config);
            }
            pending.extend(listing.dirs.into_iter().rev());
        }

        sweep_empty_dirs(config);
        info!(processed = next_index, "run completed");
        Ok(RunResult::Completed)
    }

    /// The per-file pipeline. Never fails; problems end up in `record`.
    fn process_file(
        &self,
        config: &RunConfig,
        dir: &Path,
        filename: &str,
        record: &mut FileRecord,
    ) {
        let cleaned = match self.preprocessor.preprocess(config, dir, filename, record) {
            Ok(Some(cleaned)) => cleaned,
            Ok(None) => {
                debug!(file = %filename, "skipped by preprocessor");
                record.status = RecordStatus::Skipped;
                return;
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "preprocessing failed");
                record.note(format!("preprocessing failed: {e}"));
                record.status = RecordStatus::Failed;
                return;
            }
        };
        record.filename_pre = Some(cleaned.clone());

        let classification = match self.matcher.classify(&cleaned, dir) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(file = %filename, error = %e, "classification failed");
                record.note(format!("classification failed, treating as unmatched: {e}"));
                Classification::unmatched()
            }
        };

        let (folder, target_name) = destination(config, filename, &classification, record);
        record.classification = Some(classification);
        record.result_folder = Some(folder.clone());
        record.result_filename = Some(target_name.clone());

        if config.mode.is_dry() {
            record.status = RecordStatus::Planned;
            return;
        }

        match self
            .relocator
            .relocate(&record.source_path(), &folder, &target_name)
        {
            Ok(moved_to) => {
                if moved_to != folder.join(&target_name) {
                    record.note(format!("name taken, stored as {}", moved_to.display()));
                }
                record.moved_to = Some(moved_to);
                record.status = RecordStatus::Relocated;
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "relocation failed");
                record.note(format!("relocation failed: {e}"));
                record.status = RecordStatus::Failed;
            }
        }
    }
}

/// Where a classified file goes.
///
/// Matched files go to `target/<name>` under the matcher's file name;
/// everything else goes to the error root under its original name.
fn destination(
    config: &RunConfig,
    original: &str,
    classification: &Classification,
    record: &mut FileRecord,
) -> (PathBuf, String) {
    if classification.matched {
        if let (Some(name), Some(filename)) = (&classification.name, &classification.filename)
            && !name.is_empty()
            && !filename.is_empty()
        {
            return (config.target.join(name), filename.clone());
        }
        record.note("matched without a program name, treating as unmatched");
    }
    (config.error.clone(), original.to_string())
}

/// Lists `dir`, leaving out the target and error roots when they sit inside
/// the source tree. Symlinks and non-UTF-8 names are left alone.
///
/// Only failing to open `dir` is an error; a bad entry is logged and skipped.
fn list_dir(dir: &Path, config: &RunConfig) -> io::Result<Listing> {
    let mut listing = Listing {
        files: Vec::new(),
        dirs: Vec::new(),
    };

    for entry in fs::read_dir(dir)? {
        add_entry(&mut listing, dir, entry, config);
    }

    listing.files.sort();
    listing.dirs.sort();
    Ok(listing)
}

fn add_entry(
    listing: &mut Listing,
    dir: &Path,
    entry: io::Result<fs::DirEntry>,
    config: &RunConfig,
) {
    let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read directory entry, skipping it");
            return;
        }
    };
    let path = entry.path();
    let file_type = match entry.file_type() {
        Ok(file_type) => file_type,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat entry, skipping it");
            return;
        }
    };

    if file_type.is_dir() {
        if is_output_root(&path, config) {
            debug!(dir = %path.display(), "not descending into output directory");
        } else {
            listing.dirs.push(path);
        }
    } else if file_type.is_file() {
        match entry.file_name().into_string() {
            Ok(name) => listing.files.push(name),
            Err(name) => {
                warn!(file = ?name, dir = %dir.display(), "file name is not valid UTF-8, leaving it");
            }
        }
    } else {
        debug!(path = %path.display(), "not a regular file or directory, leaving it");
    }
}

fn is_output_root(path: &Path, config: &RunConfig) -> bool {
    path == config.target || path == config.error
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// First-pass cleanup of a directory whose files have all been handled.
fn prune_if_empty(dir: &Path, config: &RunConfig) {
    if config.mode.is_dry() {
        return;
    }
    match is_empty_dir(dir) {
        Ok(true) => match fs::remove_dir(dir) {
            Ok(()) => debug!(dir = %dir.display(), "removed empty directory"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot remove empty directory"),
        },
        Ok(false) => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "cannot inspect directory"),
    }
}

/// Second-pass cleanup: remove every empty directory below the root,
/// children before parents, so chains of emptied ancestors collapse.
fn sweep_empty_dirs(config: &RunConfig) {
    if config.mode.is_dry() {
        return;
    }

    let walker = WalkDir::new(&config.source)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_output_root(entry.path(), config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "cleanup walk error");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        match is_empty_dir(dir) {
            Ok(true) => match fs::remove_dir(dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed empty directory"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "cannot remove empty directory"),
            },
            Ok(false) => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot inspect directory"),
        }
    }
}
