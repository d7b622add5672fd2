//! File name preprocessing.
//!
//! Runs before classification. A preprocessor either returns a cleaned file
//! name for the matcher or `None`, meaning the file is skipped and left
//! where it is.

use crate::config::{CompiledFilters, ConfigError, PreprocessSettings, RunConfig, compile_regex};
use crate::media_kind::{MediaKind, MediaMapper};
use crate::record::FileRecord;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors a preprocessor may report for a single file.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("cannot preprocess {filename}: {reason}")]
    Rejected { filename: String, reason: String },
    #[error("IO error while preprocessing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a raw file name into the name handed to the matcher.
pub trait Preprocessor: Send + Sync {
    /// Returns the cleaned name, or `None` to skip the file.
    ///
    /// Notes worth keeping go into `record`. Implementations must not touch
    /// the filesystem when `config.mode` is dry.
    fn preprocess(
        &self,
        config: &RunConfig,
        dir: &Path,
        filename: &str,
        record: &mut FileRecord,
    ) -> Result<Option<String>, PreprocessError>;
}

impl<F> Preprocessor for F
where
    F: Fn(&RunConfig, &Path, &str, &mut FileRecord) -> Result<Option<String>, PreprocessError>
        + Send
        + Sync,
{
    fn preprocess(
        &self,
        config: &RunConfig,
        dir: &Path,
        filename: &str,
        record: &mut FileRecord,
    ) -> Result<Option<String>, PreprocessError> {
        self(config, dir, filename, record)
    }
}

/// Preprocessor driven by the `[preprocess]` settings.
///
/// A file is skipped when the filter rules exclude it or when its media kind
/// is not one of `media_kinds`. Otherwise every `strip_patterns` match is
/// removed from the name and runs of whitespace are collapsed.
#[derive(Debug, Clone)]
pub struct RulePreprocessor {
    filters: CompiledFilters,
    media_kinds: Vec<MediaKind>,
    strip: Vec<Regex>,
    mapper: MediaMapper,
}

impl RulePreprocessor {
    pub fn from_settings(settings: &PreprocessSettings) -> Result<Self, ConfigError> {
        let strip = settings
            .strip_patterns
            .iter()
            .map(|pattern| compile_regex(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            filters: settings.filters.compile()?,
            media_kinds: settings.media_kinds.clone(),
            strip,
            mapper: MediaMapper::default(),
        })
    }

    fn clean(&self, filename: &str) -> String {
        let stripped = self
            .strip
            .iter()
            .fold(filename.to_string(), |name, re| {
                re.replace_all(&name, "").into_owned()
            });
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for RulePreprocessor {
    fn default() -> Self {
        Self::from_settings(&PreprocessSettings::default())
            .expect("default preprocess settings compile")
    }
}

impl Preprocessor for RulePreprocessor {
    fn preprocess(
        &self,
        config: &RunConfig,
        dir: &Path,
        filename: &str,
        record: &mut FileRecord,
    ) -> Result<Option<String>, PreprocessError> {
        let path = dir.join(filename);
        // Glob rules are written relative to the source root
        let relative = path.strip_prefix(&config.source).unwrap_or(&path);

        if !self.filters.should_include(relative) {
            record.note("excluded by filter rules");
            return Ok(None);
        }

        let kind = self
            .mapper
            .detect(&path)
            .map_err(|source| PreprocessError::Io {
                path: path.clone(),
                source,
            })?;
        if !self.media_kinds.contains(&kind) {
            record.note(format!("skipped {} file", kind.as_str()));
            return Ok(None);
        }

        let cleaned = self.clean(filename);
        if cleaned.is_empty() {
            record.note("nothing left of the file name after cleaning");
            return Ok(None);
        }
        if cleaned != filename {
            record.note(format!("cleaned name: {cleaned}"));
        }
        Ok(Some(cleaned))
    }
}
