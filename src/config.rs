//! Settings document and file filtering rules.
//!
//! Settings are stored in TOML. A run reads them once at start; the engine
//! only sees the three root paths, while the `[preprocess]` and `[matcher]`
//! sections are compiled into the collaborators that own them.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! source = "/data/incoming"
//! target = "/data/tv"
//! error = "/data/tv_error"
//!
//! [preprocess]
//! media_kinds = ["video", "subtitle"]
//! strip_patterns = ['\[[^\]]*\]']
//!
//! [preprocess.filters]
//! enable_hidden_files = false
//!
//! [preprocess.filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["nfo"]
//! regex = []
//!
//! [preprocess.filters.include]
//! patterns = []
//!
//! [matcher.aliases]
//! "Running Man" = "런닝맨"
//! ```

use crate::media_kind::MediaKind;
use crate::record::Mode;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_NAME: &str = "tvsort.toml";

/// Document written by [`Settings::init_file`].
pub const DEFAULT_CONFIG: &str = r#"# tvsort settings

[paths]
# Directory scanned for new recordings.
source = ""
# Matched files go to <target>/<program name>/.
target = ""
# Unmatched files go here under their original name.
error = ""
# Where stop flags are kept. Defaults to the directory of this file.
# state_dir = ""

[preprocess]
# Only these kinds are classified; everything else is skipped.
media_kinds = ["video", "subtitle"]
# Regexes removed from the file name before matching.
strip_patterns = []

[preprocess.filters]
enable_hidden_files = false

[preprocess.filters.exclude]
filenames = ["Thumbs.db", ".DS_Store"]
patterns = ["*.part", "*.!qB"]
extensions = ["tmp"]
regex = []

[preprocess.filters.include]
patterns = []

[matcher]
# Override the release-name regex. Named groups: name, no, date, quality, release, ext.
# pattern = ''

[matcher.aliases]
# "Name As Released" = "Name To File Under"
"#;

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// A required path setting is empty.
    #[error("Setting paths.{0} is not configured")]
    MissingPath(&'static str),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading or writing configuration.
    #[error("IO error on configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The whole settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub preprocess: PreprocessSettings,
    #[serde(default)]
    pub matcher: MatcherSettings,
}

/// Root directories for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub target: PathBuf,
    #[serde(default)]
    pub error: PathBuf,
    /// Directory holding the stop flag files.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// Options for the file name preprocessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// Media kinds that are classified; other files are skipped.
    #[serde(default = "default_media_kinds")]
    pub media_kinds: Vec<MediaKind>,
    /// Regex patterns removed from the file name before matching.
    #[serde(default)]
    pub strip_patterns: Vec<String>,
    #[serde(default)]
    pub filters: FilterRules,
}

fn default_media_kinds() -> Vec<MediaKind> {
    vec![MediaKind::Video, MediaKind::Subtitle]
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            media_kinds: default_media_kinds(),
            strip_patterns: Vec::new(),
            filters: FilterRules::default(),
        }
    }
}

/// Options for the release-name matcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherSettings {
    /// Replacement for the built-in release-name regex.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Program names as released, mapped to the name to file under.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `tvsort.toml` in the current directory
    /// 3. Look for `~/.config/tvsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is found or explicitly
    /// provided but cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(config_path) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Returns the file [`Settings::load`] would read, if any.
    pub fn locate(config_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = config_path {
            return Some(path.to_path_buf());
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("tvsort")
                .join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse a settings document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Writes [`DEFAULT_CONFIG`] to `path` unless a file is already there.
    ///
    /// Returns `true` when the file was created.
    pub fn init_file(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }

        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(io_err)?;
        Ok(true)
    }

    /// Checks that all three root paths are set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("source", &self.paths.source),
            ("target", &self.paths.target),
            ("error", &self.paths.error),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingPath(name));
            }
        }
        Ok(())
    }

    /// Directory for stop flags: `paths.state_dir`, else the directory of
    /// the settings file, else the current directory.
    pub fn state_dir(&self, config_path: Option<&Path>) -> PathBuf {
        if let Some(dir) = &self.paths.state_dir {
            return dir.clone();
        }
        config_path
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Immutable inputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    pub error: PathBuf,
    pub mode: Mode,
}

impl RunConfig {
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        error: impl Into<PathBuf>,
        mode: Mode,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            error: error.into(),
            mode,
        }
    }

    /// Builds the run inputs from validated settings.
    pub fn from_settings(settings: &Settings, mode: Mode) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::new(
            &settings.paths.source,
            &settings.paths.target,
            &settings.paths.error,
            mode,
        ))
    }
}

/// Filter rules deciding which files are looked at at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    false
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part", "sample/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "nfo", "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude, matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl FilterRules {
    /// Compile the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

/// Pre-compiled filter rules.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| compile_regex(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should be looked at.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, file_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches_any(&self, patterns: &[Pattern], file_path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(file_path))
    }
}
