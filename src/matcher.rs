//! Release-name matching.
//!
//! Recordings arrive with scene-style names such as
//! `런닝맨.E650.230416.720p-NEXT.mp4`: program name, episode number, air date
//! (`yymmdd`), quality and release group. A file whose name parses is
//! *matched* and filed under its program name; anything else is unmatched.

use crate::config::{ConfigError, MatcherSettings, compile_regex};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// `<name>.E<no>.<yymmdd>.<...>.<quality>p-<release>.<ext>`
const EPISODE_PATTERN: &str = r"^(?P<name>.+?)\.[Ee](?P<no>\d+)(?:-[Ee]?\d+)?\.(?P<date>\d{6})\.(?:.*?\.)?(?P<quality>\d{3,4}[pP])(?:\..*?)?(?:-(?P<release>[^.]+))?\.(?P<ext>[A-Za-z0-9]+)$";

/// Same, for specials and dailies without an episode number.
const DAILY_PATTERN: &str = r"^(?P<name>.+?)\.(?P<date>\d{6})\.(?:.*?\.)?(?P<quality>\d{3,4}[pP])(?:\..*?)?(?:-(?P<release>[^.]+))?\.(?P<ext>[A-Za-z0-9]+)$";

/// Errors a matcher may report for a single file.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("metadata lookup failed for {filename}: {reason}")]
    Lookup { filename: String, reason: String },
}

/// Result of classifying one file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub matched: bool,
    /// Program name, safe to use as a folder name.
    pub name: Option<String>,
    /// File name to store the file under.
    pub filename: Option<String>,
    pub episode: Option<u32>,
    /// Air date, `yymmdd` as written in the file name.
    pub date: Option<String>,
    pub quality: Option<String>,
    pub release: Option<String>,
}

impl Classification {
    pub fn unmatched() -> Self {
        Self::default()
    }
}

/// Decides whether a file name belongs to a known program.
pub trait Matcher: Send + Sync {
    /// Classifies `filename`, found in `dir`.
    fn classify(&self, filename: &str, dir: &Path) -> Result<Classification, MatchError>;
}

impl<F> Matcher for F
where
    F: Fn(&str, &Path) -> Result<Classification, MatchError> + Send + Sync,
{
    fn classify(&self, filename: &str, dir: &Path) -> Result<Classification, MatchError> {
        self(filename, dir)
    }
}

/// Regex-based matcher for broadcast release names.
#[derive(Debug, Clone)]
pub struct ReleaseNameMatcher {
    patterns: Vec<Regex>,
    aliases: BTreeMap<String, String>,
}

impl ReleaseNameMatcher {
    /// Builds the matcher from the `[matcher]` settings.
    ///
    /// A configured `pattern` replaces the built-in ones.
    pub fn from_settings(settings: &MatcherSettings) -> Result<Self, ConfigError> {
        let patterns = match &settings.pattern {
            Some(custom) => vec![compile_regex(custom)?],
            None => vec![compile_regex(EPISODE_PATTERN)?, compile_regex(DAILY_PATTERN)?],
        };
        Ok(Self {
            patterns,
            aliases: settings.aliases.clone(),
        })
    }

    fn parse(&self, filename: &str) -> Option<Classification> {
        let caps = self.patterns.iter().find_map(|re| re.captures(filename))?;

        let raw_name = caps.name("name")?;
        let name = normalize_name(raw_name.as_str());
        if let Some(date) = group(&caps, "date")
            && NaiveDate::parse_from_str(&date, "%y%m%d").is_err()
        {
            debug!(filename, date = %date, "air date does not parse");
            return None;
        }

        let (name, filename) = match self.aliases.get(&name) {
            Some(alias) => (
                alias.clone(),
                format!("{}{}", alias, &filename[raw_name.end()..]),
            ),
            None => (name, filename.to_string()),
        };

        // An empty folder name would file the episode into the target root
        let name = sanitize_filename::sanitize(&name);
        if name.trim().is_empty() {
            debug!(filename = %filename, "program name is empty once sanitized");
            return None;
        }

        Some(Classification {
            matched: true,
            name: Some(name),
            filename: Some(sanitize_filename::sanitize(&filename)),
            episode: group(&caps, "no").and_then(|no| no.parse().ok()),
            date: group(&caps, "date"),
            quality: group(&caps, "quality").map(|q| q.to_lowercase()),
            release: group(&caps, "release"),
        })
    }
}

impl Default for ReleaseNameMatcher {
    fn default() -> Self {
        Self {
            patterns: vec![
                Regex::new(EPISODE_PATTERN).expect("built-in pattern is valid"),
                Regex::new(DAILY_PATTERN).expect("built-in pattern is valid"),
            ],
            aliases: BTreeMap::new(),
        }
    }
}

impl Matcher for ReleaseNameMatcher {
    fn classify(&self, filename: &str, _dir: &Path) -> Result<Classification, MatchError> {
        Ok(self.parse(filename).unwrap_or_else(Classification::unmatched))
    }
}

fn group(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

/// `Show.Name_2` -> `Show Name 2`
fn normalize_name(raw: &str) -> String {
    raw.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
