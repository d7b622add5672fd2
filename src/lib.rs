//! tvsort - sort downloaded TV episodes into per-program folders
//!
//! This library walks a source directory, cleans and classifies every file
//! by its release name, and moves it to `<target>/<program>/` or, when the
//! name is not recognized, to an error folder. Runs can be planned without
//! touching the filesystem, stopped between files, and observed through a
//! per-file progress feed.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod logging;
pub mod matcher;
pub mod media_kind;
pub mod output;
pub mod preprocess;
pub mod progress;
pub mod record;
pub mod relocate;
pub mod worker;

pub use cancel::CancellationToken;
pub use config::{ConfigError, RunConfig, Settings};
pub use control::StopFlag;
pub use engine::{BatchEngine, EngineError};
pub use matcher::{Classification, Matcher, ReleaseNameMatcher};
pub use media_kind::{MediaKind, MediaMapper};
pub use preprocess::{Preprocessor, RulePreprocessor};
pub use progress::{CollectingSink, ProgressSink, RunReport, Summary};
pub use record::{FileRecord, Mode, RecordStatus, RunResult};
pub use relocate::{FsRelocator, Relocator};
pub use worker::RunHandle;

pub use cli::{Cli, run_cli};
