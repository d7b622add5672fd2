//! Command-line interface module for tvsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing with clap
//! - Loading settings and building the engine
//! - Running a batch in the background while watching for stop requests
//! - Stop requests and config bootstrap

use crate::cancel::CancellationToken;
use crate::config::{LOCAL_CONFIG_NAME, RunConfig, Settings};
use crate::control::StopFlag;
use crate::engine::BatchEngine;
use crate::output::{ConsoleSink, OutputFormatter};
use crate::progress::{CollectingSink, RunReport, Summary, Tee};
use crate::record::{Mode, RunResult};
use crate::worker::RunHandle;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Sort downloaded TV episodes into per-program folders.
#[derive(Debug, Parser)]
#[command(name = "tvsort", version, about)]
pub struct Cli {
    /// Show debug logs on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Process every file under the source directory.
    Run {
        /// Plan destinations without touching the filesystem.
        #[arg(long)]
        dry_run: bool,
        /// Settings file to use instead of the default lookup.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write all records of the run to this JSON file.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Ask a running `tvsort run` to stop after its current file.
    Stop {
        /// Stop the dry run instead of the live one.
        #[arg(long, conflicts_with = "all")]
        dry_run: bool,
        /// Stop both modes.
        #[arg(long)]
        all: bool,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a default settings file.
    InitConfig {
        /// Where to write it. Defaults to `./tvsort.toml`.
        path: Option<PathBuf>,
    },
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Run { result: RunResult, summary: Summary },
    StopRequested(Vec<Mode>),
    ConfigInitialized { path: PathBuf, created: bool },
}

impl Outcome {
    /// Exit code: 0, except 2 for a run that was stopped.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Run {
                result: RunResult::StoppedByUser,
                ..
            } => ExitCode::from(2),
            _ => ExitCode::SUCCESS,
        }
    }
}

/// Runs the CLI application with parsed arguments.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use tvsort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["tvsort", "run", "--dry-run"]);
/// run_cli(&cli).expect("run failed");
/// ```
///
/// # Errors
///
/// Returns an error if settings cannot be loaded, the source root cannot be
/// read, or a stop flag or report cannot be written. Per-file failures are
/// reported in the records, never here.
pub fn run_cli(cli: &Cli) -> Result<Outcome> {
    match &cli.command {
        Command::Run {
            dry_run,
            config,
            report,
        } => {
            let mode = if *dry_run { Mode::Dry } else { Mode::Live };
            run(mode, config.as_deref(), report.as_deref())
        }
        Command::Stop {
            dry_run,
            all,
            config,
        } => {
            let modes = match (*all, *dry_run) {
                (true, _) => vec![Mode::Live, Mode::Dry],
                (false, true) => vec![Mode::Dry],
                (false, false) => vec![Mode::Live],
            };
            stop(&modes, config.as_deref())
        }
        Command::InitConfig { path } => {
            let path = path
                .clone()
                .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_NAME));
            init_config(&path)
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<(Settings, PathBuf)> {
    let located = Settings::locate(config);
    let settings = Settings::load(config).context("failed to load settings")?;
    let state_dir = settings.state_dir(located.as_deref());
    Ok((settings, state_dir))
}

fn run(mode: Mode, config: Option<&Path>, report: Option<&Path>) -> Result<Outcome> {
    let (settings, state_dir) = load_settings(config)?;
    let run_config =
        RunConfig::from_settings(&settings, mode).context("settings are incomplete")?;
    let engine = BatchEngine::from_settings(&settings).context("invalid settings")?;

    if mode.is_dry() {
        OutputFormatter::dry_run_notice("No files will be moved");
    }
    OutputFormatter::header(&format!("Sorting {}", run_config.source.display()));

    // The watcher is up before the run starts, so no stop request falls in between
    let token = CancellationToken::new();
    let done = CancellationToken::new();
    let watcher = StopFlag::new(&state_dir, mode).watch(token.clone(), done.clone())?;

    let console = ConsoleSink::new();
    let collected = CollectingSink::new();
    let handle = RunHandle::spawn_with_token(
        engine,
        run_config,
        token,
        Tee::new(console.clone(), collected.clone()),
    )?;

    let joined = handle.join();
    done.cancel();
    if watcher.join().is_err() {
        OutputFormatter::warning("stop watcher ended abnormally");
    }
    console.finish();
    let result = joined?;

    let run_report = RunReport::new(result, collected.records());
    if let Some(path) = report {
        run_report
            .save(path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        OutputFormatter::success(&format!("Report written to {}", path.display()));
    }

    if result == RunResult::StoppedByUser {
        OutputFormatter::warning("Run stopped before all files were processed");
    }
    OutputFormatter::summary_table(&run_report.summary, result);

    Ok(Outcome::Run {
        result,
        summary: run_report.summary,
    })
}

fn stop(modes: &[Mode], config: Option<&Path>) -> Result<Outcome> {
    let (_, state_dir) = load_settings(config)?;
    for &mode in modes {
        let flag = StopFlag::new(&state_dir, mode);
        flag.set()?;
        OutputFormatter::info(&format!(
            "Stop requested for the {} run ({})",
            mode,
            flag.path().display()
        ));
    }
    Ok(Outcome::StopRequested(modes.to_vec()))
}

fn init_config(path: &Path) -> Result<Outcome> {
    let created = Settings::init_file(path)?;
    if created {
        OutputFormatter::success(&format!("Created {}", path.display()));
    } else {
        OutputFormatter::warning(&format!("{} already exists, left unchanged", path.display()));
    }
    Ok(Outcome::ConfigInitialized {
        path: path.to_path_buf(),
        created,
    })
}
