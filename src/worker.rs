//! Background execution of a run.
//!
//! [`RunHandle::spawn`] moves an engine onto its own thread and gives the
//! caller the stop token and a way to wait for the outcome. Records can be
//! streamed back over a channel with [`RunHandle::spawn_streaming`].

use crate::cancel::CancellationToken;
use crate::config::RunConfig;
use crate::engine::{BatchEngine, EngineError};
use crate::progress::{ChannelSink, ProgressSink};
use crate::record::{FileRecord, Mode, RunResult};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker thread panicked")]
    Panicked,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A run executing on a background thread.
pub struct RunHandle {
    mode: Mode,
    token: CancellationToken,
    join: JoinHandle<Result<RunResult, EngineError>>,
}

impl RunHandle {
    /// Starts `engine` on a new thread, reporting to `sink`.
    ///
    /// The stop token is clear when this returns, so a [`RunHandle::stop`]
    /// made right away ends the run before its first file.
    pub fn spawn<S>(engine: BatchEngine, config: RunConfig, sink: S) -> Result<Self, WorkerError>
    where
        S: ProgressSink + Send + 'static,
    {
        Self::spawn_with_token(engine, config, CancellationToken::new(), sink)
    }

    /// Starts `engine` on a new thread under a token the caller already
    /// holds. The token is taken as it is and not cleared again.
    pub fn spawn_with_token<S>(
        engine: BatchEngine,
        config: RunConfig,
        token: CancellationToken,
        mut sink: S,
    ) -> Result<Self, WorkerError>
    where
        S: ProgressSink + Send + 'static,
    {
        let mode = config.mode;
        let run_token = token.clone();

        let join = thread::Builder::new()
            .name(format!("tvsort-{mode}"))
            .spawn(move || engine.run_armed(&config, &run_token, &mut sink))
            .map_err(WorkerError::Spawn)?;

        info!(%mode, "run started in background");
        Ok(Self { mode, token, join })
    }

    /// Starts `engine` on a new thread and returns the receiving end of its
    /// progress feed. The feed ends when the run does.
    pub fn spawn_streaming(
        engine: BatchEngine,
        config: RunConfig,
    ) -> Result<(Self, Receiver<FileRecord>), WorkerError> {
        let (tx, rx) = mpsc::channel();
        let handle = Self::spawn(engine, config, ChannelSink::new(tx))?;
        Ok((handle, rx))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// A clone of the run's stop token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Asks the run to stop at the next file boundary.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to end.
    pub fn join(self) -> Result<RunResult, WorkerError> {
        let outcome = self.join.join().map_err(|_| WorkerError::Panicked)?;
        Ok(outcome?)
    }
}
