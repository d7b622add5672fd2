//! Stop requests across processes.
//!
//! A `tvsort run` process cannot be reached through its in-memory token, so
//! the `stop` command leaves a flag file in the state directory, one per
//! mode. The running process polls for its flag and cancels its token when
//! the flag shows up.

use crate::cancel::CancellationToken;
use crate::record::Mode;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// How often a watcher looks for its flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to update stop flag {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The stop flag file of one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFlag {
    path: PathBuf,
}

impl StopFlag {
    pub fn new(state_dir: &Path, mode: Mode) -> Self {
        Self {
            path: state_dir.join(format!("tvsort-{mode}.stop")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raises the flag.
    pub fn set(&self) -> Result<(), ControlError> {
        let io_err = |source| ControlError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, b"stop\n").map_err(io_err)
    }

    /// Lowers the flag. Lowering a flag that is not raised is fine.
    pub fn clear(&self) -> Result<(), ControlError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ControlError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Starts a thread that cancels `token` once the flag is raised.
    ///
    /// Clears any stale flag first. The thread exits after cancelling, or
    /// once `done` is cancelled.
    pub fn watch(
        &self,
        token: CancellationToken,
        done: CancellationToken,
    ) -> Result<JoinHandle<()>, ControlError> {
        self.clear()?;
        let flag = self.clone();

        thread::Builder::new()
            .name("tvsort-stop-watch".to_string())
            .spawn(move || {
                while !done.is_cancelled() {
                    if flag.is_set() {
                        info!(flag = %flag.path.display(), "stop flag raised");
                        token.cancel();
                        if let Err(e) = flag.clear() {
                            debug!(error = %e, "could not clear stop flag");
                        }
                        return;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
            .map_err(|source| ControlError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
