//! Cooperative stop signal shared between a run and whoever started it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable stop flag for one run.
///
/// The run clears it when it starts and reads it before every file. Any clone
/// may set it; the run then ends at the next file boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resets the flag. Called by the engine at run start.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
