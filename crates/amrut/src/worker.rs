//! Background execution for ancillary work.
//!
//! Classification and review decisions run synchronously on one control
//! thread. Slow work that only supports the reviewer — preparing the
//! visual backdrop raster — runs on a worker thread so it never blocks
//! the diff or merge logic; the session waits for it at most once,
//! right before presenting the first feature.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crate::error::{AmrutError, Result};

/// Handle to a computation running on a worker thread.
#[derive(Debug)]
pub struct BackgroundTask<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Start `work` on a new thread.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            handle: thread::spawn(work),
        }
    }

    /// Block until the work finishes. A panicked worker surfaces as an
    /// error rather than poisoning the session.
    pub fn join(self) -> Result<T> {
        self.handle
            .join()
            .map_err(|_| AmrutError::Worker("background task panicked".to_string()))
    }
}

/// A prepared visual backdrop: where the reviewer-facing raster ended
/// up after reprojection. The engine never reads it back; it is handed
/// to the presentation layer as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backdrop {
    pub path: PathBuf,
}
