//! Per-document cancellation and soft time budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Cancels one document's processing without touching any other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock budget and cancellation flag checked inside per-line loops.
#[derive(Debug, Clone)]
pub struct Budget {
    started: Instant,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl Budget {
    pub fn new(limit: Option<Duration>, cancel: CancelToken) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: limit.and_then(|l| started.checked_add(l)),
            cancel,
        }
    }

    /// A budget that never expires.
    pub fn unlimited() -> Self {
        Self::new(None, CancelToken::new())
    }

    /// Whether the soft deadline has passed.
    pub fn expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Fail with [`Error::Cancelled`] once the token has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
