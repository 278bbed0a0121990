//! Interrupt handling.
//!
//! SIGINT sets a flag instead of terminating the process. A Ctrl-C at the
//! terminal reaches the whole foreground process group, so the child running
//! at that moment exits as well, the current step fails normally, and the
//! working directory guard is dropped on the way out.
//!
//! A SIGINT sent to this process alone (`kill -INT <pid>`) is not forwarded:
//! the running step completes (or hits its timeout) and the run aborts at the
//! next step boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::SyncError;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl-C to this flag. Can only be installed once per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = Arc::clone(&self.flag);
        ctrlc::set_handler(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                warn!("interrupt received, aborting after current step");
            }
        })
        .context("install interrupt handler")
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }
}
