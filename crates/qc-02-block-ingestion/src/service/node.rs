//! # Node Handle
//!
//! Process-wide stopping flag plus the single node-level error handler.
//! A failed block event is never retried: it is logged here and, unless the
//! node is already stopping, triggers an orderly stop.

use crate::domain::errors::BlockServiceError;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{error, info};

/// Shared stop control for the node.
#[derive(Debug)]
pub struct NodeHandle {
    stopping: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeHandle {
    /// Create a running node handle.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            stopping: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// True once a stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Request an orderly stop. Idempotent.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("[qc-02] Node stop requested");
        self.shutdown_tx.send_replace(true);
    }

    /// Receiver that flips to `true` when the node stops.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Log `err` and stop the node, unless already stopping.
    pub fn handle_error(&self, err: &BlockServiceError) {
        if self.is_stopping() {
            return;
        }
        error!("[qc-02] Block Service: {}", err);
        self.stop();
    }
}

impl Default for NodeHandle {
    fn default() -> Self {
        Self::new()
    }
}
