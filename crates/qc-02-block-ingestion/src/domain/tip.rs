//! # Chain Tip Store
//!
//! Holds the single authoritative [`ChainTip`]. Reads are cheap snapshots;
//! `set` is crate-private and only called after the storage batch carrying
//! the matching tip record has committed.

use crate::domain::entities::{short_hex, ChainTip};
use parking_lot::RwLock;
use tracing::debug;

/// In-memory owner of the current tip.
#[derive(Debug)]
pub struct ChainTipStore {
    tip: RwLock<ChainTip>,
}

impl ChainTipStore {
    /// Create a store initialised from the persisted tip.
    pub fn new(tip: ChainTip) -> Self {
        Self {
            tip: RwLock::new(tip),
        }
    }

    /// Snapshot of the current tip.
    pub fn get(&self) -> ChainTip {
        *self.tip.read()
    }

    /// Current tip height.
    pub fn height(&self) -> u64 {
        self.tip.read().height
    }

    pub(crate) fn set(&self, tip: ChainTip) {
        debug!("[qc-02] Setting tip to height: {}", tip.height);
        debug!("[qc-02] Setting tip to hash: {}", hex::encode(tip.hash));
        *self.tip.write() = tip;
    }
}
