//! # Sync Driver
//!
//! Pulls missing blocks from peers one range request at a time until the
//! tip reaches the header tip, then switches to push delivery.
//!
//! ```text
//! onHeaders ──► drain queue ──► CheckTip ──► start_sync
//!                                               │
//!          ┌────────────────────────────────────┘
//!          ▼
//!   tip < last header? ──yes──► get_next_hash ──► get_block ──► queue.process ──┐
//!          │ no                                                                  │
//!          ▼                        ◄──────────────────────────────────────────┘
//!      on_synced ──► Synced + push subscription
//!
//! A fetched block that does not advance the tip triggers a `CheckTip`; the
//! loop goes on from wherever that leaves the tip, and only a tip that moved
//! neither way is a stall.
//! ```
//!
//! Fetched blocks go through the ingestion queue like pushed ones, so the
//! tip has a single writer.

use crate::config::BlockServiceConfig;
use crate::domain::entities::{short_hex, ChainTip};
use crate::domain::errors::BlockServiceError;
use crate::domain::tip::ChainTipStore;
use crate::domain::value_objects::SyncState;
use crate::ports::outbound::{BlockRequest, HeaderIndex, PeerNetwork};
use crate::service::node::NodeHandle;
use crate::service::queue::IngestionQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Catch-up loop and push-subscription control.
pub struct SyncDriver {
    headers: Arc<dyn HeaderIndex>,
    peers: Arc<dyn PeerNetwork>,
    tip: Arc<ChainTipStore>,
    queue: IngestionQueue,
    node: Arc<NodeHandle>,
    config: BlockServiceConfig,
    state: RwLock<SyncState>,
    syncing: AtomicBool,
    push_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncDriver {
    pub(crate) fn new(
        headers: Arc<dyn HeaderIndex>,
        peers: Arc<dyn PeerNetwork>,
        tip: Arc<ChainTipStore>,
        queue: IngestionQueue,
        node: Arc<NodeHandle>,
        config: BlockServiceConfig,
    ) -> Self {
        Self {
            headers,
            peers,
            tip,
            queue,
            node,
            config,
            state: RwLock::new(SyncState::CatchingUp),
            syncing: AtomicBool::new(false),
            push_task: Mutex::new(None),
        }
    }

    /// Current sync state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// True once the driver reached `Synced`.
    pub fn is_synced(&self) -> bool {
        self.state() == SyncState::Synced
    }

    /// True while a push subscription is active.
    pub fn is_subscribed(&self) -> bool {
        self.push_task.lock().is_some()
    }

    /// Header index finished a round: settle the tip, then catch up.
    ///
    /// Waiting for the queue to drain only covers blocks queued before the
    /// call. The tip check itself runs through the queue, behind anything
    /// that slipped in meanwhile.
    pub async fn on_headers(&self) -> Result<(), BlockServiceError> {
        self.queue
            .wait_until_drained(self.config.drain_poll_interval())
            .await;
        self.queue.check_tip().await?;
        self.start_sync().await
    }

    /// Run the catch-up loop. No-op while another one is active.
    pub async fn start_sync(&self) -> Result<(), BlockServiceError> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            debug!("[qc-02] sync already running");
            return Ok(());
        }

        let result = self.catch_up().await;
        self.syncing.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            self.node.handle_error(e);
        }
        result
    }

    async fn catch_up(&self) -> Result<(), BlockServiceError> {
        let last = self.headers.get_last_header()?;
        let needed = last.height.saturating_sub(self.tip.height());
        if needed > 0 {
            *self.state.write() = SyncState::CatchingUp;
        }
        info!(
            "[qc-02] Gathering: {} block(s) from the peer-to-peer network.",
            needed
        );

        loop {
            if self.node.is_stopping() {
                return Ok(());
            }

            let tip = self.tip.get();
            if tip.height >= self.headers.get_last_header()?.height {
                break;
            }

            if tip.height % self.config.progress_log_interval.max(1) == 0 {
                self.log_progress();
            }

            self.sync_next(tip).await?;

            if self.node.is_stopping() {
                return Ok(());
            }
            if self.tip.height() > tip.height {
                continue;
            }

            // The header chain may have switched branch under the fetched block.
            self.queue.check_tip().await?;
            if self.node.is_stopping() {
                return Ok(());
            }
            if self.tip.get() == tip {
                return Err(BlockServiceError::SyncStalled { height: tip.height });
            }
        }

        self.on_synced();
        Ok(())
    }

    /// Fetch and ingest the block after `tip`.
    async fn sync_next(&self, tip: ChainTip) -> Result<(), BlockServiceError> {
        let (target_hash, end_hash) = self.headers.get_next_hash(&tip).await?;

        // Re-requested inventory must be deliverable again.
        self.peers.clear_inventory_cache();

        let block = self
            .peers
            .get_block(BlockRequest {
                start_hash: tip.hash,
                end_hash,
                target_hash,
            })
            .await?;

        let outcome = self.queue.process(block).await?;
        debug!(?outcome, "[qc-02] synced block {}", short_hex(&target_hash));
        Ok(())
    }

    fn on_synced(&self) {
        self.log_progress();
        *self.state.write() = SyncState::Synced;
        self.start_block_subscription();

        let tip = self.tip.get();
        info!(
            "[qc-02] The best block hash is: {} at height: {}",
            hex::encode(tip.hash),
            tip.height
        );
    }

    /// Forward pushed blocks into the ingestion queue. Idempotent.
    fn start_block_subscription(&self) {
        let mut task = self.push_task.lock();
        if task.is_some() {
            return;
        }

        info!("[qc-02] starting p2p block subscription.");
        let mut receiver = self.peers.subscribe_blocks();
        let mut shutdown = self.node.shutdown_signal();
        let queue = self.queue.clone();

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = receiver.recv() => match result {
                        Ok(block) => queue.enqueue(block),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("[qc-02] Block subscription lagged by {} messages", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("[qc-02] Block channel closed, exiting");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// Drop the push subscription; re-established on the next `Synced`.
    pub fn remove_all_subscriptions(&self) {
        if let Some(task) = self.push_task.lock().take() {
            task.abort();
        }
    }

    /// Best-height announcement from the peer network.
    pub fn on_best_height(&self, height: u64) {
        info!("[qc-02] Best Height is: {}", height);
        self.remove_all_subscriptions();
    }

    /// Log download progress while still catching up.
    pub fn log_progress(&self) {
        if self.is_synced() {
            return;
        }

        let tip = self.tip.height();
        let best = self.headers.get_best_height().max(tip);
        info!(
            "[qc-02] download progress: {}/{}  ({}%)",
            tip,
            best,
            format_percentage(tip, best)
        );
    }

    /// Tip height over header tip height, as a two-decimal percentage.
    pub fn sync_percentage(&self) -> Result<String, BlockServiceError> {
        let last = self.headers.get_last_header()?;
        Ok(format_percentage(self.tip.height(), last.height))
    }
}

fn format_percentage(height: u64, best: u64) -> String {
    if best == 0 {
        return format!("{:.2}", 0.0);
    }
    format!("{:.2}", height as f64 / best as f64 * 100.0)
}
