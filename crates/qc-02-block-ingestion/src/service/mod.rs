//! # Block Service
//!
//! Wires the ingestion queue, the chain processor and the sync driver
//! around one shared [`ChainTipStore`].
//!
//! ## Architecture
//!
//! This service:
//! 1. Loads the persisted tip at startup (absence is fatal)
//! 2. Serializes every block event through a single-worker queue
//! 3. Resolves forks by unwinding to the header chain in one atomic batch
//! 4. Catches up from peers, then switches to push delivery
//! 5. Publishes accepted blocks on `block/block`

mod node;
mod processor;
mod query;
mod queue;
mod subscriptions;
mod sync;

pub use node::NodeHandle;
pub use processor::ChainProcessor;
pub use queue::IngestionQueue;
pub use subscriptions::SubscriptionRegistry;
pub use sync::SyncDriver;

use crate::config::BlockServiceConfig;
use crate::domain::encoding::BlockEncoding;
use crate::domain::entities::{Block, ChainTip};
use crate::domain::errors::BlockServiceError;
use crate::domain::tip::ChainTipStore;
use crate::domain::value_objects::{BlockOutcome, SyncState};
use crate::ports::inbound::{BlockEventPublisher, BlockSubscriber};
use crate::ports::outbound::{
    DependentService, HeaderIndex, PeerNetwork, StorageEngine, TimestampIndex,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Dependencies for BlockService
pub struct BlockServiceDependencies {
    pub storage: Arc<dyn StorageEngine>,
    pub headers: Arc<dyn HeaderIndex>,
    pub peers: Arc<dyn PeerNetwork>,
    pub timestamps: Arc<dyn TimestampIndex>,
    /// Services whose state follows the tip, in fan-out order.
    pub dependents: Vec<Arc<dyn DependentService>>,
}

/// The Block Service.
pub struct BlockService {
    pub(crate) config: BlockServiceConfig,
    pub(crate) processor: Arc<ChainProcessor>,
    pub(crate) queue: IngestionQueue,
    pub(crate) sync: Arc<SyncDriver>,
    pub(crate) headers: Arc<dyn HeaderIndex>,
    pub(crate) peers: Arc<dyn PeerNetwork>,
    pub(crate) timestamps: Arc<dyn TimestampIndex>,
    pub(crate) tip: Arc<ChainTipStore>,
    pub(crate) node: Arc<NodeHandle>,
    pub(crate) subscriptions: Arc<SubscriptionRegistry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BlockService {
    /// Load the persisted tip and spawn the ingestion worker.
    ///
    /// Fails with `TipNotInitialized` if no tip record exists for
    /// `config.service_name`.
    pub async fn start(
        deps: BlockServiceDependencies,
        config: BlockServiceConfig,
        node: Arc<NodeHandle>,
    ) -> Result<Self, BlockServiceError> {
        let prefix = deps.storage.get_prefix(&config.service_name).await?;
        let tip = deps
            .storage
            .get_service_tip(&config.service_name)
            .await?
            .ok_or_else(|| BlockServiceError::TipNotInitialized {
                service: config.service_name.clone(),
            })?;

        info!(
            "[qc-02] Block Service starting, tip height: {} hash: {}",
            tip.height,
            hex::encode(tip.hash)
        );

        let tip = Arc::new(ChainTipStore::new(tip));
        let subscriptions = Arc::new(SubscriptionRegistry::new());

        let processor = Arc::new(ChainProcessor {
            service_name: config.service_name.clone(),
            encoding: BlockEncoding::new(prefix),
            storage: deps.storage,
            headers: Arc::clone(&deps.headers),
            timestamps: Arc::clone(&deps.timestamps),
            dependents: deps.dependents,
            tip: Arc::clone(&tip),
            node: Arc::clone(&node),
            subscriptions: Arc::clone(&subscriptions),
        });

        let (queue, worker) = IngestionQueue::spawn(Arc::clone(&processor));

        let sync = Arc::new(SyncDriver::new(
            Arc::clone(&deps.headers),
            Arc::clone(&deps.peers),
            Arc::clone(&tip),
            queue.clone(),
            Arc::clone(&node),
            config.clone(),
        ));

        let listener = spawn_best_height_listener(
            deps.peers.subscribe_best_height(),
            Arc::clone(&sync),
            &node,
        );

        Ok(Self {
            config,
            processor,
            queue,
            sync,
            headers: deps.headers,
            peers: deps.peers,
            timestamps: deps.timestamps,
            tip,
            node,
            subscriptions,
            tasks: Mutex::new(vec![worker, listener]),
        })
    }

    /// Stop the node, let queued jobs short-circuit and join background tasks.
    pub async fn stop(&self) {
        self.node.stop();
        self.sync.remove_all_subscriptions();
        self.queue
            .wait_until_drained(self.config.drain_poll_interval())
            .await;

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        self.subscriptions.clear();
        info!("[qc-02] Block Service stopped");
    }

    /// Current chain tip snapshot.
    pub fn tip(&self) -> ChainTip {
        self.tip.get()
    }

    /// Queue a pushed block; its outcome is only logged.
    pub fn queue_block(&self, block: Block) {
        self.queue.enqueue(block);
    }

    /// Queue a block and wait until the worker has processed it.
    pub async fn process_block(&self, block: Block) -> Result<BlockOutcome, BlockServiceError> {
        self.queue.process(block).await
    }

    /// Header index finished a round: check the tip, then catch up.
    pub async fn on_headers(&self) -> Result<(), BlockServiceError> {
        self.sync.on_headers().await
    }

    /// Jobs queued or in flight.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Sync driver state.
    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// True while pushed blocks are being forwarded to the queue.
    pub fn is_block_subscription_active(&self) -> bool {
        self.sync.is_subscribed()
    }

    /// Number of `block/block` subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Shared node handle.
    pub fn node(&self) -> &Arc<NodeHandle> {
        &self.node
    }
}

impl BlockEventPublisher for BlockService {
    fn subscribe(&self, event: &str, subscriber: BlockSubscriber) {
        self.subscriptions.subscribe(event, subscriber);
    }

    fn unsubscribe(&self, event: &str, subscriber: &BlockSubscriber) {
        self.subscriptions.unsubscribe(event, subscriber);
    }
}

fn spawn_best_height_listener(
    mut receiver: broadcast::Receiver<u64>,
    sync: Arc<SyncDriver>,
    node: &NodeHandle,
) -> JoinHandle<()> {
    let mut shutdown = node.shutdown_signal();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = receiver.recv() => match result {
                    Ok(height) => sync.on_best_height(height),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("[qc-02] Best height listener lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("[qc-02] Best height channel closed, exiting");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
    })
}
