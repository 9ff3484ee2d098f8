//! # Inbound Ports (Driving Ports)
//!
//! The read-only query surface and the `block/block` publish event exposed to
//! the node's API layer. Queries that hit a missing block return `Ok(None)`;
//! only collaborator failures are errors.

use crate::domain::entities::{Block, BlockArg, ChainTip, Hash};
use crate::domain::errors::BlockServiceError;
use crate::domain::value_objects::{BlockOverview, NodeInfo};
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Name of the accepted-block broadcast.
pub const BLOCK_EVENT: &str = "block/block";

/// API methods exposed to the RPC layer, with their argument count.
pub const API_METHODS: &[(&str, usize)] = &[
    ("getInfo", 0),
    ("getBlock", 1),
    ("getRawBlock", 1),
    ("getBlockOverview", 1),
    ("getBestBlockHash", 0),
    ("syncPercentage", 0),
    ("isSynced", 0),
];

/// Read-only queries over the accepted chain.
#[async_trait]
pub trait BlockQueryApi: Send + Sync {
    /// Node summary: height, peers, network, difficulty.
    fn get_info(&self) -> NodeInfo;

    /// Block by height or hash.
    async fn get_block(&self, arg: BlockArg) -> Result<Option<Block>, BlockServiceError>;

    /// Hex of the stored block record.
    async fn get_raw_block(&self, arg: BlockArg) -> Result<Option<String>, BlockServiceError>;

    /// Header fields, transaction ids and confirmations of a block.
    async fn get_block_overview(&self, hash: &Hash)
        -> Result<Option<BlockOverview>, BlockServiceError>;

    /// Hash at the tip of the header chain.
    fn get_best_block_hash(&self) -> Result<Hash, BlockServiceError>;

    /// Download progress as a two-decimal percentage string.
    fn sync_percentage(&self) -> Result<String, BlockServiceError>;

    /// True once the sync driver has reached `Synced`.
    fn is_synced(&self) -> bool;

    /// Current chain tip snapshot.
    fn get_tip(&self) -> ChainTip;
}

/// Payload delivered to `block/block` subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotification {
    /// The accepted block, annotated with its height.
    pub block: Block,
    /// Tip after acceptance.
    pub tip: ChainTip,
}

/// Opaque handle identifying one remote listener.
///
/// Handles compare by id; clones refer to the same subscriber.
#[derive(Debug, Clone)]
pub struct BlockSubscriber {
    id: Uuid,
    remote_address: String,
    sender: mpsc::UnboundedSender<BlockNotification>,
}

impl BlockSubscriber {
    /// Create a handle and the receiving end of its channel.
    pub fn new(
        remote_address: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<BlockNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Self {
            id: Uuid::new_v4(),
            remote_address: remote_address.into(),
            sender,
        };
        (subscriber, receiver)
    }

    /// Unique id of this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address, for logs.
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Deliver a notification. Returns false once the receiver is gone.
    pub(crate) fn notify(&self, notification: BlockNotification) -> bool {
        self.sender.send(notification).is_ok()
    }
}

impl PartialEq for BlockSubscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BlockSubscriber {}

/// Subscribe/unsubscribe for published events.
pub trait BlockEventPublisher {
    /// Events this service publishes.
    fn get_publish_events(&self) -> Vec<&'static str> {
        vec![BLOCK_EVENT]
    }

    /// Register `subscriber` for `event`.
    fn subscribe(&self, event: &str, subscriber: BlockSubscriber);

    /// Remove `subscriber` from `event`. Unknown handles are ignored.
    fn unsubscribe(&self, event: &str, subscriber: &BlockSubscriber);
}
