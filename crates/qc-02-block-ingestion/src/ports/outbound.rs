//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the block service requires the host node to provide.
//! Every storage read/write and network fetch is an async suspension point;
//! none of these calls mutate the chain tip.

use crate::domain::entities::{Block, ChainTip, Hash, IndexedHeader};
use crate::domain::errors::{DependentError, HeaderIndexError, NetworkError, StorageError};
use crate::domain::value_objects::StorageOperation;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Headers keyed by hash, as returned by [`HeaderIndex::get_all_headers`].
pub type HeaderMap = HashMap<Hash, IndexedHeader>;

/// Generic key-value storage engine.
///
/// `batch` is the only mutation gateway used by the block service: all
/// operations of one block event commit together or not at all.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a single key-value pair.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Apply all operations atomically.
    async fn batch(&self, operations: Vec<StorageOperation>) -> Result<(), StorageError>;

    /// Key prefix allocated to `service_name` (stable across restarts).
    async fn get_prefix(&self, service_name: &str) -> Result<Vec<u8>, StorageError>;

    /// Persisted tip of `service_name`, if one has been written.
    async fn get_service_tip(&self, service_name: &str) -> Result<Option<ChainTip>, StorageError>;
}

/// Authoritative header chain (validated upstream).
#[async_trait]
pub trait HeaderIndex: Send + Sync {
    /// Header at `height` on the best header chain.
    async fn get_header_by_height(&self, height: u64)
        -> Result<Option<IndexedHeader>, HeaderIndexError>;

    /// Header with `hash`, if it is on the header chain.
    async fn get_block_header(&self, hash: &Hash)
        -> Result<Option<IndexedHeader>, HeaderIndexError>;

    /// Tip of the header chain.
    fn get_last_header(&self) -> Result<IndexedHeader, HeaderIndexError>;

    /// All headers keyed by hash. Always contains genesis.
    async fn get_all_headers(&self) -> Result<HeaderMap, HeaderIndexError>;

    /// `(target, next)` for the block after `tip`: `target` is the hash at
    /// `tip.height + 1`, `next` the one after it (zero hash if none).
    async fn get_next_hash(&self, tip: &ChainTip) -> Result<(Hash, Hash), HeaderIndexError>;

    /// Difficulty at the header tip.
    fn get_current_difficulty(&self) -> f64;

    /// Best height known from headers and peer announcements.
    fn get_best_height(&self) -> u64;
}

/// Range filter for a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    /// Local tip the range starts after.
    pub start_hash: Hash,
    /// Hash bounding the range (zero = open ended).
    pub end_hash: Hash,
    /// Block the caller is waiting for.
    pub target_hash: Hash,
}

/// Peer-to-peer network.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Connected peer count.
    fn number_of_peers(&self) -> usize;

    /// Forget which inventory has already been delivered, so a re-requested
    /// range can be served again.
    fn clear_inventory_cache(&self);

    /// Request the range described by `request` and resolve with the target
    /// block once a peer delivers it.
    async fn get_block(&self, request: BlockRequest) -> Result<Block, NetworkError>;

    /// Push channel of blocks announced by peers.
    fn subscribe_blocks(&self) -> broadcast::Receiver<Block>;

    /// Push channel of best-height announcements.
    fn subscribe_best_height(&self) -> broadcast::Receiver<u64>;
}

/// Timestamp index.
#[async_trait]
pub trait TimestampIndex: Send + Sync {
    /// Stored timestamp of the block with `hash`.
    async fn get_timestamp(&self, hash: &Hash) -> Result<Option<u64>, StorageError>;
}

/// A subsystem holding state derived from the chain tip.
///
/// Both hooks default to declining (`Ok(None)`). Returned operations are
/// merged into the same atomic batch as the tip update.
#[async_trait]
pub trait DependentService: Send + Sync {
    /// Service name, for logs and errors.
    fn name(&self) -> &str;

    /// Operations applying `block` (already annotated with its height).
    async fn on_block(&self, _block: &Block) -> Result<Option<Vec<StorageOperation>>, DependentError> {
        Ok(None)
    }

    /// Operations undoing `blocks` while unwinding towards `ancestor`.
    async fn on_reorg(
        &self,
        _ancestor: &Hash,
        _blocks: &[Block],
    ) -> Result<Option<Vec<StorageOperation>>, DependentError> {
        Ok(None)
    }
}
