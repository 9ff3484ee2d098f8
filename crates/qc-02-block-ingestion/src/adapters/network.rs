use crate::domain::entities::{Block, Hash};
use crate::domain::errors::NetworkError;
use crate::ports::outbound::{BlockRequest, PeerNetwork};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Scripted peer network.
///
/// Serves range requests from a local block set and records every request,
/// so tests can assert on what the sync driver asked for. Push delivery and
/// best-height announcements go through broadcast channels.
pub struct InMemoryPeerNetwork {
    blocks: RwLock<HashMap<Hash, Block>>,
    requests: Mutex<Vec<BlockRequest>>,
    cache_clears: AtomicUsize,
    peers: AtomicUsize,
    block_tx: broadcast::Sender<Block>,
    best_height_tx: broadcast::Sender<u64>,
}

impl InMemoryPeerNetwork {
    pub fn new() -> Self {
        let (block_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (best_height_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            blocks: RwLock::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            cache_clears: AtomicUsize::new(0),
            peers: AtomicUsize::new(8),
            block_tx,
            best_height_tx,
        }
    }

    /// Make `blocks` available to range requests.
    pub fn add_blocks<'a>(&self, blocks: impl IntoIterator<Item = &'a Block>) {
        let mut served = self.blocks.write();
        for block in blocks {
            served.insert(block.hash(), block.clone());
        }
    }

    /// Set the reported peer count.
    pub fn set_peer_count(&self, count: usize) {
        self.peers.store(count, Ordering::SeqCst);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<BlockRequest> {
        self.requests.lock().clone()
    }

    /// Number of range requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of inventory cache clears.
    pub fn cache_clear_count(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }

    /// Push `block` to block subscribers. Returns the number of receivers.
    pub fn announce_block(&self, block: Block) -> usize {
        self.block_tx.send(block).unwrap_or(0)
    }

    /// Announce a new best height. Returns the number of receivers.
    pub fn announce_best_height(&self, height: u64) -> usize {
        self.best_height_tx.send(height).unwrap_or(0)
    }
}

impl Default for InMemoryPeerNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerNetwork for InMemoryPeerNetwork {
    fn number_of_peers(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }

    fn clear_inventory_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }

    async fn get_block(&self, request: BlockRequest) -> Result<Block, NetworkError> {
        self.requests.lock().push(request);
        self.blocks
            .read()
            .get(&request.target_hash)
            .cloned()
            .ok_or(NetworkError::BlockUnavailable(request.target_hash))
    }

    fn subscribe_blocks(&self) -> broadcast::Receiver<Block> {
        self.block_tx.subscribe()
    }

    fn subscribe_best_height(&self) -> broadcast::Receiver<u64> {
        self.best_height_tx.subscribe()
    }
}
