//! Chain builders and a wired-up service for tests.

use crate::adapters::{
    InMemoryHeaderIndex, InMemoryPeerNetwork, InMemoryStorageEngine, StoredTimestampIndex,
};
use crate::config::BlockServiceConfig;
use crate::domain::encoding::{encode_tip, BlockEncoding};
use crate::domain::entities::{Block, BlockHeader, ChainTip, Hash, Transaction, ZERO_HASH};
use crate::domain::errors::BlockServiceError;
use crate::domain::value_objects::StorageOperation;
use crate::ports::outbound::{DependentService, StorageEngine};
use crate::service::{BlockService, BlockServiceDependencies, NodeHandle};
use std::sync::Arc;

pub const GENESIS_TIME: u32 = 1_231_006_505;
pub const BLOCK_SPACING: u32 = 600;

/// Block with a single transaction whose id doubles as the merkle root.
pub fn make_test_block(prev_hash: Hash, time: u32, nonce: u32) -> Block {
    let mut payload = prev_hash.to_vec();
    payload.extend_from_slice(&nonce.to_le_bytes());
    let coinbase = Transaction {
        version: 1,
        payload,
        lock_time: 0,
    };
    Block::new(
        BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: coinbase.txid(),
            time,
            bits: 0x207f_ffff,
            nonce,
        },
        vec![coinbase],
    )
}

pub fn genesis_block() -> Block {
    make_test_block(ZERO_HASH, GENESIS_TIME, 0)
}

/// `len` blocks extending `parent`. Different `branch` values yield
/// distinct hashes at the same heights.
pub fn build_chain(parent: &Block, len: usize, branch: u32) -> Vec<Block> {
    let mut prev = parent.hash();
    let mut time = parent.header.time;
    (0..len)
        .map(|i| {
            time += BLOCK_SPACING;
            let block = make_test_block(prev, time, branch * 1_000_000 + i as u32 + 1);
            prev = block.hash();
            block
        })
        .collect()
}

/// Persist `genesis` and a tip record pointing at it.
pub async fn seed_genesis(
    storage: &dyn StorageEngine,
    genesis: &Block,
    service_name: &str,
) -> Result<ChainTip, BlockServiceError> {
    let encoding = BlockEncoding::new(storage.get_prefix(service_name).await?);
    let tip = ChainTip::new(genesis.hash(), 0);
    storage
        .batch(vec![
            StorageOperation::put(
                encoding.encode_block_key(&tip.hash),
                encoding.encode_block_value(genesis)?,
            ),
            encode_tip(&tip, service_name),
        ])
        .await?;
    Ok(tip)
}

/// In-memory collaborators around a seeded genesis block.
pub struct TestHarness {
    pub storage: Arc<InMemoryStorageEngine>,
    pub headers: Arc<InMemoryHeaderIndex>,
    pub peers: Arc<InMemoryPeerNetwork>,
    pub timestamps: Arc<StoredTimestampIndex>,
    pub node: Arc<NodeHandle>,
    pub config: BlockServiceConfig,
    pub genesis: Block,
}

impl TestHarness {
    /// Genesis stored and on the header chain; nothing else.
    pub async fn new() -> Self {
        let config = BlockServiceConfig::for_testing();
        let storage = Arc::new(InMemoryStorageEngine::new());
        let genesis = genesis_block();

        seed_genesis(storage.as_ref(), &genesis, &config.service_name)
            .await
            .expect("seed genesis");
        let timestamps = Arc::new(
            StoredTimestampIndex::open(storage.clone())
                .await
                .expect("open timestamp index"),
        );
        if let Ok(Some(ops)) = timestamps.on_block(&genesis).await {
            storage.batch(ops).await.expect("seed genesis timestamp");
        }

        Self {
            storage,
            headers: Arc::new(InMemoryHeaderIndex::from_blocks(std::slice::from_ref(&genesis))),
            peers: Arc::new(InMemoryPeerNetwork::new()),
            timestamps,
            node: Arc::new(NodeHandle::new()),
            config,
            genesis,
        }
    }

    /// Genesis followed by `blocks`, as a header-chain slice.
    pub fn with_genesis(&self, blocks: &[Block]) -> Vec<Block> {
        let mut chain = Vec::with_capacity(blocks.len() + 1);
        chain.push(self.genesis.clone());
        chain.extend_from_slice(blocks);
        chain
    }

    /// Start a service with the timestamp index as the only dependent.
    pub async fn start(&self) -> BlockService {
        self.start_with(Vec::new()).await
    }

    /// Start a service; `extra` dependents run after the timestamp index.
    pub async fn start_with(&self, extra: Vec<Arc<dyn DependentService>>) -> BlockService {
        let mut dependents: Vec<Arc<dyn DependentService>> = vec![self.timestamps.clone()];
        dependents.extend(extra);

        BlockService::start(
            BlockServiceDependencies {
                storage: self.storage.clone(),
                headers: self.headers.clone(),
                peers: self.peers.clone(),
                timestamps: self.timestamps.clone(),
                dependents,
            },
            self.config.clone(),
            self.node.clone(),
        )
        .await
        .expect("start block service")
    }
}
