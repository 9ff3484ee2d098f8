use crate::domain::entities::{Block, ChainTip, Hash, IndexedHeader, ZERO_HASH};
use crate::domain::errors::HeaderIndexError;
use crate::ports::outbound::{HeaderIndex, HeaderMap};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory header chain, indexed by height.
///
/// Tests replace the chain wholesale with [`InMemoryHeaderIndex::set_chain`]
/// to simulate the header index switching to a competing branch.
#[derive(Default)]
pub struct InMemoryHeaderIndex {
    chain: RwLock<Vec<IndexedHeader>>,
    announced_best: AtomicU64,
}

impl InMemoryHeaderIndex {
    /// Header chain made of `blocks`, genesis first.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let index = Self::default();
        index.set_chain(blocks);
        index
    }

    /// Replace the header chain with `blocks`, genesis first.
    pub fn set_chain(&self, blocks: &[Block]) {
        *self.chain.write() = blocks
            .iter()
            .enumerate()
            .map(|(height, block)| IndexedHeader::from_header(&block.header, height as u64))
            .collect();
    }

    /// Append one block's header at the next height.
    pub fn push(&self, block: &Block) {
        let mut chain = self.chain.write();
        let height = chain.len() as u64;
        chain.push(IndexedHeader::from_header(&block.header, height));
    }

    /// Record a best height announced by peers (may exceed the header tip).
    pub fn set_best_height(&self, height: u64) {
        self.announced_best.store(height, Ordering::SeqCst);
    }

    fn header_at(&self, height: u64) -> Option<IndexedHeader> {
        let index = usize::try_from(height).ok()?;
        self.chain.read().get(index).cloned()
    }
}

#[async_trait]
impl HeaderIndex for InMemoryHeaderIndex {
    async fn get_header_by_height(
        &self,
        height: u64,
    ) -> Result<Option<IndexedHeader>, HeaderIndexError> {
        Ok(self.header_at(height))
    }

    async fn get_block_header(
        &self,
        hash: &Hash,
    ) -> Result<Option<IndexedHeader>, HeaderIndexError> {
        Ok(self.chain.read().iter().find(|h| &h.hash == hash).cloned())
    }

    fn get_last_header(&self) -> Result<IndexedHeader, HeaderIndexError> {
        self.chain.read().last().cloned().ok_or(HeaderIndexError::Empty)
    }

    async fn get_all_headers(&self) -> Result<HeaderMap, HeaderIndexError> {
        Ok(self
            .chain
            .read()
            .iter()
            .map(|header| (header.hash, header.clone()))
            .collect())
    }

    async fn get_next_hash(&self, tip: &ChainTip) -> Result<(Hash, Hash), HeaderIndexError> {
        let target = self
            .header_at(tip.height + 1)
            .ok_or(HeaderIndexError::NoNextHeader { height: tip.height })?;
        let next = self
            .header_at(tip.height + 2)
            .map_or(ZERO_HASH, |header| header.hash);
        Ok((target.hash, next))
    }

    fn get_current_difficulty(&self) -> f64 {
        self.chain.read().last().map_or(1.0, |h| h.difficulty)
    }

    fn get_best_height(&self) -> u64 {
        let header_tip = (self.chain.read().len() as u64).saturating_sub(1);
        header_tip.max(self.announced_best.load(Ordering::SeqCst))
    }
}
