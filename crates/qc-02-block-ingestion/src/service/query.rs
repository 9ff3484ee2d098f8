//! Read-only query surface of the block service.

use super::BlockService;
use crate::domain::entities::{Block, BlockArg, ChainTip, Hash};
use crate::domain::errors::BlockServiceError;
use crate::domain::value_objects::{BlockOverview, NodeInfo};
use crate::ports::inbound::BlockQueryApi;
use async_trait::async_trait;

impl BlockService {
    /// Resolve a height through the header index; hashes pass through.
    async fn resolve_hash(&self, arg: BlockArg) -> Result<Option<Hash>, BlockServiceError> {
        match arg {
            BlockArg::Hash(hash) => Ok(Some(hash)),
            BlockArg::Height(height) => Ok(self
                .headers
                .get_header_by_height(height)
                .await?
                .map(|header| header.hash)),
        }
    }
}

#[async_trait]
impl BlockQueryApi for BlockService {
    fn get_info(&self) -> NodeInfo {
        NodeInfo {
            blocks: self.tip.height(),
            connections: self.peers.number_of_peers(),
            timeoffset: 0,
            proxy: String::new(),
            testnet: self.config.is_testnet(),
            errors: String::new(),
            network: self.config.network.clone(),
            relay_fee: 0,
            version: self.config.version.clone(),
            protocol_version: self.config.protocol_version,
            difficulty: self.headers.get_current_difficulty(),
        }
    }

    async fn get_block(&self, arg: BlockArg) -> Result<Option<Block>, BlockServiceError> {
        match self.resolve_hash(arg).await? {
            Some(hash) => self.processor.get_block(&hash).await,
            None => Ok(None),
        }
    }

    async fn get_raw_block(&self, arg: BlockArg) -> Result<Option<String>, BlockServiceError> {
        let Some(hash) = self.resolve_hash(arg).await? else {
            return Ok(None);
        };
        Ok(self
            .processor
            .get_block_record(&hash)
            .await?
            .map(hex::encode))
    }

    async fn get_block_overview(
        &self,
        hash: &Hash,
    ) -> Result<Option<BlockOverview>, BlockServiceError> {
        let Some(block) = self.processor.get_block(hash).await? else {
            return Ok(None);
        };
        let Some(header) = self.headers.get_block_header(hash).await? else {
            return Ok(None);
        };

        let next_hash = self
            .headers
            .get_header_by_height(header.height + 1)
            .await?
            .map(|next| hex::encode(next.hash));

        let time = self
            .timestamps
            .get_timestamp(hash)
            .await?
            .unwrap_or(u64::from(block.header.time));

        let confirmations = (self.tip.height() + 1).saturating_sub(header.height);

        Ok(Some(BlockOverview {
            hash: hex::encode(hash),
            version: block.header.version,
            confirmations,
            height: header.height,
            chain_work: header.chainwork,
            prev_hash: hex::encode(header.prev_hash),
            next_hash,
            merkle_root: hex::encode(header.merkle_root),
            time,
            median_time: None,
            nonce: header.nonce,
            bits: header.bits,
            difficulty: header.difficulty,
            txids: block.txids().iter().map(hex::encode).collect(),
        }))
    }

    fn get_best_block_hash(&self) -> Result<Hash, BlockServiceError> {
        Ok(self.headers.get_last_header()?.hash)
    }

    fn sync_percentage(&self) -> Result<String, BlockServiceError> {
        self.sync.sync_percentage()
    }

    fn is_synced(&self) -> bool {
        self.sync.is_synced()
    }

    fn get_tip(&self) -> ChainTip {
        self.tip.get()
    }
}
