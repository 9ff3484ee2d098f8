//! # Chain Processor
//!
//! Reorg detection and resolution plus the dependent-service fan-out. Every
//! method here runs on the ingestion worker only, so at most one block event
//! is evaluated or persisted at a time.
//!
//! ## Block event
//!
//! ```text
//! block ──► already stored? ──yes──► Duplicate
//!              │ no
//!              ▼
//!        prev == tip.hash? ──yes──► save_block ──► Accepted
//!              │ no (fork)
//!              ▼
//!        find_common_ancestor ──► handle_reorg (one batch) ──► save_block
//! ```

use crate::domain::encoding::{encode_tip, BlockEncoding};
use crate::domain::entities::{short_hex, Block, ChainTip, Hash};
use crate::domain::errors::BlockServiceError;
use crate::domain::tip::ChainTipStore;
use crate::domain::value_objects::{BlockOutcome, OperationBatch, StorageOperation};
use crate::ports::inbound::BlockNotification;
use crate::ports::outbound::{DependentService, HeaderIndex, StorageEngine, TimestampIndex};
use crate::service::node::NodeHandle;
use crate::service::queue::Job;
use crate::service::subscriptions::SubscriptionRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborators and shared state used by the ingestion worker.
pub struct ChainProcessor {
    pub(crate) service_name: String,
    pub(crate) encoding: BlockEncoding,
    pub(crate) storage: Arc<dyn StorageEngine>,
    pub(crate) headers: Arc<dyn HeaderIndex>,
    pub(crate) timestamps: Arc<dyn TimestampIndex>,
    pub(crate) dependents: Vec<Arc<dyn DependentService>>,
    pub(crate) tip: Arc<ChainTipStore>,
    pub(crate) node: Arc<NodeHandle>,
    pub(crate) subscriptions: Arc<SubscriptionRegistry>,
}

impl ChainProcessor {
    /// Run one queued job.
    pub(crate) async fn handle(&self, job: Job) -> Result<BlockOutcome, BlockServiceError> {
        match job {
            Job::Block(block) => self.on_block(block).await,
            Job::CheckTip => self.check_tip().await,
        }
    }

    /// Stored block by hash, if present.
    pub async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, BlockServiceError> {
        let key = self.encoding.encode_block_key(hash);
        match self.storage.get(&key).await? {
            Some(data) => Ok(Some(self.encoding.decode_block_value(&data)?)),
            None => Ok(None),
        }
    }

    /// Raw stored record of a block, if present.
    pub async fn get_block_record(&self, hash: &Hash) -> Result<Option<Vec<u8>>, BlockServiceError> {
        let key = self.encoding.encode_block_key(hash);
        Ok(self.storage.get(&key).await?)
    }

    async fn on_block(&self, block: Block) -> Result<BlockOutcome, BlockServiceError> {
        if self.node.is_stopping() {
            return Ok(BlockOutcome::Skipped);
        }

        let hash = block.hash();
        if self.get_block(&hash).await?.is_some() {
            debug!("[qc-02] block {} already in database", short_hex(&hash));
            return Ok(BlockOutcome::Duplicate);
        }

        self.process_block(block).await
    }

    async fn process_block(&self, block: Block) -> Result<BlockOutcome, BlockServiceError> {
        let hash = block.hash();
        debug!("[qc-02] new block: {}", hex::encode(hash));

        if !self.detect_reorg(&block) {
            return self.save_block(block, 0).await;
        }

        let prev_hash = block.prev_hash();
        if self.get_block(&prev_hash).await?.is_none() {
            warn!(
                "[qc-02] dropping block {}: predecessor {} is not stored",
                short_hex(&hash),
                short_hex(&prev_hash)
            );
            return Ok(BlockOutcome::Orphaned { hash });
        }

        let ancestor = self.find_common_ancestor(Some(prev_hash)).await?;
        let unwound = self.handle_reorg(ancestor).await?;

        if self.detect_reorg(&block) {
            warn!(
                "[qc-02] block {} does not extend the header chain at tip {}",
                short_hex(&hash),
                self.tip.get()
            );
            return Ok(BlockOutcome::Orphaned { hash });
        }

        self.save_block(block, unwound).await
    }

    /// A block forks iff its predecessor is not the current tip.
    fn detect_reorg(&self, block: &Block) -> bool {
        block.prev_hash() != self.tip.get().hash
    }

    /// Fan the block out to every dependent and commit it with the new tip.
    async fn save_block(
        &self,
        mut block: Block,
        unwound: u64,
    ) -> Result<BlockOutcome, BlockServiceError> {
        let tip = self.tip.get();
        let new_tip = ChainTip::new(block.hash(), tip.height + 1);
        block.height = Some(new_tip.height);

        let mut batch = OperationBatch::new();
        for service in &self.dependents {
            batch.extend(service.on_block(&block).await?);
        }
        batch.push(StorageOperation::put(
            self.encoding.encode_block_key(&new_tip.hash),
            self.encoding.encode_block_value(&block)?,
        ));
        batch.push(encode_tip(&new_tip, &self.service_name));

        self.storage.batch(batch.into_operations()).await?;
        self.tip.set(new_tip);

        debug!(
            "[qc-02] completed processing block: {} prev hash: {} height: {}",
            hex::encode(new_tip.hash),
            hex::encode(block.prev_hash()),
            new_tip.height
        );

        self.subscriptions.broadcast(&BlockNotification {
            block,
            tip: new_tip,
        });

        Ok(BlockOutcome::Accepted {
            tip: new_tip,
            unwound,
        })
    }

    /// Walk back from the tip to the first hash on the header chain.
    ///
    /// `stop_at` (the arriving block's predecessor) also ends the walk.
    /// Terminates because the header chain always contains genesis; walking
    /// below height 0 is an integrity failure.
    pub(crate) async fn find_common_ancestor(
        &self,
        stop_at: Option<Hash>,
    ) -> Result<Hash, BlockServiceError> {
        let headers = self.headers.get_all_headers().await?;
        let tip = self.tip.get();
        let mut hash = tip.hash;
        let mut height = tip.height;

        loop {
            if stop_at == Some(hash) || headers.contains_key(&hash) {
                return Ok(hash);
            }

            let block = self
                .get_block(&hash)
                .await?
                .ok_or(BlockServiceError::ReorgBlockNotFound(hash))?;

            height = height
                .checked_sub(1)
                .ok_or(BlockServiceError::ReorgPastGenesis { ancestor: hash })?;
            hash = block.prev_hash();
        }
    }

    /// Unwind the tip down to `ancestor` in a single atomic batch.
    ///
    /// Returns the number of blocks removed. The in-memory tip moves only
    /// after the batch commits.
    pub(crate) async fn handle_reorg(&self, ancestor: Hash) -> Result<u64, BlockServiceError> {
        let start = self.tip.get();
        if start.hash == ancestor {
            return Ok(0);
        }

        warn!(
            "[qc-02] chain reorganization detected, current height/hash: {} common ancestor hash: {}",
            start,
            hex::encode(ancestor)
        );

        let mut tip = start;
        let mut batch = OperationBatch::new();
        let mut removed = 0u64;

        while tip.hash != ancestor {
            let block = self.get_reorg_block(&tip).await?;
            let height = tip
                .height
                .checked_sub(1)
                .ok_or(BlockServiceError::ReorgPastGenesis { ancestor })?;
            let next_tip = ChainTip::new(block.prev_hash(), height);

            batch.append(self.on_reorg(&ancestor, &block).await?);
            batch.push(StorageOperation::delete(
                self.encoding.encode_block_key(&tip.hash),
            ));
            batch.push(encode_tip(&next_tip, &self.service_name));

            debug!("[qc-02] unwinding block {} at height {}", short_hex(&tip.hash), tip.height);
            tip = next_tip;
            removed += 1;
        }

        self.storage.batch(batch.into_operations()).await?;
        self.tip.set(tip);

        info!(
            "[qc-02] removed {} block(s) during the reorganization event.",
            removed
        );
        Ok(removed)
    }

    /// Undo hooks of every dependent for one unwound block.
    async fn on_reorg(
        &self,
        ancestor: &Hash,
        block: &Block,
    ) -> Result<OperationBatch, BlockServiceError> {
        let mut batch = OperationBatch::new();
        for service in &self.dependents {
            batch.extend(
                service
                    .on_reorg(ancestor, std::slice::from_ref(block))
                    .await?,
            );
        }
        Ok(batch)
    }

    /// Stored tip block, annotated with its height and stored timestamp.
    async fn get_reorg_block(&self, tip: &ChainTip) -> Result<Block, BlockServiceError> {
        let mut block = self
            .get_block(&tip.hash)
            .await?
            .ok_or(BlockServiceError::ReorgBlockNotFound(tip.hash))?;

        let timestamp = self
            .timestamps
            .get_timestamp(&tip.hash)
            .await?
            .ok_or(BlockServiceError::ReorgTimestampMissing(tip.hash))?;

        block.height = Some(tip.height);
        block.timestamp = Some(timestamp);
        Ok(block)
    }

    /// Compare the tip with the header chain and unwind if it left it.
    async fn check_tip(&self) -> Result<BlockOutcome, BlockServiceError> {
        if self.node.is_stopping() {
            return Ok(BlockOutcome::Skipped);
        }

        let tip = self.tip.get();
        let header = match self.headers.get_header_by_height(tip.height).await? {
            Some(header) => header,
            None => self.headers.get_last_header()?,
        };

        if header.hash == tip.hash {
            info!("[qc-02] saved tip is good to go.");
            return Ok(BlockOutcome::TipVerified);
        }

        let ancestor = self.find_common_ancestor(None).await?;
        let unwound = self.handle_reorg(ancestor).await?;
        Ok(BlockOutcome::TipRewound {
            tip: self.tip.get(),
            unwound,
        })
    }
}
