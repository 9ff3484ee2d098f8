//! Stored block timestamps.
//!
//! Runs as a dependent service of the block service: each accepted block
//! contributes a put of its header time, each unwound block a delete, both
//! inside the block event's batch. Reads go straight to storage.

use crate::domain::entities::{Block, Hash};
use crate::domain::errors::{DependentError, StorageError};
use crate::domain::value_objects::StorageOperation;
use crate::ports::outbound::{DependentService, StorageEngine, TimestampIndex};
use async_trait::async_trait;
use std::sync::Arc;

/// Service name; also names the storage prefix.
pub const TIMESTAMP_SERVICE_NAME: &str = "timestamp";

/// Timestamp index persisted next to the blocks.
pub struct StoredTimestampIndex {
    storage: Arc<dyn StorageEngine>,
    prefix: Vec<u8>,
}

impl StoredTimestampIndex {
    /// Allocate (or reuse) the prefix and open the index.
    pub async fn open(storage: Arc<dyn StorageEngine>) -> Result<Self, StorageError> {
        let prefix = storage.get_prefix(TIMESTAMP_SERVICE_NAME).await?;
        Ok(Self { storage, prefix })
    }

    fn key(&self, hash: &Hash) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + hash.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(hash);
        key
    }
}

#[async_trait]
impl DependentService for StoredTimestampIndex {
    fn name(&self) -> &str {
        TIMESTAMP_SERVICE_NAME
    }

    async fn on_block(&self, block: &Block) -> Result<Option<Vec<StorageOperation>>, DependentError> {
        let timestamp = u64::from(block.header.time);
        Ok(Some(vec![StorageOperation::put(
            self.key(&block.hash()),
            timestamp.to_be_bytes().to_vec(),
        )]))
    }

    async fn on_reorg(
        &self,
        _ancestor: &Hash,
        blocks: &[Block],
    ) -> Result<Option<Vec<StorageOperation>>, DependentError> {
        Ok(Some(
            blocks
                .iter()
                .map(|block| StorageOperation::delete(self.key(&block.hash())))
                .collect(),
        ))
    }
}

#[async_trait]
impl TimestampIndex for StoredTimestampIndex {
    async fn get_timestamp(&self, hash: &Hash) -> Result<Option<u64>, StorageError> {
        let Some(value) = self.storage.get(&self.key(hash)).await? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = value.as_slice().try_into().map_err(|_| {
            StorageError::Io(format!("timestamp record has {} bytes", value.len()))
        })?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }
}
