use crate::domain::encoding::{decode_tip_value, tip_key};
use crate::domain::entities::ChainTip;
use crate::domain::errors::StorageError;
use crate::domain::value_objects::StorageOperation;
use crate::ports::outbound::StorageEngine;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// First prefix handed out; the leading byte never collides with tip keys.
const FIRST_PREFIX: u16 = 0x0100;

/// In-memory storage engine.
///
/// Batches apply under a single write lock, so readers never observe a
/// partially applied batch.
#[derive(Default)]
pub struct InMemoryStorageEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    prefixes: Mutex<HashMap<String, Vec<u8>>>,
    batches: AtomicUsize,
    fail_next_batch: AtomicBool,
}

impl InMemoryStorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches committed so far.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Reject the next batch without applying any of it.
    pub fn fail_next_batch(&self) {
        self.fail_next_batch.store(true, Ordering::SeqCst);
    }

    /// True if `key` is present.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Keys starting with `prefix`, in key order.
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageEngine for InMemoryStorageEngine {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn batch(&self, operations: Vec<StorageOperation>) -> Result<(), StorageError> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(StorageError::BatchFailed(format!(
                "injected failure ({} operations discarded)",
                operations.len()
            )));
        }

        let mut data = self.data.write();
        for op in operations {
            match op {
                StorageOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                StorageOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_prefix(&self, service_name: &str) -> Result<Vec<u8>, StorageError> {
        let mut prefixes = self.prefixes.lock();
        if let Some(prefix) = prefixes.get(service_name) {
            return Ok(prefix.clone());
        }

        let next = u16::try_from(prefixes.len())
            .ok()
            .and_then(|n| FIRST_PREFIX.checked_add(n))
            .ok_or_else(|| StorageError::Io("prefix space exhausted".to_string()))?;
        let prefix = next.to_be_bytes().to_vec();
        prefixes.insert(service_name.to_string(), prefix.clone());
        Ok(prefix)
    }

    async fn get_service_tip(&self, service_name: &str) -> Result<Option<ChainTip>, StorageError> {
        match self.data.read().get(&tip_key(service_name)) {
            Some(value) => decode_tip_value(value)
                .map(Some)
                .map_err(|e| StorageError::Corrupted(e.to_string())),
            None => Ok(None),
        }
    }
}
