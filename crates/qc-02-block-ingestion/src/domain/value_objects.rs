//! # Value Objects
//!
//! Storage mutations, processing outcomes, sync state and the response shapes
//! of the query surface.

use crate::domain::entities::{ChainTip, Hash};
use serde::{Deserialize, Serialize};

/// A single storage mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl StorageOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        StorageOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        StorageOperation::Delete { key: key.into() }
    }

    /// Key touched by this operation.
    pub fn key(&self) -> &[u8] {
        match self {
            StorageOperation::Put { key, .. } | StorageOperation::Delete { key } => key,
        }
    }
}

/// Accumulates every contribution for one block event.
///
/// Hooks that decline contribute `None`; `into_operations` drops those and
/// flattens the rest in contribution order.
#[derive(Debug, Default)]
pub struct OperationBatch {
    parts: Vec<Option<Vec<StorageOperation>>>,
}

impl OperationBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook's contribution.
    pub fn extend(&mut self, part: Option<Vec<StorageOperation>>) {
        self.parts.push(part);
    }

    /// Add a single operation.
    pub fn push(&mut self, op: StorageOperation) {
        self.parts.push(Some(vec![op]));
    }

    /// Append all parts of another batch.
    pub fn append(&mut self, other: OperationBatch) {
        self.parts.extend(other.parts);
    }

    /// Number of operations after compaction.
    pub fn len(&self) -> usize {
        self.parts.iter().flatten().map(Vec::len).sum()
    }

    /// True if compaction leaves nothing to write.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten and compact into the operation list submitted as one batch.
    pub fn into_operations(self) -> Vec<StorageOperation> {
        self.parts.into_iter().flatten().flatten().collect()
    }
}

/// Result of one ingestion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block was committed and the tip advanced.
    Accepted {
        /// New tip.
        tip: ChainTip,
        /// Blocks unwound before acceptance (0 on the common path).
        unwound: u64,
    },
    /// The block was already stored; nothing was written.
    Duplicate,
    /// The block does not connect to the local chain; nothing was written.
    Orphaned {
        /// Hash of the dropped block.
        hash: Hash,
    },
    /// The node is stopping; the job was skipped.
    Skipped,
    /// Header-triggered check found the tip on the header chain.
    TipVerified,
    /// Header-triggered check unwound the tip to the common ancestor.
    TipRewound {
        /// Tip after the unwind.
        tip: ChainTip,
        /// Blocks removed.
        unwound: u64,
    },
}

/// Sync driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Pulling block ranges from peers.
    CatchingUp,
    /// Caught up; new blocks arrive by push.
    Synced,
}

/// Response of `getInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub blocks: u64,
    pub connections: usize,
    pub timeoffset: i64,
    pub proxy: String,
    pub testnet: bool,
    pub errors: String,
    pub network: String,
    pub relay_fee: u64,
    pub version: String,
    #[serde(rename = "protocolversion")]
    pub protocol_version: u32,
    pub difficulty: f64,
}

/// Response of `getBlockOverview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverview {
    pub hash: String,
    pub version: u32,
    pub confirmations: u64,
    pub height: u64,
    pub chain_work: String,
    pub prev_hash: String,
    pub next_hash: Option<String>,
    pub merkle_root: String,
    pub time: u64,
    pub median_time: Option<u64>,
    pub nonce: u32,
    pub bits: u32,
    pub difficulty: f64,
    pub txids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_compacts_declined_parts() {
        let mut batch = OperationBatch::new();
        batch.extend(None);
        batch.extend(Some(vec![
            StorageOperation::put(b"a".to_vec(), b"1".to_vec()),
            StorageOperation::delete(b"b".to_vec()),
        ]));
        batch.extend(Some(vec![]));
        batch.push(StorageOperation::put(b"tip".to_vec(), b"2".to_vec()));

        assert_eq!(batch.len(), 3);
        let ops = batch.into_operations();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].key(), b"a");
        assert_eq!(ops[2].key(), b"tip");
    }

    #[test]
    fn test_empty_batch() {
        let mut batch = OperationBatch::new();
        batch.extend(None);
        assert!(batch.is_empty());
        assert!(batch.into_operations().is_empty());
    }

    #[test]
    fn test_node_info_json_keys() {
        let info = NodeInfo {
            blocks: 10,
            connections: 8,
            timeoffset: 0,
            proxy: String::new(),
            testnet: false,
            errors: String::new(),
            network: "livenet".to_string(),
            relay_fee: 0,
            version: "qc".to_string(),
            protocol_version: 700001,
            difficulty: 1.0,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["protocolversion"], 700001);
        assert_eq!(json["relayFee"], 0);
    }
}
