//! # Block Record Codec
//!
//! Storage layout for this service:
//!
//! | Record | Key | Value |
//! |--------|-----|-------|
//! | Block  | `service prefix ++ hash` | bincode block |
//! | Tip    | `0x00 ++ "tip-" ++ service name` | `height (u64 BE) ++ hash` |
//!
//! Decoding a malformed value is a data-corruption condition.

use crate::domain::entities::{Block, ChainTip, Hash};
use crate::domain::errors::BlockServiceError;
use crate::domain::value_objects::StorageOperation;

/// Length of an encoded tip value.
pub const TIP_VALUE_LEN: usize = 8 + 32;

/// Maps block identities and payloads to storage keys and values.
#[derive(Debug, Clone)]
pub struct BlockEncoding {
    prefix: Vec<u8>,
}

impl BlockEncoding {
    /// Create a codec for the prefix allocated to this service.
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The service prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Key of the block record for `hash`.
    pub fn encode_block_key(&self, hash: &Hash) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + hash.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(hash);
        key
    }

    /// Hash carried by a block key.
    pub fn decode_block_key(&self, key: &[u8]) -> Result<Hash, BlockServiceError> {
        let body = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or_else(|| BlockServiceError::DataCorruption("block key prefix".to_string()))?;
        body.try_into()
            .map_err(|_| BlockServiceError::DataCorruption("block key length".to_string()))
    }

    /// Persisted form of a block. Annotations are not stored.
    pub fn encode_block_value(&self, block: &Block) -> Result<Vec<u8>, BlockServiceError> {
        bincode::serialize(block).map_err(|e| BlockServiceError::Encoding(e.to_string()))
    }

    /// Decode a stored block.
    pub fn decode_block_value(&self, data: &[u8]) -> Result<Block, BlockServiceError> {
        bincode::deserialize(data)
            .map_err(|e| BlockServiceError::DataCorruption(format!("block record: {}", e)))
    }
}

/// Key of the tip record for `service_name`.
pub fn tip_key(service_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(5 + service_name.len());
    key.push(0x00);
    key.extend_from_slice(b"tip-");
    key.extend_from_slice(service_name.as_bytes());
    key
}

/// Encode the tip record value.
pub fn encode_tip_value(tip: &ChainTip) -> Vec<u8> {
    let mut value = Vec::with_capacity(TIP_VALUE_LEN);
    value.extend_from_slice(&tip.height.to_be_bytes());
    value.extend_from_slice(&tip.hash);
    value
}

/// Decode the tip record value.
pub fn decode_tip_value(data: &[u8]) -> Result<ChainTip, BlockServiceError> {
    if data.len() != TIP_VALUE_LEN {
        return Err(BlockServiceError::DataCorruption(format!(
            "tip record has {} bytes, expected {}",
            data.len(),
            TIP_VALUE_LEN
        )));
    }
    let mut height = [0u8; 8];
    height.copy_from_slice(&data[..8]);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&data[8..]);
    Ok(ChainTip::new(hash, u64::from_be_bytes(height)))
}

/// Put operation writing `tip` as the tip record of `service_name`.
pub fn encode_tip(tip: &ChainTip, service_name: &str) -> StorageOperation {
    StorageOperation::put(tip_key(service_name), encode_tip_value(tip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{BlockHeader, Transaction};

    fn sample_block() -> Block {
        Block::new(
            BlockHeader {
                version: 2,
                prev_hash: [0x22; 32],
                merkle_root: [0x33; 32],
                time: 1_400_000_000,
                bits: 0x1d00_ffff,
                nonce: 42,
            },
            vec![Transaction {
                version: 1,
                payload: vec![1, 2, 3],
                lock_time: 0,
            }],
        )
    }

    #[test]
    fn test_block_key_layout() {
        let encoding = BlockEncoding::new(vec![0x00, 0x07]);
        let key = encoding.encode_block_key(&[0xFF; 32]);
        assert_eq!(key.len(), 34);
        assert_eq!(&key[..2], &[0x00, 0x07]);
        assert_eq!(encoding.decode_block_key(&key).unwrap(), [0xFF; 32]);
    }

    #[test]
    fn test_stored_block_drops_annotations() {
        let encoding = BlockEncoding::new(vec![0x00, 0x01]);
        let mut block = sample_block();
        block.height = Some(9);
        block.timestamp = Some(1_400_000_001);

        let value = encoding.encode_block_value(&block).unwrap();
        let decoded = encoding.decode_block_value(&value).unwrap();

        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.transactions, block.transactions);
        assert_eq!(decoded.height, None);
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn test_malformed_block_value_is_corruption() {
        let encoding = BlockEncoding::new(vec![0x00, 0x01]);
        let err = encoding.decode_block_value(&[0xDE, 0xAD]).unwrap_err();
        assert!(matches!(err, BlockServiceError::DataCorruption(_)));
    }

    #[test]
    fn test_tip_record() {
        let tip = ChainTip::new([0x5A; 32], 144);
        let op = encode_tip(&tip, "block");

        match op {
            StorageOperation::Put { key, value } => {
                assert_eq!(key, b"\x00tip-block".to_vec());
                assert_eq!(decode_tip_value(&value).unwrap(), tip);
            }
            other => panic!("expected put, got {:?}", other),
        }

        assert!(decode_tip_value(&[0u8; 12]).is_err());
    }
}
