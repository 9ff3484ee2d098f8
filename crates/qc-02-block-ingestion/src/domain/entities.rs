//! # Domain Entities
//!
//! Core types handled by the block ingestion path: blocks as delivered by the
//! peer network, headers as reported by the header index, and the chain tip.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte block / transaction identifier.
pub type Hash = [u8; 32];

/// All-zero hash, used as the "no next block" marker in range requests.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Double SHA-256 over `data`.
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&second);
    hash
}

/// Short hex form for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

/// The locally accepted best block.
///
/// Exactly one value is authoritative at any instant; it lives in
/// [`ChainTipStore`](crate::domain::tip::ChainTipStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainTip {
    /// Hash of the tip block.
    pub hash: Hash,
    /// Height of the tip block (genesis = 0).
    pub height: u64,
}

impl ChainTip {
    /// Create a new tip.
    pub fn new(hash: Hash, height: u64) -> Self {
        Self { hash, height }
    }
}

impl fmt::Display for ChainTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.height, hex::encode(self.hash))
    }
}

/// Block header as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version.
    pub version: u32,
    /// Hash of the predecessor block.
    pub prev_hash: Hash,
    /// Merkle root of the block's transactions.
    pub merkle_root: Hash,
    /// Miner-reported block time (seconds since epoch).
    pub time: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BlockHeader {
    /// Compute the header hash (double SHA-256 over the header fields).
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::with_capacity(80);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.prev_hash);
        buf.extend_from_slice(&self.merkle_root);
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        double_sha256(&buf)
    }
}

/// A transaction carried inside a block.
///
/// Transaction semantics are out of scope here; only the identifier matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction version.
    pub version: u32,
    /// Opaque transaction body.
    pub payload: Vec<u8>,
    /// Lock time.
    pub lock_time: u32,
}

impl Transaction {
    /// Transaction id.
    pub fn txid(&self) -> Hash {
        let mut buf = Vec::with_capacity(8 + self.payload.len());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        double_sha256(&buf)
    }
}

/// A block as delivered by the peer network or read back from storage.
///
/// `height` and `timestamp` are annotations stamped by this subsystem during
/// acceptance or reorg unwind. They are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
    /// Height annotation.
    #[serde(skip)]
    pub height: Option<u64>,
    /// Timestamp annotation.
    #[serde(skip)]
    pub timestamp: Option<u64>,
}

impl Block {
    /// Create an un-annotated block.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            height: None,
            timestamp: None,
        }
    }

    /// The block's own hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Hash of the logical predecessor.
    pub fn prev_hash(&self) -> Hash {
        self.header.prev_hash
    }

    /// Transaction ids in block order.
    pub fn txids(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::txid).collect()
    }
}

/// A header as held by the header index collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedHeader {
    /// Header hash.
    pub hash: Hash,
    /// Height on the header chain.
    pub height: u64,
    /// Predecessor hash.
    pub prev_hash: Hash,
    /// Merkle root.
    pub merkle_root: Hash,
    /// Block version.
    pub version: u32,
    /// Header time.
    pub time: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Nonce.
    pub nonce: u32,
    /// Cumulative chain work (hex).
    pub chainwork: String,
    /// Difficulty derived from `bits` by the header index.
    pub difficulty: f64,
}

impl IndexedHeader {
    /// Build the index record for `header` at `height`.
    pub fn from_header(header: &BlockHeader, height: u64) -> Self {
        Self {
            hash: header.hash(),
            height,
            prev_hash: header.prev_hash,
            merkle_root: header.merkle_root,
            version: header.version,
            time: header.time,
            bits: header.bits,
            nonce: header.nonce,
            chainwork: format!("{:064x}", height + 1),
            difficulty: 1.0,
        }
    }
}

/// Argument accepted by block lookups: a height or a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockArg {
    /// Lookup by header-chain height.
    Height(u64),
    /// Lookup by block hash.
    Hash(Hash),
}

impl From<u64> for BlockArg {
    fn from(height: u64) -> Self {
        BlockArg::Height(height)
    }
}

impl From<Hash> for BlockArg {
    fn from(hash: Hash) -> Self {
        BlockArg::Hash(hash)
    }
}

/// Returned when a string is neither a height nor a 64-char hex hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBlockArg(pub String);

impl fmt::Display for InvalidBlockArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid block argument: {}", self.0)
    }
}

impl std::error::Error for InvalidBlockArg {}

impl FromStr for BlockArg {
    type Err = InvalidBlockArg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.len() <= 10 && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u64>()
                .map(BlockArg::Height)
                .map_err(|_| InvalidBlockArg(s.to_string()));
        }

        if s.len() == 64 {
            let mut hash = [0u8; 32];
            if hex::decode_to_slice(s, &mut hash).is_ok() {
                return Ok(BlockArg::Hash(hash));
            }
        }

        Err(InvalidBlockArg(s.to_string()))
    }
}
