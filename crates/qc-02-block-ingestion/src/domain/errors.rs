//! # Domain Errors
//!
//! Error types for the Block Ingestion subsystem.
//!
//! Collaborator failures (storage, header index, peer network, dependent
//! services) are operational; missing data during a reorg, malformed stored
//! records and an absent startup tip are integrity failures. None of them are
//! retried: the ingestion worker forwards every failure to the node handle.

use crate::domain::entities::Hash;
use thiserror::Error;

/// Storage engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error during read/write.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Atomic batch rejected by the engine.
    #[error("storage batch failed: {0}")]
    BatchFailed(String),

    /// A record read back from the engine is malformed.
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

/// Header index errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderIndexError {
    /// The header index has no headers at all.
    #[error("header index is empty")]
    Empty,

    /// No header follows the given tip.
    #[error("no header after height {height}")]
    NoNextHeader {
        /// Tip height the lookup started from.
        height: u64,
    },

    /// Index backend failure.
    #[error("header index failure: {0}")]
    Backend(String),
}

/// Peer network errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// No connected peer could serve the requested block.
    #[error("block {} unavailable from peers", hex::encode(.0))]
    BlockUnavailable(Hash),

    /// Transport failure.
    #[error("peer network failure: {0}")]
    Transport(String),
}

/// Error returned by a dependent service hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("dependent service '{service}' failed: {message}")]
pub struct DependentError {
    /// Name of the failing service.
    pub service: String,
    /// Failure description.
    pub message: String,
}

impl DependentError {
    /// Create a new dependent error.
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the block service.
#[derive(Debug, Error)]
pub enum BlockServiceError {
    /// No tip record exists for this service at startup.
    #[error("tip is not initialized for service '{service}'")]
    TipNotInitialized {
        /// Service whose tip is missing.
        service: String,
    },

    /// A block expected on the local chain is missing during reorg.
    #[error("block not found for reorg: {}", hex::encode(.0))]
    ReorgBlockNotFound(Hash),

    /// A block's timestamp is missing during reorg.
    #[error("timestamp missing from reorg: {}", hex::encode(.0))]
    ReorgTimestampMissing(Hash),

    /// Unwinding would go below genesis without reaching the ancestor.
    #[error("reorg walked past genesis looking for ancestor {}", hex::encode(.ancestor))]
    ReorgPastGenesis {
        /// The ancestor that was never reached.
        ancestor: Hash,
    },

    /// A stored record failed to decode.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A block could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Catch-up made no progress on a delivered block.
    #[error("sync stalled at height {height}")]
    SyncStalled {
        /// Tip height that failed to advance.
        height: u64,
    },

    /// The ingestion worker is gone.
    #[error("ingestion queue closed")]
    QueueClosed,

    /// Storage engine failure.
    #[error(transparent)]
    Storage(StorageError),

    /// Header index failure.
    #[error(transparent)]
    HeaderIndex(#[from] HeaderIndexError),

    /// Peer network failure.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Dependent service failure.
    #[error(transparent)]
    Dependent(#[from] DependentError),
}

impl From<StorageError> for BlockServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupted(message) => BlockServiceError::DataCorruption(message),
            other => BlockServiceError::Storage(other),
        }
    }
}

impl BlockServiceError {
    /// Integrity failures mean persisted state can no longer be trusted.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            BlockServiceError::TipNotInitialized { .. }
                | BlockServiceError::ReorgBlockNotFound(_)
                | BlockServiceError::ReorgTimestampMissing(_)
                | BlockServiceError::ReorgPastGenesis { .. }
                | BlockServiceError::DataCorruption(_)
        )
    }
}
