//! # Block Ingestion (qc-02)
//!
//! Maintains the node's locally accepted best chain. Blocks arrive from
//! peers, are serialized through a single-worker queue, and are either
//! appended to the tip or trigger a reorganization that unwinds the tip to
//! the common ancestor with the header chain.
//!
//! ## Architecture
//!
//! ```text
//! PeerNetwork ──push──┐
//!                     ├──► IngestionQueue ──► ChainProcessor ──► StorageEngine
//! SyncDriver ──fetch──┘    (single worker)        │               (one batch per event)
//!                                                 ├──► DependentService hooks
//!                                                 └──► block/block subscribers
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Single writer | Only the ingestion worker mutates the tip |
//! | Linkage | An accepted block's predecessor is the tip it was applied to |
//! | Atomicity | Block record, tip record and dependent effects commit together |
//! | Tip after commit | The in-memory tip moves only after its batch committed |
//! | Idempotence | A stored block is never re-applied |
//! | Header arbitration | Reorgs unwind to a hash on the header chain |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Entities, storage encoding, errors, the tip store
//! - `ports/` - Query/publish surface (inbound) and collaborators (outbound)
//! - `service/` - Queue, chain processor, sync driver, query implementation
//! - `adapters/` - In-memory storage, stored timestamp index, test collaborators
//!
//! ## Usage
//!
//! ```ignore
//! use qc_02_block_ingestion::{BlockService, BlockServiceConfig, BlockServiceDependencies, NodeHandle};
//!
//! let node = Arc::new(NodeHandle::new());
//! let service = BlockService::start(deps, BlockServiceConfig::default(), node).await?;
//!
//! // Header index finished a round
//! service.on_headers().await?;
//!
//! // Peer pushed a block
//! service.queue_block(block);
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use config::BlockServiceConfig;
pub use domain::entities::{Block, BlockArg, BlockHeader, ChainTip, Hash, IndexedHeader, Transaction};
pub use domain::errors::{
    BlockServiceError, DependentError, HeaderIndexError, NetworkError, StorageError,
};
pub use domain::value_objects::{
    BlockOutcome, BlockOverview, NodeInfo, OperationBatch, StorageOperation, SyncState,
};
pub use ports::inbound::{
    BlockEventPublisher, BlockNotification, BlockQueryApi, BlockSubscriber, API_METHODS,
    BLOCK_EVENT,
};
pub use ports::outbound::{
    BlockRequest, DependentService, HeaderIndex, PeerNetwork, StorageEngine, TimestampIndex,
};
pub use service::{BlockService, BlockServiceDependencies, NodeHandle};
