//! # Adapters Module
//!
//! Collaborator implementations shipped with the Block Ingestion subsystem.
//!
//! ## Modules
//!
//! - `storage`: in-memory `StorageEngine` with atomic batches
//! - `timestamp`: stored block timestamps, kept as a dependent service
//! - `headers`: in-memory header chain
//! - `network`: scripted peer network

pub mod headers;
pub mod network;
pub mod storage;
pub mod timestamp;

pub use headers::InMemoryHeaderIndex;
pub use network::InMemoryPeerNetwork;
pub use storage::InMemoryStorageEngine;
pub use timestamp::{StoredTimestampIndex, TIMESTAMP_SERVICE_NAME};
