//! Storage Adapters
//!
//! Implementations of the `StorageEngine` trait.

mod memory;

pub use memory::InMemoryStorageEngine;
