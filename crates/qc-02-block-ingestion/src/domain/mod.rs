//! # Domain Layer
//!
//! Pure domain logic for the Block Ingestion subsystem.
//!
//! ## Modules
//!
//! - `entities` - Blocks, headers, chain tip
//! - `value_objects` - Storage operations, outcomes, query responses
//! - `errors` - Domain and collaborator error types
//! - `tip` - The single owner of the current chain tip
//! - `encoding` - Block record and tip record codec

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod tip;
pub mod value_objects;

pub use encoding::*;
pub use entities::*;
pub use errors::*;
pub use tip::*;
pub use value_objects::*;
