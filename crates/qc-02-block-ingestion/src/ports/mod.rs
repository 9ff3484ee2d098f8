//! # Ports Layer
//!
//! Defines the port traits for the Block Ingestion subsystem.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (query surface and block event publishing)
//! - `outbound.rs` - Driven ports (storage, header index, peers, timestamps,
//!   dependent services)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
