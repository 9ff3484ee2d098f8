//! # Integration Flows
//!
//! The block service wired to the in-memory collaborators, driven the way a
//! node drives it: header rounds, peer pushes, best-height announcements.

pub mod publish_flow;
pub mod reorg_flow;
pub mod sync_flow;
