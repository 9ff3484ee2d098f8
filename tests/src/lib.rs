//! # Block Ingestion Test Suite
//!
//! Unified test crate for the block ingestion subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── ingestion_benchmarks.rs   # Acceptance and reorg throughput
//! └── src/integration/
//!     ├── reorg_flow.rs             # Fork resolution end to end
//!     ├── sync_flow.rs              # Initial block download, push delivery
//!     └── publish_flow.rs           # block/block subscribers, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # Logs
//! RUST_LOG=debug cargo test -p qc-tests -- --nocapture
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

#![allow(dead_code)]

pub mod integration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a test-writer subscriber once; later calls are ignored.
pub fn init_test_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
