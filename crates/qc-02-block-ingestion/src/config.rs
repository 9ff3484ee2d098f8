//! # Block Service Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default service name; also names the tip record.
pub const DEFAULT_SERVICE_NAME: &str = "block";

/// Roughly one day of blocks at a 10 minute spacing.
pub const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 144;

/// Block service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockServiceConfig {
    /// Service name used for the storage prefix and tip record.
    pub service_name: String,

    /// Network name reported by `getInfo` ("livenet", "testnet", "regtest").
    pub network: String,

    /// Log download progress every this many blocks.
    pub progress_log_interval: u64,

    /// Poll interval while waiting for the ingestion queue to drain.
    pub drain_poll_interval_ms: u64,

    /// Version string reported by `getInfo`.
    pub version: String,

    /// Protocol version reported by `getInfo`.
    pub protocol_version: u32,
}

impl Default for BlockServiceConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            network: "livenet".to_string(),
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
            drain_poll_interval_ms: 100,
            version: concat!("qc-block-", env!("CARGO_PKG_VERSION")).to_string(),
            protocol_version: 700001,
        }
    }
}

impl BlockServiceConfig {
    /// Create a config for testing (fast polling, regtest network).
    pub fn for_testing() -> Self {
        Self {
            network: "regtest".to_string(),
            drain_poll_interval_ms: 1,
            ..Self::default()
        }
    }

    /// Drain poll interval as a `Duration`.
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms.max(1))
    }

    /// Anything other than livenet counts as a test network.
    pub fn is_testnet(&self) -> bool {
        self.network != "livenet"
    }
}
