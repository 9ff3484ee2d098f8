//! # Sync Flows
//!
//! Initial block download and the hand-off to push delivery:
//!
//! 1. Catch-up issues exactly one range request per missing block
//! 2. Repeated or concurrent header rounds never refetch
//! 3. A restarted service resumes from the persisted tip
//! 4. Best-height announcements drop push delivery until the next round

#[cfg(test)]
mod tests {
    use crate::init_test_tracing;
    use qc_02_block_ingestion::test_utils::{build_chain, TestHarness};
    use qc_02_block_ingestion::{
        BlockQueryApi, BlockService, BlockServiceConfig, BlockServiceDependencies, ChainTip,
        DependentService, NodeHandle, SyncState,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_initial_block_download() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let chain = build_chain(&h.genesis, 300, 0);
        h.headers.set_chain(&h.with_genesis(&chain));
        h.peers.add_blocks(&chain);
        assert_eq!(service.sync_percentage().unwrap(), "0.00");
        assert!(!service.is_synced());

        service.on_headers().await.unwrap();

        assert_eq!(service.tip(), ChainTip::new(chain[299].hash(), 300));
        assert_eq!(h.peers.request_count(), 300);
        assert_eq!(service.sync_percentage().unwrap(), "100.00");
        assert_eq!(service.sync_state(), SyncState::Synced);
        assert_eq!(service.get_info().blocks, 300);
    }

    #[tokio::test]
    async fn test_repeated_header_rounds_do_not_refetch() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let chain = build_chain(&h.genesis, 20, 0);
        h.headers.set_chain(&h.with_genesis(&chain));
        h.peers.add_blocks(&chain);

        let (first, second) = tokio::join!(service.on_headers(), service.on_headers());
        first.unwrap();
        second.unwrap();
        assert_eq!(service.tip().height, 20);

        service.on_headers().await.unwrap();
        assert_eq!(h.peers.request_count(), 20);
    }

    #[tokio::test]
    async fn test_headers_extend_after_sync() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let chain = build_chain(&h.genesis, 6, 0);
        h.headers.set_chain(&h.with_genesis(&chain[..3]));
        h.peers.add_blocks(&chain);
        service.on_headers().await.unwrap();
        assert_eq!(service.tip().height, 3);

        h.headers.set_chain(&h.with_genesis(&chain));
        service.on_headers().await.unwrap();

        assert_eq!(service.tip(), ChainTip::new(chain[5].hash(), 6));
        assert_eq!(h.peers.request_count(), 6);
    }

    #[tokio::test]
    async fn test_restart_resumes_from_persisted_tip() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let chain = build_chain(&h.genesis, 12, 0);
        h.headers.set_chain(&h.with_genesis(&chain));
        h.peers.add_blocks(&chain[..8]);
        let result = service.on_headers().await;
        assert!(result.is_err());
        assert_eq!(service.tip().height, 8);
        service.stop().await;

        // Peers can now serve the rest
        h.peers.add_blocks(&chain[8..]);
        let restarted = BlockService::start(
            BlockServiceDependencies {
                storage: h.storage.clone(),
                headers: h.headers.clone(),
                peers: h.peers.clone(),
                timestamps: h.timestamps.clone(),
                dependents: vec![h.timestamps.clone() as Arc<dyn DependentService>],
            },
            BlockServiceConfig::for_testing(),
            Arc::new(NodeHandle::new()),
        )
        .await
        .unwrap();
        assert_eq!(restarted.tip(), ChainTip::new(chain[7].hash(), 8));

        restarted.on_headers().await.unwrap();

        assert_eq!(restarted.tip(), ChainTip::new(chain[11].hash(), 12));
        // 8 served, 1 failed, 4 after restart
        assert_eq!(h.peers.request_count(), 13);
    }

    #[tokio::test]
    async fn test_best_height_pauses_push_until_next_round() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;
        service.on_headers().await.unwrap();
        assert!(service.is_block_subscription_active());

        h.headers.set_best_height(5);
        h.peers.announce_best_height(5);
        wait_until(|| !service.is_block_subscription_active()).await;

        // Pushes are ignored while unsubscribed
        let chain = build_chain(&h.genesis, 5, 0);
        h.peers.announce_block(chain[0].clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(service.tip().height, 0);

        // The next header round catches up and resubscribes
        h.headers.set_chain(&h.with_genesis(&chain));
        h.peers.add_blocks(&chain);
        service.on_headers().await.unwrap();

        assert_eq!(service.tip().height, 5);
        assert!(service.is_block_subscription_active());
    }
}
