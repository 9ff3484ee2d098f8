//! # Publish Flows
//!
//! `block/block` delivery to remote listeners and behavior across shutdown.

#[cfg(test)]
mod tests {
    use crate::init_test_tracing;
    use qc_02_block_ingestion::test_utils::{build_chain, TestHarness};
    use qc_02_block_ingestion::{
        BlockEventPublisher, BlockNotification, BlockServiceError, BlockSubscriber, BLOCK_EVENT,
    };
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<BlockNotification>) -> Vec<BlockNotification> {
        let mut received = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            received.push(notification);
        }
        received
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_each_block_once() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;
        let (wallet, mut wallet_rx) = BlockSubscriber::new("10.0.0.5:3001");
        let (explorer, mut explorer_rx) = BlockSubscriber::new("10.0.0.6:3001");
        service.subscribe(BLOCK_EVENT, wallet);
        service.subscribe(BLOCK_EVENT, explorer);

        let chain = build_chain(&h.genesis, 4, 0);
        h.headers.set_chain(&h.with_genesis(&chain));
        h.peers.add_blocks(&chain);
        service.on_headers().await.unwrap();

        for rx in [&mut wallet_rx, &mut explorer_rx] {
            let heights: Vec<u64> = drain(rx).iter().map(|n| n.tip.height).collect();
            assert_eq!(heights, vec![1, 2, 3, 4]);
        }
    }

    #[tokio::test]
    async fn test_reorg_publishes_only_accepted_blocks() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;
        let (subscriber, mut rx) = BlockSubscriber::new("10.0.0.7:3001");
        service.subscribe(BLOCK_EVENT, subscriber);

        let a = build_chain(&h.genesis, 3, 0);
        for block in &a {
            service.process_block(block.clone()).await.unwrap();
        }
        let b = build_chain(&a[0], 1, 1);
        h.headers
            .set_chain(&h.with_genesis(&[a[0].clone(), b[0].clone()]));
        service.process_block(b[0].clone()).await.unwrap();

        let received = drain(&mut rx);
        let hashes: Vec<_> = received.iter().map(|n| n.block.hash()).collect();
        assert_eq!(
            hashes,
            vec![a[0].hash(), a[1].hash(), a[2].hash(), b[0].hash()]
        );
        assert_eq!(received[3].tip.height, 2);
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;
        let (kept, mut kept_rx) = BlockSubscriber::new("10.0.0.8:3001");
        let (gone, gone_rx) = BlockSubscriber::new("10.0.0.9:3001");
        service.subscribe(BLOCK_EVENT, kept);
        service.subscribe(BLOCK_EVENT, gone);
        drop(gone_rx);
        assert_eq!(service.subscriber_count(), 2);

        let chain = build_chain(&h.genesis, 1, 0);
        service.process_block(chain[0].clone()).await.unwrap();

        assert_eq!(service.subscriber_count(), 1);
        assert_eq!(drain(&mut kept_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_applied_after_stop() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;
        let chain = build_chain(&h.genesis, 2, 0);
        service.process_block(chain[0].clone()).await.unwrap();

        service.stop().await;
        service.queue_block(chain[1].clone());

        assert_eq!(service.tip().height, 1);
        assert_eq!(
            h.storage.batch_count(),
            3,
            "genesis seed, genesis timestamp, one block"
        );
        assert_eq!(service.subscriber_count(), 0);
        assert!(matches!(
            service.process_block(chain[1].clone()).await,
            Err(BlockServiceError::QueueClosed)
        ));
    }
}
