//! # Reorganization Flows
//!
//! Fork resolution as seen from outside the service:
//!
//! 1. **Header-driven**: the header index switches branch, `on_headers`
//!    rewinds the tip and the sync driver fetches the new branch
//! 2. **Push-driven**: a peer pushes a block extending a stored ancestor
//! 3. **Stale headers**: a competing block the header index does not know
//!    about is dropped

#[cfg(test)]
mod tests {
    use crate::init_test_tracing;
    use qc_02_block_ingestion::test_utils::{build_chain, TestHarness};
    use qc_02_block_ingestion::{
        Block, BlockArg, BlockOutcome, BlockQueryApi, ChainTip, Hash, StorageEngine, TimestampIndex,
    };
    use std::time::Duration;

    async fn wait_for_tip(service: &qc_02_block_ingestion::BlockService, expected: ChainTip) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while service.tip() != expected {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("tip not reached");
    }

    fn concat(parts: &[&[Block]]) -> Vec<Block> {
        parts.concat()
    }

    async fn is_stored(service: &qc_02_block_ingestion::BlockService, hash: Hash) -> bool {
        service
            .get_block(BlockArg::Hash(hash))
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_header_switch_moves_tip_to_new_branch() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let a = build_chain(&h.genesis, 8, 0);
        h.headers.set_chain(&h.with_genesis(&a));
        h.peers.add_blocks(&a);
        service.on_headers().await.unwrap();
        assert_eq!(service.tip(), ChainTip::new(a[7].hash(), 8));

        // Branch b forks after a3 and overtakes a
        let b = build_chain(&a[2], 7, 1);
        h.headers.set_chain(&h.with_genesis(&concat(&[&a[..3], &b[..]])));
        h.peers.add_blocks(&b);
        service.on_headers().await.unwrap();

        assert_eq!(service.tip(), ChainTip::new(b[6].hash(), 10));
        for block in &a[3..] {
            assert!(!is_stored(&service, block.hash()).await);
            assert_eq!(h.timestamps.get_timestamp(&block.hash()).await.unwrap(), None);
        }
        for block in a[..3].iter().chain(&b) {
            assert!(is_stored(&service, block.hash()).await);
        }
        assert!(!h.node.is_stopping());
    }

    #[tokio::test]
    async fn test_pushed_fork_block_reorganizes() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let a = build_chain(&h.genesis, 5, 0);
        h.headers.set_chain(&h.with_genesis(&a));
        h.peers.add_blocks(&a);
        service.on_headers().await.unwrap();
        assert!(service.is_synced());

        let b = build_chain(&a[2], 3, 1);
        h.headers.set_chain(&h.with_genesis(&concat(&[&a[..3], &b[..]])));

        h.peers.announce_block(b[0].clone());
        wait_for_tip(&service, ChainTip::new(b[0].hash(), 4)).await;

        h.peers.announce_block(b[1].clone());
        h.peers.announce_block(b[2].clone());
        wait_for_tip(&service, ChainTip::new(b[2].hash(), 6)).await;

        assert!(!is_stored(&service, a[3].hash()).await);
        assert!(!is_stored(&service, a[4].hash()).await);
        assert_eq!(
            h.storage.get_service_tip("block").await.unwrap(),
            Some(ChainTip::new(b[2].hash(), 6))
        );
    }

    #[tokio::test]
    async fn test_competing_block_unknown_to_headers_is_dropped() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let a = build_chain(&h.genesis, 3, 0);
        h.headers.set_chain(&h.with_genesis(&a));
        for block in &a {
            service.process_block(block.clone()).await.unwrap();
        }

        let competing = build_chain(&a[1], 1, 1).remove(0);
        let outcome = service.process_block(competing.clone()).await.unwrap();

        assert_eq!(
            outcome,
            BlockOutcome::Orphaned {
                hash: competing.hash()
            }
        );
        assert_eq!(service.tip(), ChainTip::new(a[2].hash(), 3));
        assert!(!is_stored(&service, competing.hash()).await);
    }

    #[tokio::test]
    async fn test_reorg_to_genesis() {
        init_test_tracing();
        let h = TestHarness::new().await;
        let service = h.start().await;

        let a = build_chain(&h.genesis, 4, 0);
        for block in &a {
            service.process_block(block.clone()).await.unwrap();
        }

        let b = build_chain(&h.genesis, 1, 1);
        h.headers.set_chain(&h.with_genesis(&b));
        let outcome = service.process_block(b[0].clone()).await.unwrap();

        assert_eq!(
            outcome,
            BlockOutcome::Accepted {
                tip: ChainTip::new(b[0].hash(), 1),
                unwound: 4,
            }
        );
        assert!(is_stored(&service, h.genesis.hash()).await);
    }
}
