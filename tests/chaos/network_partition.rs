//! Chaos test: network partition.
//!
//! Both sides keep accepting writes, including to the same keys. After the
//! partition heals every replica must hold the same entries, with conflicts
//! settled the same way everywhere.

use strata_integration_tests::{CONVERGE_TIMEOUT, TestCluster, path, val};

/// 5-node cluster split 3 vs 2. Disjoint and conflicting writes on both
/// sides, then heal.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(60000)]
async fn test_network_partition_and_heal() {
    let c = TestCluster::new(5).await;

    // --- Phase 1: healthy cluster ---
    for k in 0..5 {
        let key = format!("pre-{k}");
        c.node(k)
            .set_value(&path(&["shared", key.as_str()]), val("pre"), None)
            .await
            .unwrap();
    }
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    // --- Phase 2: partition ---
    c.partition(&[&[0, 1, 2][..], &[3, 4][..]]).await;

    for k in 0..10 {
        let key = format!("a-{k}");
        c.node(k % 3)
            .set_value(&path(&["side-a", key.as_str()]), val("a"), None)
            .await
            .unwrap();
        let key = format!("b-{k}");
        c.node(3 + k % 2)
            .set_value(&path(&["side-b", key.as_str()]), val("b"), None)
            .await
            .unwrap();
    }

    // Conflicting writes to keys both sides already share.
    for k in 0..5 {
        let key = format!("pre-{k}");
        let at = path(&["shared", key.as_str()]);
        c.node(0).set_value(&at, val("from-a"), None).await.unwrap();
        c.node(4).set_value(&at, val("from-b"), None).await.unwrap();
    }

    // Each side sees its own writes but not the other's.
    assert!(
        c.wait_for_value(2, &path(&["side-a", "a-0"]), &val("a"), CONVERGE_TIMEOUT)
            .await
    );
    assert!(c.node(3).get_value(&path(&["side-a", "a-0"])).await.is_err());
    assert!(c.node(0).get_value(&path(&["side-b", "b-0"])).await.is_err());

    // --- Phase 3: heal ---
    c.heal().await;
    assert!(
        c.wait_converged(CONVERGE_TIMEOUT).await,
        "cluster did not converge after healing"
    );

    let snapshot = c.snapshot(0).await;
    assert_eq!(snapshot.len(), 25);
    for k in 0..5 {
        let key = format!("pre-{k}");
        let entry = snapshot
            .iter()
            .find(|e| e.path == path(&["shared", key.as_str()]))
            .unwrap();
        let head = entry.chain.head().unwrap();
        // The later (tick, node) head wins on every replica.
        let expected = if head.node == c.id(0) {
            val("from-a")
        } else {
            assert_eq!(head.node, c.id(4));
            val("from-b")
        };
        assert_eq!(entry.value.as_ref(), Some(&expected));
    }
    c.shutdown();
}

/// A single isolated node keeps writing; it catches up and is caught up with
/// once reconnected.
#[tokio::test]
#[ntest::timeout(60000)]
async fn test_isolated_node_rejoins() {
    let c = TestCluster::new(3).await;
    let ids: Vec<_> = (0..3).map(|i| c.id(i)).collect();

    c.broker().isolate(ids[2], &ids).await;

    c.node(0).set_value(&path(&["x"]), val("0"), None).await.unwrap();
    c.node(2).set_value(&path(&["y"]), val("2"), None).await.unwrap();
    assert!(
        c.wait_for_value(1, &path(&["x"]), &val("0"), CONVERGE_TIMEOUT)
            .await
    );
    assert!(c.node(1).get_value(&path(&["y"])).await.is_err());

    c.heal().await;
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);
    for i in 0..3 {
        assert_eq!(c.snapshot(i).await.len(), 2);
    }
    c.shutdown();
}
