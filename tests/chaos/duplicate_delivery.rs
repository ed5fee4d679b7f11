//! Chaos test: every message delivered twice.
//!
//! Duplicates must be absorbed: no counter moves twice and replicas still
//! converge to the same entries.

use strata_integration_tests::{CONVERGE_TIMEOUT, TestCluster, path, val};

#[tokio::test]
#[ntest::timeout(30000)]
async fn test_duplicate_delivery_is_idempotent() {
    let c = TestCluster::new(3).await;
    c.broker().set_duplicate(true);

    for k in 0..10 {
        let key = format!("k{k}");
        c.node(k % 3)
            .set_value(&path(&[key.as_str()]), val(&k.to_string()), None)
            .await
            .unwrap();
    }
    // Overwrites of the same key from different nodes.
    for writer in 0..3 {
        c.node(writer)
            .set_value(&path(&["k0"]), val(&format!("w{writer}")), None)
            .await
            .unwrap();
    }

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    for i in 0..3 {
        assert_eq!(c.snapshot(i).await.len(), 10);
        // Node 0 wrote k0, k3, k6, k9 and one overwrite.
        assert_eq!(c.node(i).highest(&c.id(0)).await, 5);
        assert_eq!(c.node(i).highest(&c.id(1)).await, 4);
        assert_eq!(c.node(i).highest(&c.id(2)).await, 4);
    }
    c.shutdown();
}
