//! Integration test: a node that joins after the writes catches up through
//! anti-entropy alone.

use strata_integration_tests::{CONVERGE_TIMEOUT, TestCluster, path, val};

#[tokio::test]
#[ntest::timeout(30000)]
async fn test_late_joiner_catches_up() {
    let mut c = TestCluster::new(2).await;

    for k in 0..10 {
        let key = format!("item-{k}");
        c.node(k % 2)
            .set_value(&path(&["items", key.as_str()]), val(&k.to_string()), None)
            .await
            .unwrap();
    }
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    // The new member missed every update broadcast.
    let late = c.add_node().await;

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await, "late joiner did not catch up");
    assert_eq!(c.snapshot(late).await.len(), 10);
    assert_eq!(c.node(late).highest(&c.id(0)).await, 5);
    assert_eq!(c.node(late).highest(&c.id(1)).await, 5);
    c.shutdown();
}

/// Overwritten versions are not resent; the joiner learns their ticks as
/// superseded and still ends without gaps.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_late_joiner_skips_overwritten_versions() {
    let mut c = TestCluster::new(1).await;
    let at = path(&["hot"]);

    for round in 0..8 {
        c.node(0)
            .set_value(&at, val(&format!("v{round}")), None)
            .await
            .unwrap();
    }

    let late = c.add_node().await;
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    let data = c.node(late).get_value(&at).await.unwrap();
    assert_eq!(data.value, Some(val("v7")));
    assert_eq!(c.node(late).highest(&c.id(0)).await, 8);
    assert!(c.has_no_gaps(late).await);
    c.shutdown();
}
