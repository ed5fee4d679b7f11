//! Chaos test: node restart.
//!
//! A stopped node keeps its state on disk. After a restart it restores its
//! counters, keeps numbering its own writes where it left off and fetches
//! what it missed while down.

use strata_integration_tests::{CONVERGE_TIMEOUT, TestCluster, path, val};

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_restarted_node_catches_up() {
    let mut c = TestCluster::new(3).await;

    for k in 0..3 {
        let key = format!("before-{k}");
        c.node(2)
            .set_value(&path(&[key.as_str()]), val("x"), None)
            .await
            .unwrap();
    }
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    c.kill(2);
    for k in 0..6 {
        let key = format!("during-{k}");
        c.node(k % 2)
            .set_value(&path(&[key.as_str()]), val("y"), None)
            .await
            .unwrap();
    }
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    c.restart(2).await;
    assert_eq!(c.node(2).highest(&c.id(2)).await, 3);

    // Ticks continue after the restored high-water mark.
    let written = c
        .node(2)
        .set_value(&path(&["after"]), val("z"), None)
        .await
        .unwrap();
    assert_eq!(written.tick, 4);

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await, "restarted node did not catch up");
    assert_eq!(c.snapshot(2).await.len(), 10);
    c.shutdown();
}

/// Repeated restarts while the rest of the cluster writes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(60000)]
async fn test_rolling_restarts() {
    let mut c = TestCluster::new(4).await;

    for round in 0..4 {
        let victim = round % 4;
        c.kill(victim);
        for k in 0..5 {
            let writer = (victim + 1 + k % 3) % 4;
            let key = format!("r{round}-{k}");
            c.node(writer)
                .set_value(&path(&["rolling", key.as_str()]), val(&round.to_string()), None)
                .await
                .unwrap();
        }
        c.restart(victim).await;
    }

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);
    for i in 0..4 {
        assert_eq!(c.snapshot(i).await.len(), 20);
    }
    c.shutdown();
}
