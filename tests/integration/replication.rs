//! Integration test: writes spread to every replica.

use strata_chain::ChainLink;
use strata_engine::{WatchEvent, WatchOptions};
use strata_integration_tests::{CONVERGE_TIMEOUT, TestCluster, path, val};

/// A write on one node becomes readable on all others.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_write_reaches_every_replica() {
    let c = TestCluster::new(3).await;

    let written = c
        .node(0)
        .set_value(&path(&["config", "mode"]), val("fast"), None)
        .await
        .unwrap();
    assert_eq!(written.tick, 1);

    for i in 1..3 {
        assert!(
            c.wait_for_value(i, &path(&["config", "mode"]), &val("fast"), CONVERGE_TIMEOUT)
                .await,
            "node {i} never received the write"
        );
        let data = c.node(i).get_value(&path(&["config", "mode"])).await.unwrap();
        assert_eq!(data.chain.head(), Some(&ChainLink::new(c.id(0), 1)));
    }

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);
    c.shutdown();
}

/// Each node writes its own keys; all replicas end up with all of them.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_independent_writers_converge() {
    let c = TestCluster::new(4).await;

    for i in 0..4 {
        let dir = format!("n{i}");
        for k in 0..5 {
            let key = format!("k{k}");
            c.node(i)
                .set_value(&path(&[dir.as_str(), key.as_str()]), val(&format!("{i}-{k}")), None)
                .await
                .unwrap();
        }
    }

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await, "cluster did not converge");
    for i in 0..4 {
        assert_eq!(c.snapshot(i).await.len(), 20);
        assert_eq!(c.node(i).highest(&c.id(2)).await, 5);
    }
    c.shutdown();
}

/// Sequential read-modify-write through different nodes extends the chain.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_chain_follows_writers() {
    let c = TestCluster::new(3).await;
    let at = path(&["counter"]);

    let mut expected = None;
    for (round, writer) in [0usize, 1, 2].into_iter().enumerate() {
        if let Some(prev) = &expected {
            assert!(c.wait_for_value(writer, &at, prev, CONVERGE_TIMEOUT).await);
        }
        let current = c.node(writer).get_value(&at).await.ok();
        let chain = current.map(|d| d.chain);
        let value = val(&format!("v{round}"));
        c.node(writer)
            .set_value(&at, value.clone(), chain.as_ref())
            .await
            .unwrap();
        expected = Some(value);
    }

    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);
    let data = c.node(0).get_value(&at).await.unwrap();
    assert_eq!(data.value, Some(val("v2")));
    assert_eq!(
        data.chain.links(),
        &[
            ChainLink::new(c.id(2), 1),
            ChainLink::new(c.id(1), 1),
            ChainLink::new(c.id(0), 1),
        ]
    );
    c.shutdown();
}

/// Deletes replicate as tombstones.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_delete_replicates() {
    let c = TestCluster::new(3).await;
    let at = path(&["tmp"]);

    c.node(0).set_value(&at, val("x"), None).await.unwrap();
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    c.node(1).delete_value(&at, None).await.unwrap();
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    for i in 0..3 {
        assert!(c.node(i).get_value(&at).await.is_err(), "node {i} still has the value");
        let snapshot = c.snapshot(i).await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].value.is_none());
    }
    c.shutdown();
}

/// A replica can look up a version by `(node, tick)` once it has it.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_version_lookup_on_replica() {
    let c = TestCluster::new(2).await;

    let written = c
        .node(0)
        .set_value(&path(&["a"]), val("one"), None)
        .await
        .unwrap();
    assert!(c.wait_converged(CONVERGE_TIMEOUT).await);

    let version = c.node(1).get_value_at(&c.id(0), written.tick).await.unwrap();
    assert_eq!(version.path, path(&["a"]));
    assert_eq!(version.data.value, Some(val("one")));
    c.shutdown();
}

/// A watcher on one replica sees writes made on another.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_watch_follows_remote_writes() {
    let c = TestCluster::new(2).await;
    let mut watch = c.node(1).watch(
        path(&["jobs"]),
        WatchOptions {
            fetch: true,
            ..WatchOptions::default()
        },
    );
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    c.node(0)
        .set_value(&path(&["jobs", "7"]), val("queued"), None)
        .await
        .unwrap();

    match watch.next().await {
        Some(WatchEvent::Item(item)) => {
            assert_eq!(item.path, path(&["jobs", "7"]));
            assert_eq!(item.value, Some(val("queued")));
            assert_eq!(item.chain.head(), Some(&ChainLink::new(c.id(0), 1)));
        }
        other => panic!("expected the replicated write, got {other:?}"),
    }
    c.shutdown();
}
