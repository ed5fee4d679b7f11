//! Change subscriptions.

use std::time::Duration;

use strata_chain::Chain;
use strata_types::Path;

use super::helpers::*;
use crate::node::StrataNode;
use crate::stream::{WatchEvent, WatchOptions, WatchStream};

/// Next event, which must carry an entry, as `(path, value)`.
async fn next_item(watch: &mut WatchStream) -> (Path, Option<String>) {
    match watch.next().await.unwrap() {
        WatchEvent::Item(item) => {
            let value = item.value.map(|v| String::from_utf8(v.to_vec()).unwrap());
            (item.path, value)
        }
        other => panic!("expected an item, got {other:?}"),
    }
}

fn fetch() -> WatchOptions {
    WatchOptions {
        fetch: true,
        ..WatchOptions::default()
    }
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_watch_fetches_then_follows_subtree() {
    let node = test_node(1);
    for at in [&["a"][..], &["a", "x"][..], &["b"][..]] {
        node.set_value(&path(at), val("old"), None).await.unwrap();
    }

    let mut watch = node.watch(path(&["a"]), fetch());
    assert_eq!(next_item(&mut watch).await, (path(&["a"]), Some("old".into())));
    assert_eq!(next_item(&mut watch).await, (path(&["a", "x"]), Some("old".into())));
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    node.set_value(&path(&["b"]), val("outside"), None).await.unwrap();
    node.set_value(&path(&["a", "y"]), val("new"), None).await.unwrap();
    node.delete_value(&path(&["a", "x"]), None).await.unwrap();

    assert_eq!(next_item(&mut watch).await, (path(&["a", "y"]), Some("new".into())));
    assert_eq!(next_item(&mut watch).await, (path(&["a", "x"]), None));
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_watch_without_fetch_starts_up_to_date() {
    let node = test_node(1);
    node.set_value(&path(&["k"]), val("before"), None).await.unwrap();

    let mut watch = node.watch(Path::root(), WatchOptions::default());
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    let written = node.set_value(&path(&["k"]), val("after"), None).await.unwrap();
    match watch.next().await.unwrap() {
        WatchEvent::Item(item) => {
            assert_eq!(item.path, path(&["k"]));
            assert_eq!(item.depth, 1);
            assert_eq!(item.value, Some(val("after")));
            assert_eq!(item.chain, written.chain);
            assert_eq!(item.tock, written.tock);
        }
        other => panic!("expected an item, got {other:?}"),
    }
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_watch_respects_max_depth() {
    let node = test_node(1);
    let mut watch = node.watch(
        path(&["a"]),
        WatchOptions {
            max_depth: Some(1),
            fetch: false,
        },
    );
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    node.set_value(&path(&["a", "x", "deep"]), val("1"), None).await.unwrap();
    node.set_value(&path(&["a", "x"]), val("2"), None).await.unwrap();

    assert_eq!(next_item(&mut watch).await, (path(&["a", "x"]), Some("2".into())));
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_watch_sees_replicated_updates() {
    let node = test_node(1);
    let mut watch = node.watch(Path::root(), WatchOptions::default());
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    let u = update(node_id(2), 1, &["remote"], "v", Chain::single(node_id(2), 1));
    node.apply_update(u).await.unwrap();

    assert_eq!(next_item(&mut watch).await, (path(&["remote"]), Some("v".into())));
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_slow_watcher_is_told_it_lagged() {
    let mut cfg = config(1);
    cfg.watch_buffer = 1;
    cfg.stream_buffer = 1;
    let node = StrataNode::new(cfg);
    let mut watch = node.watch(Path::root(), WatchOptions::default());

    for i in 0..5 {
        node.set_value(&path(&["k"]), val(&format!("v{i}")), None)
            .await
            .unwrap();
    }

    let mut lagged = false;
    loop {
        match watch.next().await.unwrap() {
            WatchEvent::Lagged { skipped } => {
                assert!(skipped > 0);
                lagged = true;
            }
            WatchEvent::Item(item) if item.value == Some(val("v4")) => break,
            _ => {}
        }
    }
    assert!(lagged);
}

#[tokio::test]
#[ntest::timeout(5000)]
async fn test_dropping_watch_stops_producer() {
    let node = test_node(1);
    let mut watch = node.watch(Path::root(), WatchOptions::default());
    assert_eq!(watch.next().await, Some(WatchEvent::UpToDate));

    let producer = watch.take_producer().unwrap();
    drop(watch);

    tokio::time::timeout(Duration::from_secs(1), producer)
        .await
        .expect("watch producer kept running after the stream was dropped")
        .unwrap();
}
