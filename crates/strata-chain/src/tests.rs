//! Tests for chain comparison and conflict policies.

use strata_types::NodeId;

use crate::*;

fn node(name: &str) -> NodeId {
    NodeId::from_name(name)
}

// ---------------------------------------------------------------------------
// extend / truncate
// ---------------------------------------------------------------------------

#[test]
fn test_extend_prepends_and_dedups_node() {
    let a = node("test_0");
    let b = node("test_1");

    let c1 = Chain::new().extend(a, 1, 3);
    assert_eq!(c1.head(), Some(&ChainLink::new(a, 1)));

    let c2 = c1.extend(b, 2, 3);
    assert_eq!(c2.links(), &[ChainLink::new(b, 2), ChainLink::new(a, 1)]);

    // Rewriting by `a` drops its older link.
    let c3 = c2.extend(a, 3, 3);
    assert_eq!(c3.links(), &[ChainLink::new(a, 3), ChainLink::new(b, 2)]);
}

#[test]
fn test_extend_truncates_to_depth() {
    let mut chain = Chain::new();
    for (i, name) in ["n0", "n1", "n2", "n3", "n4"].iter().enumerate() {
        chain = chain.extend(node(name), i as u64 + 1, 3);
        assert!(chain.len() <= 3);
    }
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.head(), Some(&ChainLink::new(node("n4"), 5)));
    assert_eq!(chain.tick_of(&node("n2")), Some(3));
    assert_eq!(chain.tick_of(&node("n1")), None);
}

#[test]
fn test_extend_depth_zero_keeps_head() {
    let chain = Chain::single(node("a"), 1).extend(node("b"), 1, 0);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.head().map(|l| l.node), Some(node("b")));
}

#[test]
fn test_truncated() {
    let chain = Chain::new()
        .extend(node("a"), 1, 5)
        .extend(node("b"), 1, 5)
        .extend(node("c"), 1, 5);
    assert_eq!(chain.truncated(0), Chain::new());
    assert_eq!(chain.truncated(1).links(), &[ChainLink::new(node("c"), 1)]);
    assert_eq!(chain.truncated(10), chain);
}

#[test]
fn test_from_links_drops_repeated_nodes() {
    let a = node("a");
    let chain = Chain::from_links([ChainLink::new(a, 5), ChainLink::new(a, 2)]);
    assert_eq!(chain.links(), &[ChainLink::new(a, 5)]);
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

#[test]
fn test_compare_equal() {
    assert_eq!(Chain::new().compare(&Chain::new()), ChainRelation::Equal);
    let c = Chain::single(node("a"), 4);
    assert_eq!(c.compare(&c.clone()), ChainRelation::Equal);
}

#[test]
fn test_compare_empty_is_ancestor() {
    let c = Chain::single(node("a"), 1);
    assert_eq!(Chain::new().compare(&c), ChainRelation::Ancestor);
    assert_eq!(c.compare(&Chain::new()), ChainRelation::Descendant);
}

#[test]
fn test_compare_ancestor_and_descendant() {
    let a = node("a");
    let b = node("b");
    let old = Chain::single(a, 1);
    let new = old.extend(b, 1, 4);

    assert_eq!(old.compare(&new), ChainRelation::Ancestor);
    assert_eq!(new.compare(&old), ChainRelation::Descendant);

    // Same node, later tick: the later chain contains the earlier head.
    let newer = Chain::single(a, 7);
    assert_eq!(old.compare(&newer), ChainRelation::Ancestor);
}

#[test]
fn test_compare_divergent() {
    let base = Chain::single(node("a"), 1);
    let left = base.extend(node("b"), 1, 4);
    let right = base.extend(node("c"), 1, 4);
    assert_eq!(left.compare(&right), ChainRelation::Divergent);
    assert_eq!(right.compare(&left), ChainRelation::Divergent);
}

#[test]
fn test_display() {
    let c = Chain::from_links([ChainLink::new(NodeId::from([1; 32]), 2)]);
    assert_eq!(c.to_string(), "01010101:2");
    assert_eq!(Chain::new().to_string(), "-");
}

#[test]
fn test_chain_roundtrip_postcard() {
    let c = Chain::single(node("a"), 3).extend(node("b"), 9, 4);
    let bytes = postcard::to_allocvec(&c).unwrap();
    let decoded: Chain = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, c);
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[test]
fn test_head_order_client_must_match_head() {
    let stored = Chain::single(node("a"), 1);
    let incoming = Chain::single(node("b"), 10);
    assert_eq!(
        HeadOrder.resolve(Origin::Client, &stored, &incoming),
        Resolution::Reject
    );
}

#[test]
fn test_client_wins_accepts_client_divergence() {
    let stored = Chain::single(node("a"), 10);
    let incoming = Chain::single(node("b"), 1);
    assert_eq!(
        ClientWins.resolve(Origin::Client, &stored, &incoming),
        Resolution::Accept
    );
    // Peers still follow head order.
    assert_eq!(
        ClientWins.resolve(Origin::Peer, &stored, &incoming),
        Resolution::Reject
    );
}

#[test]
fn test_head_order_peer_is_symmetric() {
    let x = Chain::single(node("a"), 3);
    let y = Chain::single(node("b"), 3);

    let x_over_y = HeadOrder.resolve(Origin::Peer, &y, &x);
    let y_over_x = HeadOrder.resolve(Origin::Peer, &x, &y);

    // Exactly one direction wins, so both replicas end on the same head.
    assert_ne!(x_over_y, y_over_x);
}

#[test]
fn test_head_order_peer_prefers_higher_tick() {
    let stored = Chain::single(node("a"), 2);
    let incoming = Chain::single(node("b"), 5);
    assert_eq!(
        HeadOrder.resolve(Origin::Peer, &stored, &incoming),
        Resolution::Accept
    );
    assert_eq!(
        HeadOrder.resolve(Origin::Peer, &incoming, &stored),
        Resolution::Reject
    );
}

#[test]
fn test_reject_divergent() {
    let stored = Chain::single(node("a"), 1);
    let incoming = Chain::single(node("b"), 9);
    assert_eq!(
        RejectDivergent.resolve(Origin::Client, &stored, &incoming),
        Resolution::Reject
    );
    assert_eq!(
        RejectDivergent.resolve(Origin::Peer, &stored, &incoming),
        Resolution::Reject
    );
}
