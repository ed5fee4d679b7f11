//! Shared test utilities for strata-engine tests.

use bytes::Bytes;
use strata_chain::Chain;
use strata_net::Update;
use strata_types::{NodeId, Path, Tick};

use crate::node::{StrataNode, StrataNodeConfig};

pub fn node_id(n: u8) -> NodeId {
    NodeId::from([n; 32])
}

pub fn config(n: u8) -> StrataNodeConfig {
    StrataNodeConfig {
        node_id: node_id(n),
        ..StrataNodeConfig::default()
    }
}

/// In-memory node with default settings.
pub fn test_node(n: u8) -> StrataNode {
    StrataNode::new(config(n))
}

pub fn path(segments: &[&str]) -> Path {
    Path::from(segments)
}

pub fn val(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

/// A peer update carrying `chain`, whose head must be `(origin, tick)`.
pub fn update(origin: NodeId, tick: Tick, at: &[&str], value: &str, chain: Chain) -> Update {
    Update {
        origin,
        tick,
        tock: tick,
        path: path(at),
        value: Some(val(value)),
        chain,
    }
}
