//! Tests for the entry tree.


use bytes::Bytes;
use strata_chain::Chain;
use strata_types::{NodeId, Path};

use crate::entry::EntryData;

fn node(n: u8) -> NodeId {
    NodeId::from([n; 32])
}

fn path(segments: &[&str]) -> Path {
    Path::from(segments)
}

/// Live entry written by node `n` at `tick`.
fn live(n: u8, tick: u64, value: &str, tock: u64) -> EntryData {
    EntryData::live(
        Bytes::from(value.to_string()),
        Chain::single(node(n), tick),
        tock,
    )
}
