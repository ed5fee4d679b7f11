//! The Entry Tree: every path the store knows about, with its current value,
//! causal chain and tock.
//!
//! Slots live in an arena addressed by [`EntryId`]; children are kept sorted by
//! segment so enumeration is a deterministic pre-order walk. A head index maps
//! each live `(node, tick)` to the entry it produced, and, when retention is
//! enabled, superseded versions stay reachable by `(node, tick)` until
//! [`EntryTree::compact`] runs.
//!
//! Enumeration is resumable ([`EntryTree::walk_after`]) so a producer can drop
//! its lock between batches.

mod entry;
mod error;
mod tree;
mod walk;

#[cfg(test)]
mod tests;

pub use entry::{CompactStats, EntryData, EntryId, Version, WalkItem, WalkOptions};
pub use error::TreeError;
pub use tree::EntryTree;
