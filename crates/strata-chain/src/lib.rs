//! Causal chains and conflict detection.
//!
//! Every stored value carries a [`Chain`]: the most recent `(node, tick)`
//! writes that led to it, newest first, with at most one link per node.
//! Comparing two chains tells whether one history contains the other
//! ([`ChainRelation`]); when neither does, a [`ConflictPolicy`] decides.
//!
//! This crate is pure: no I/O, no locking, no errors.

mod chain;
mod policy;

#[cfg(test)]
mod tests;

pub use chain::{Chain, ChainLink, ChainRelation};
pub use policy::{ClientWins, ConflictPolicy, HeadOrder, Origin, RejectDivergent, Resolution};
