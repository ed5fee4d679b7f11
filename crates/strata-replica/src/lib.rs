//! Replication for Strata.
//!
//! This crate provides:
//!
//! - [`ReplicaStore`]: what the replicator needs from a store; implemented by
//!   the engine so this crate does not depend on it.
//! - [`Broadcaster`]: publishes updates and logs transport failures.
//! - [`reconcile`]: answers a peer summary from the local node registry.
//! - [`Replicator`]: the receive loop and the anti-entropy timer.

pub mod broadcaster;
pub mod error;
pub mod reconcile;
pub mod replicator;
pub mod store;

pub use broadcaster::Broadcaster;
pub use error::ReplicaError;
pub use reconcile::{present_by_origin, reconcile};
pub use replicator::{ReplicaConfig, ReplicaTasks, Replicator};
pub use store::{ApplyOutcome, ReplicaStore};
