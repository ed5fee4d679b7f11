//! Persistence layer wrapping Fjall.
//!
//! [`MetaStore`] keeps two keyspaces:
//!
//! - `entries`: [`Path`](strata_types::Path) → [`EntryRecord`] (value or
//!   tombstone, chain, tock)
//! - `nodes`: [`NodeId`](strata_types::NodeId) → [`NodeRecord`] (highest
//!   tick seen from that origin and the store tock at the time)
//!
//! The in-memory tree is rebuilt from `entries` on startup; superseded
//! history is not persisted.

mod error;
mod store;

pub use error::MetaError;
pub use store::{EntryRecord, MetaStore, NodeRecord};
