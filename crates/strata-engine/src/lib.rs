//! Store node tying the Strata components together.
//!
//! The [`StrataNode`] owns the entry tree, the node registry and the tock
//! counter behind one lock, writes committed changes through to the
//! [`MetaStore`](strata_meta::MetaStore) and publishes them to peers.
//!
//! Client adapters talk to the [`Dispatcher`], which checks the
//! [`AccessGate`], applies the [`ValueCodec`] and maps an [`Action`] onto the
//! node's operations.

pub mod action;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod node;
pub mod replica;
pub mod stream;

pub use action::{
    Action, Frame, Locator, Request, TreeItem, TreeRecord, ValueRecord, WriteRecord,
};
pub use codec::{CodecError, Identity, ValueCodec};
pub use dispatch::{Dispatcher, Reply, TreeItems, WatchItems, WatchRecord};
pub use error::{ErrorKind, StoreError};
pub use gate::{Access, AccessGate, AccessMode, AllowAll, ReadOnly};
pub use node::{StrataNode, StrataNodeConfig, Written};
pub use stream::{Change, TreeStream, WatchEvent, WatchOptions, WatchStream};

#[cfg(test)]
mod tests;
