//! Entry payloads and walk records.

use serde::{Deserialize, Serialize};
use strata_chain::{Chain, ChainLink};
use strata_types::{Path, Tock, Value};

/// Stable index of a slot in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) usize);

/// What an entry currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    /// Current value, `None` for a tombstone.
    pub value: Option<Value>,
    /// Causal history, newest first. Never empty for a stored entry.
    pub chain: Chain,
    /// Store-wide sequence number of the last change.
    pub tock: Tock,
}

impl EntryData {
    /// A live value.
    pub fn live(value: Value, chain: Chain, tock: Tock) -> Self {
        Self {
            value: Some(value),
            chain,
            tock,
        }
    }

    /// A deletion marker.
    pub fn tombstone(chain: Chain, tock: Tock) -> Self {
        Self {
            value: None,
            chain,
            tock,
        }
    }

    /// Whether this entry was deleted.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// The write that produced this data.
    pub fn head(&self) -> Option<&ChainLink> {
        self.chain.head()
    }
}

/// A version addressed by `(node, tick)`, current or historic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Entry the version belongs to.
    pub path: Path,
    /// The data as written.
    pub data: EntryData,
    /// `true` while this version is still the entry's current value.
    pub current: bool,
}

/// One record produced by a tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkItem {
    /// Full path of the entry.
    pub path: Path,
    /// Depth relative to the walk root.
    pub depth: usize,
    /// Value, `None` for tombstones and empty interior nodes.
    pub value: Option<Value>,
    /// Chain, empty for interior nodes that never held data.
    pub chain: Chain,
    /// Tock of the last change, 0 for interior nodes.
    pub tock: Tock,
}

/// Controls which entries a walk yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Deepest relative depth to descend to; `None` is unlimited.
    pub max_depth: Option<usize>,
    /// Shallowest relative depth to report.
    pub min_depth: usize,
    /// Also report tombstones and interior nodes without data.
    pub add_empty: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_depth: 0,
            add_empty: false,
        }
    }
}

impl WalkOptions {
    pub(crate) fn descends_to(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth <= max)
    }
}

/// What a [`compact`](crate::EntryTree::compact) pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    /// Superseded versions dropped from the history map.
    pub history_dropped: usize,
    /// Tombstones removed.
    pub tombstones_dropped: usize,
    /// Arena slots returned to the free list.
    pub slots_freed: usize,
}
