//! Client request and reply shapes.
//!
//! Both travel as postcard frames; enums are externally tagged with
//! snake_case variant names.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_chain::Chain;
use strata_sync::{ReportSelect, StateReport};
use strata_types::{NodeId, Path, Tick, Tock};

use crate::error::ErrorKind;

/// Where `get_value` looks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// The current value at a path.
    Path(Path),
    /// The version written as `(node, tick)`.
    Version { node: NodeId, tick: Tick },
}

/// Operations a client can request.
///
/// `nchain` limits how many chain links a reply carries; `0` leaves the chain
/// out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    GetValue {
        at: Locator,
        nchain: usize,
    },
    SetValue {
        path: Path,
        value: Bytes,
        /// Chain the client last read; `None` writes unconditionally.
        chain: Option<Chain>,
        nchain: usize,
    },
    DeleteValue {
        path: Path,
        chain: Option<Chain>,
        nchain: usize,
    },
    GetTree {
        path: Path,
        max_depth: Option<usize>,
        min_depth: Option<usize>,
        /// Include tombstones.
        add_empty: bool,
        nchain: usize,
        /// Stream records one by one instead of collecting them.
        iter: bool,
    },
    GetState {
        select: ReportSelect,
    },
    Compact,
    /// Follow changes under `path` until the client hangs up.
    Watch {
        path: Path,
        max_depth: Option<usize>,
        /// Send the current subtree first, then [`Frame::UpToDate`].
        fetch: bool,
        nchain: usize,
    },
}

impl Action {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetValue { .. } => "get_value",
            Self::SetValue { .. } => "set_value",
            Self::DeleteValue { .. } => "delete_value",
            Self::GetTree { .. } => "get_tree",
            Self::GetState { .. } => "get_state",
            Self::Compact => "compact",
            Self::Watch { .. } => "watch",
        }
    }
}

/// One client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Identity handed to the access gate.
    pub principal: Option<String>,
    pub action: Action,
}

/// Reply to `get_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub path: Path,
    pub value: Bytes,
    pub chain: Option<Chain>,
    pub tock: Tock,
}

/// Reply to `set_value` and `delete_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRecord {
    /// Value held before the write.
    pub previous: Option<Bytes>,
    pub chain: Option<Chain>,
    pub tick: Tick,
    pub tock: Tock,
}

/// One streamed `get_tree` record.
///
/// `depth` segments are shared with the previous record of the same stream;
/// `suffix` holds the rest. Rebuild full paths with
/// [`PathLongener`](strata_types::PathLongener).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub depth: usize,
    pub suffix: Vec<String>,
    /// `None` for a tombstone.
    pub value: Option<Bytes>,
    pub chain: Option<Chain>,
    pub tock: Tock,
}

/// A collected `get_tree` record with its full path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub path: Path,
    pub value: Option<Bytes>,
    pub chain: Option<Chain>,
    pub tock: Tock,
}

/// Unit of the client wire protocol. Every reply ends with [`Frame::Done`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    Value(ValueRecord),
    Written(WriteRecord),
    Item(TreeItem),
    Records(Vec<TreeRecord>),
    State(StateReport),
    Compacted {
        history_dropped: usize,
        tombstones_dropped: usize,
    },
    /// A watch has sent the current subtree; live changes follow.
    UpToDate,
    /// A watch fell behind and lost `skipped` changes.
    Lagged {
        skipped: u64,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Done,
}

/// Chain as a reply carries it.
pub(crate) fn reply_chain(chain: &Chain, nchain: usize) -> Option<Chain> {
    (nchain > 0).then(|| chain.truncated(nchain))
}
