//! [`Dispatcher`]: maps client actions onto a [`StrataNode`].

use std::fmt;
use std::sync::Arc;

use strata_sync::StateReport;
use strata_tree::{CompactStats, WalkOptions};
use strata_types::{Path, PathLongener, PathShortener};
use tracing::debug;

use crate::action::{
    Action, Locator, Request, TreeItem, TreeRecord, ValueRecord, WriteRecord, reply_chain,
};
use crate::codec::{Identity, ValueCodec};
use crate::error::StoreError;
use crate::gate::{Access, AccessGate, AccessMode, AllowAll};
use crate::node::{StrataNode, Written};
use crate::stream::{TreeStream, WatchEvent, WatchOptions, WatchStream};

type Result<T> = std::result::Result<T, StoreError>;

/// Successful outcome of an action.
#[derive(Debug)]
pub enum Reply {
    Value(ValueRecord),
    Written(WriteRecord),
    Tree(TreeItems),
    Records(Vec<TreeRecord>),
    State(StateReport),
    Compacted(CompactStats),
    Watch(WatchItems),
}

/// Streamed `get_tree` reply: decoded values and prefix-compressed paths.
pub struct TreeItems {
    stream: TreeStream,
    shortener: PathShortener,
    codec: Arc<dyn ValueCodec>,
    nchain: usize,
}

impl fmt::Debug for TreeItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeItems")
            .field("nchain", &self.nchain)
            .finish_non_exhaustive()
    }
}

impl TreeItems {
    /// Next record, `None` once the walk is complete.
    pub async fn next(&mut self) -> Option<Result<TreeItem>> {
        let item = self.stream.next().await?;
        let value = match item.value {
            Some(stored) => match self.codec.decode(stored) {
                Ok(v) => Some(v),
                Err(e) => return Some(Err(e.into())),
            },
            None => None,
        };
        let (depth, suffix) = self.shortener.shorten(&item.path);
        Some(Ok(TreeItem {
            depth,
            suffix,
            value,
            chain: reply_chain(&item.chain, self.nchain),
            tock: item.tock,
        }))
    }

    /// Drain the stream into records with full paths.
    pub async fn collect(mut self) -> Result<Vec<TreeRecord>> {
        let mut longener = PathLongener::new();
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            let item = item?;
            let path = longener
                .lengthen(item.depth, &item.suffix)
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            out.push(TreeRecord {
                path,
                value: item.value,
                chain: item.chain,
                tock: item.tock,
            });
        }
        Ok(out)
    }
}

/// One event of a watch reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchRecord {
    Item(TreeItem),
    UpToDate,
    Lagged { skipped: u64 },
}

/// Streamed `watch` reply, encoded like [`TreeItems`].
pub struct WatchItems {
    stream: WatchStream,
    shortener: PathShortener,
    codec: Arc<dyn ValueCodec>,
    nchain: usize,
}

impl fmt::Debug for WatchItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchItems")
            .field("nchain", &self.nchain)
            .finish_non_exhaustive()
    }
}

impl WatchItems {
    /// Next event, `None` once the node is gone.
    pub async fn next(&mut self) -> Option<Result<WatchRecord>> {
        let item = match self.stream.next().await? {
            WatchEvent::Item(item) => item,
            WatchEvent::UpToDate => return Some(Ok(WatchRecord::UpToDate)),
            WatchEvent::Lagged { skipped } => {
                return Some(Ok(WatchRecord::Lagged { skipped }));
            }
        };
        let value = match item.value {
            Some(stored) => match self.codec.decode(stored) {
                Ok(v) => Some(v),
                Err(e) => return Some(Err(e.into())),
            },
            None => None,
        };
        let (depth, suffix) = self.shortener.shorten(&item.path);
        Some(Ok(WatchRecord::Item(TreeItem {
            depth,
            suffix,
            value,
            chain: reply_chain(&item.chain, self.nchain),
            tock: item.tock,
        })))
    }
}

/// Entry point for client adapters.
///
/// Every action passes the [`AccessGate`] before touching state; values cross
/// the [`ValueCodec`] on the way in and out.
pub struct Dispatcher {
    node: Arc<StrataNode>,
    gate: Arc<dyn AccessGate>,
    codec: Arc<dyn ValueCodec>,
}

impl Dispatcher {
    /// Dispatcher with [`AllowAll`] and the [`Identity`] codec.
    pub fn new(node: Arc<StrataNode>) -> Self {
        Self {
            node,
            gate: Arc::new(AllowAll),
            codec: Arc::new(Identity),
        }
    }

    /// Set the access gate.
    pub fn with_gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Set the value codec.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// The node behind this dispatcher.
    pub fn node(&self) -> &Arc<StrataNode> {
        &self.node
    }

    /// Handle a decoded request.
    pub async fn handle_request(&self, request: Request) -> Result<Reply> {
        self.handle(request.principal.as_deref(), request.action)
            .await
    }

    /// Handle one action on behalf of `principal`.
    pub async fn handle(&self, principal: Option<&str>, action: Action) -> Result<Reply> {
        debug!(action = action.name(), principal, "dispatching");

        match action {
            Action::GetValue { at, nchain } => self.get_value(principal, at, nchain).await,
            Action::SetValue {
                path,
                value,
                chain,
                nchain,
            } => {
                self.authorize(principal, &path, AccessMode::Write)?;
                let value = self.codec.encode(value)?;
                let written = self.node.set_value(&path, value, chain.as_ref()).await?;
                Ok(Reply::Written(self.write_record(written, nchain)?))
            }
            Action::DeleteValue {
                path,
                chain,
                nchain,
            } => {
                self.authorize(principal, &path, AccessMode::Write)?;
                let written = self.node.delete_value(&path, chain.as_ref()).await?;
                Ok(Reply::Written(self.write_record(written, nchain)?))
            }
            Action::GetTree {
                path,
                max_depth,
                min_depth,
                add_empty,
                nchain,
                iter,
            } => {
                self.authorize(principal, &path, AccessMode::Read)?;
                let opts = WalkOptions {
                    max_depth,
                    min_depth: min_depth.unwrap_or(0),
                    add_empty,
                };
                let items = TreeItems {
                    stream: self.node.get_tree(path, opts),
                    shortener: PathShortener::new(),
                    codec: self.codec.clone(),
                    nchain,
                };
                if iter {
                    Ok(Reply::Tree(items))
                } else {
                    Ok(Reply::Records(items.collect().await?))
                }
            }
            Action::GetState { select } => {
                self.authorize(principal, &Path::root(), AccessMode::Read)?;
                Ok(Reply::State(self.node.get_state(select).await))
            }
            Action::Compact => {
                self.authorize(principal, &Path::root(), AccessMode::Write)?;
                Ok(Reply::Compacted(self.node.compact().await?))
            }
            Action::Watch {
                path,
                max_depth,
                fetch,
                nchain,
            } => {
                self.authorize(principal, &path, AccessMode::Read)?;
                let opts = WatchOptions { max_depth, fetch };
                Ok(Reply::Watch(WatchItems {
                    stream: self.node.watch(path, opts),
                    shortener: PathShortener::new(),
                    codec: self.codec.clone(),
                    nchain,
                }))
            }
        }
    }

    async fn get_value(
        &self,
        principal: Option<&str>,
        at: Locator,
        nchain: usize,
    ) -> Result<Reply> {
        let (path, data) = match at {
            Locator::Path(path) => {
                self.authorize(principal, &path, AccessMode::Read)?;
                let data = self.node.get_value(&path).await?;
                (path, data)
            }
            Locator::Version { node, tick } => {
                // The path is only known after the lookup; without read
                // access to the root, found and missing versions both deny.
                self.authorize(principal, &Path::root(), AccessMode::Read)?;
                let version = self.node.get_value_at(&node, tick).await?;
                self.authorize(principal, &version.path, AccessMode::Read)?;
                (version.path, version.data)
            }
        };

        let stored = data
            .value
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(Reply::Value(ValueRecord {
            value: self.codec.decode(stored)?,
            chain: reply_chain(&data.chain, nchain),
            tock: data.tock,
            path,
        }))
    }

    fn write_record(&self, written: Written, nchain: usize) -> Result<WriteRecord> {
        let previous = match written.previous {
            Some(stored) => Some(self.codec.decode(stored)?),
            None => None,
        };
        Ok(WriteRecord {
            previous,
            chain: reply_chain(&written.chain, nchain),
            tick: written.tick,
            tock: written.tock,
        })
    }

    fn authorize(&self, principal: Option<&str>, path: &Path, mode: AccessMode) -> Result<()> {
        match self.gate.check(principal, path, mode) {
            Access::Allow => Ok(()),
            Access::Deny => {
                debug!(principal, %path, ?mode, "access denied");
                Err(StoreError::PermissionDenied {
                    path: path.clone(),
                    mode,
                })
            }
        }
    }
}
