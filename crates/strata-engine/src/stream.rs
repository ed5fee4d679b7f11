//! Batched enumeration and change streams.

use std::sync::Arc;

use strata_chain::Chain;
use strata_tree::{WalkItem, WalkOptions};
use strata_types::{Path, Tock, Value};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::node::Core;

/// Push the subtree under `root` into `tx`, one read-locked batch at a time.
///
/// Returns the number of records sent, or `None` once the receiver is gone.
async fn send_walk<T>(
    core: &RwLock<Core>,
    root: &Path,
    opts: WalkOptions,
    batch: usize,
    tx: &mpsc::Sender<T>,
    wrap: impl Fn(WalkItem) -> T,
) -> Option<usize> {
    let mut after: Option<Path> = None;
    let mut sent = 0usize;

    loop {
        let items = {
            let core = core.read().await;
            core.tree.walk_after(root, after.as_ref(), opts, batch)
        };
        let done = items.len() < batch;

        for item in items {
            after = Some(item.path.clone());
            if tx.send(wrap(item)).await.is_err() {
                debug!(%root, sent, "stream receiver dropped");
                return None;
            }
            sent += 1;
        }

        if done {
            return Some(sent);
        }
    }
}

/// Records of a subtree walk, produced in the background.
///
/// The producer takes the read lock for one batch, releases it, then pushes
/// the batch through a bounded channel, so a slow reader neither blocks
/// writers nor buffers the whole subtree. Dropping the stream stops the
/// producer.
pub struct TreeStream {
    rx: mpsc::Receiver<WalkItem>,
    /// Resolves to the number of records handed to the channel.
    producer: Option<JoinHandle<usize>>,
}

impl TreeStream {
    pub(crate) fn spawn(
        core: Arc<RwLock<Core>>,
        root: Path,
        opts: WalkOptions,
        batch: usize,
        buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(buffer);

        let producer = tokio::spawn(async move {
            match send_walk(&core, &root, opts, batch, &tx, |item| item).await {
                Some(sent) => {
                    trace!(%root, sent, "stream finished");
                    sent
                }
                None => 0,
            }
        });

        Self {
            rx,
            producer: Some(producer),
        }
    }

    /// Detach the producer task so a test can wait for it.
    #[cfg(test)]
    pub(crate) fn take_producer(&mut self) -> Option<JoinHandle<usize>> {
        self.producer.take()
    }

    /// Next record, `None` once the walk is complete.
    pub async fn next(&mut self) -> Option<WalkItem> {
        self.rx.recv().await
    }

    /// Drain the stream.
    pub async fn collect(mut self) -> Vec<WalkItem> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item);
        }
        out
    }
}

impl Drop for TreeStream {
    fn drop(&mut self) {
        if let Some(producer) = &self.producer {
            producer.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

/// A committed change, as seen by watchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: Path,
    /// `None` for a delete.
    pub value: Option<Value>,
    pub chain: Chain,
    pub tock: Tock,
}

/// Which part of the tree a watch follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Deepest depth below the watched path to report; `None` is unlimited.
    pub max_depth: Option<usize>,
    /// Send the current subtree before any change.
    pub fetch: bool,
}

/// One event of a [`WatchStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// An entry: current state while fetching, a committed change after.
    Item(WalkItem),
    /// Everything before this reflects the state when the watch started.
    UpToDate,
    /// The watcher fell behind and `skipped` changes were lost; refetch.
    Lagged { skipped: u64 },
}

/// Changes under a path, optionally preceded by its current contents.
///
/// The subscription is taken before the fetch starts, so no change committed
/// after [`StrataNode::watch`](crate::StrataNode::watch) returns is missed;
/// one committed during the fetch may show up twice. The stream ends only
/// when the node goes away. Dropping it stops the producer.
pub struct WatchStream {
    rx: mpsc::Receiver<WatchEvent>,
    producer: Option<JoinHandle<()>>,
}

impl WatchStream {
    pub(crate) fn spawn(
        core: Arc<RwLock<Core>>,
        mut changes: broadcast::Receiver<Change>,
        root: Path,
        opts: WatchOptions,
        batch: usize,
        buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(buffer);

        let producer = tokio::spawn(async move {
            if opts.fetch {
                let walk = WalkOptions {
                    max_depth: opts.max_depth,
                    ..WalkOptions::default()
                };
                if send_walk(&core, &root, walk, batch, &tx, WatchEvent::Item)
                    .await
                    .is_none()
                {
                    return;
                }
            }
            if tx.send(WatchEvent::UpToDate).await.is_err() {
                return;
            }

            loop {
                let received = tokio::select! {
                    _ = tx.closed() => {
                        debug!(%root, "watch receiver dropped");
                        return;
                    }
                    received = changes.recv() => received,
                };
                let event = match received {
                    Ok(change) => {
                        if !change.path.starts_with(&root) {
                            continue;
                        }
                        let depth = change.path.len() - root.len();
                        if opts.max_depth.is_some_and(|max| depth > max) {
                            continue;
                        }
                        WatchEvent::Item(WalkItem {
                            path: change.path,
                            depth,
                            value: change.value,
                            chain: change.chain,
                            tock: change.tock,
                        })
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%root, skipped = n, "watcher lagged behind committed changes");
                        WatchEvent::Lagged { skipped: n }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(%root, "change channel closed");
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    debug!(%root, "watch receiver dropped");
                    return;
                }
            }
        });

        Self {
            rx,
            producer: Some(producer),
        }
    }

    /// Detach the producer task so a test can wait for it.
    #[cfg(test)]
    pub(crate) fn take_producer(&mut self) -> Option<JoinHandle<()>> {
        self.producer.take()
    }

    /// Next event, `None` once the node is gone.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        if let Some(producer) = &self.producer {
            producer.abort();
        }
    }
}
