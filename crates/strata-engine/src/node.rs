//! [`StrataNode`]: one replica of the store.
//!
//! All state that must change atomically lives in a single [`Core`] behind a
//! tokio `RwLock`: the entry tree, the per-origin tick registry and the tock
//! counter. Writes take the write lock for the chain check, the counter bumps
//! and the tree update; persistence happens before the lock is released and
//! publishing after.

use std::fmt;
use std::sync::Arc;

use strata_chain::{Chain, ChainLink, ChainRelation, ConflictPolicy, HeadOrder, Origin, Resolution};
use strata_meta::{EntryRecord, MetaStore, NodeRecord};
use strata_net::{ReplicaMessage, Transport, Update};
use strata_replica::{ApplyOutcome, Broadcaster};
use strata_sync::{NodeRegistry, NodeState, Observation, RangeSet, ReportSelect, StateReport};
use strata_tree::{CompactStats, EntryData, EntryTree, Version, WalkOptions};
use strata_types::{NodeId, Path, Tick, Tock, Value};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::stream::{Change, TreeStream, WatchOptions, WatchStream};

type Result<T> = std::result::Result<T, StoreError>;

/// Configuration for creating a [`StrataNode`].
#[derive(Debug, Clone)]
pub struct StrataNodeConfig {
    /// Node identifier.
    pub node_id: NodeId,
    /// Maximum number of links kept in an entry's chain.
    pub chain_depth: usize,
    /// Keep superseded versions addressable by `(node, tick)` until compaction.
    pub retain_history: bool,
    /// Capacity of the channel behind each enumeration stream.
    pub stream_buffer: usize,
    /// Records read per lock acquisition while streaming.
    pub stream_batch: usize,
    /// Committed changes a watcher may fall behind by before it lags.
    pub watch_buffer: usize,
}

impl Default for StrataNodeConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId::from([0u8; 32]),
            chain_depth: 5,
            retain_history: true,
            stream_buffer: 64,
            stream_batch: 32,
            watch_buffer: 256,
        }
    }
}

/// State guarded by the node lock.
pub(crate) struct Core {
    pub(crate) tree: EntryTree,
    pub(crate) registry: NodeRegistry,
    pub(crate) tock: Tock,
}

/// Result of a client write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Value the entry held before, `None` if absent or deleted.
    pub previous: Option<Value>,
    /// Chain after the write, head first.
    pub chain: Chain,
    /// Tick assigned to the write.
    pub tick: Tick,
    /// Tock assigned to the write.
    pub tock: Tock,
}

/// One replica of the store.
pub struct StrataNode {
    node_id: NodeId,
    chain_depth: usize,
    stream_buffer: usize,
    stream_batch: usize,
    core: Arc<RwLock<Core>>,
    meta: Option<Arc<MetaStore>>,
    broadcaster: Option<Broadcaster>,
    policy: Arc<dyn ConflictPolicy>,
    changes: broadcast::Sender<Change>,
}

impl fmt::Debug for StrataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrataNode")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

impl StrataNode {
    /// Create an empty, in-memory node.
    pub fn new(config: StrataNodeConfig) -> Self {
        Self {
            node_id: config.node_id,
            chain_depth: config.chain_depth.max(1),
            stream_buffer: config.stream_buffer.max(1),
            stream_batch: config.stream_batch.max(1),
            core: Arc::new(RwLock::new(Core {
                tree: EntryTree::new(config.retain_history),
                registry: NodeRegistry::new(),
                tock: 0,
            })),
            meta: None,
            broadcaster: None,
            policy: Arc::new(HeadOrder),
            changes: broadcast::channel(config.watch_buffer.max(1)).0,
        }
    }

    /// Write committed changes through to `meta`.
    ///
    /// Call [`restore`](Self::restore) afterwards to load what it holds.
    pub fn with_meta(mut self, meta: Arc<MetaStore>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Publish accepted writes on `transport`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.broadcaster = Some(Broadcaster::new(transport));
        self
    }

    /// Replace the default [`HeadOrder`] conflict policy.
    pub fn with_policy(mut self, policy: Arc<dyn ConflictPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Return this node's ID.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Return the metadata store, if persistence is configured.
    pub fn meta(&self) -> Option<&Arc<MetaStore>> {
        self.meta.as_ref()
    }

    /// Current tock.
    pub async fn tock(&self) -> Tock {
        self.core.read().await.tock
    }

    /// Highest tick known for `node`.
    pub async fn highest(&self, node: &NodeId) -> Tick {
        self.core.read().await.registry.highest(node)
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Load entries and node counters from the metadata store.
    ///
    /// Ticks of other origins that are not the head of a restored entry are
    /// left missing so anti-entropy asks for them again. Returns the number
    /// of entries loaded.
    pub async fn restore(&self) -> Result<usize> {
        let Some(meta) = &self.meta else {
            return Ok(0);
        };

        let entries = meta.list_entries()?;
        let nodes = meta.list_nodes()?;

        let mut core = self.core.write().await;
        let mut held: std::collections::HashMap<NodeId, RangeSet> = Default::default();
        let mut tock = 0;

        for record in &entries {
            let data = EntryData {
                value: record.value.clone(),
                chain: record.chain.clone(),
                tock: record.tock,
            };
            if let Some(head) = data.head() {
                held.entry(head.node)
                    .or_default()
                    .insert(head.tick..=head.tick);
            }
            tock = tock.max(record.tock);
            core.tree.set(&record.path, data)?;
        }

        let mut origins: std::collections::HashMap<NodeId, Tick> = Default::default();
        for record in &nodes {
            tock = tock.max(record.tock);
            origins.insert(record.node, record.tick);
        }
        for (node, ranges) in &held {
            let highest = origins.entry(*node).or_default();
            if let Some(last) = ranges.last() {
                *highest = (*highest).max(last);
            }
        }

        let mut registry = NodeRegistry::new();
        for (node, highest) in origins {
            let state = if node == self.node_id {
                let mut all = RangeSet::new();
                if highest > 0 {
                    all.insert(1..=highest);
                }
                NodeState::restored(node, highest, &all)
            } else {
                let empty = RangeSet::new();
                NodeState::restored(node, highest, held.get(&node).unwrap_or(&empty))
            };
            registry.insert(state);
        }

        core.registry = registry;
        core.tock = tock;

        info!(
            node = %self.node_id.short(),
            entries = entries.len(),
            origins = core.registry.len(),
            tock,
            "restored from metadata store"
        );
        Ok(entries.len())
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Current data at `path`. Tombstones count as absent.
    pub async fn get_value(&self, path: &Path) -> Result<EntryData> {
        let core = self.core.read().await;
        match core.tree.get(path) {
            Some(data) if !data.is_tombstone() => Ok(data.clone()),
            _ => Err(StoreError::NotFound(path.to_string())),
        }
    }

    /// The version written as `(node, tick)`, current or retained history.
    pub async fn get_value_at(&self, node: &NodeId, tick: Tick) -> Result<Version> {
        let core = self.core.read().await;
        match core.tree.version_at(node, tick) {
            Some(version) if !version.data.is_tombstone() => Ok(version),
            _ => Err(StoreError::NotFound(format!("{}:{tick}", node.short()))),
        }
    }

    /// Stream the subtree under `root` in pre-order.
    ///
    /// The producer holds the read lock for one batch at a time and stops as
    /// soon as the returned stream is dropped.
    pub fn get_tree(&self, root: Path, opts: WalkOptions) -> TreeStream {
        TreeStream::spawn(
            self.core.clone(),
            root,
            opts,
            self.stream_batch,
            self.stream_buffer,
        )
    }

    /// Follow changes under `root`.
    ///
    /// With `opts.fetch` the current subtree comes first; a
    /// [`WatchEvent::UpToDate`](crate::WatchEvent::UpToDate) marks the switch
    /// to live changes, local and replicated alike.
    pub fn watch(&self, root: Path, opts: WatchOptions) -> WatchStream {
        WatchStream::spawn(
            self.core.clone(),
            self.changes.subscribe(),
            root,
            opts,
            self.stream_batch,
            self.stream_buffer,
        )
    }

    /// Selected tick-tracking state.
    pub async fn get_state(&self, select: ReportSelect) -> StateReport {
        let core = self.core.read().await;
        core.registry
            .report(self.node_id, core.tock, select, core.tree.heads())
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Store `value` at `path`.
    ///
    /// With `expected = None` the write is unconditional. Otherwise
    /// `expected` must match the stored chain, or the conflict policy must
    /// accept it; an older chain is always `Superseded`.
    pub async fn set_value(
        &self,
        path: &Path,
        value: Value,
        expected: Option<&Chain>,
    ) -> Result<Written> {
        self.write(path, Some(value), expected).await
    }

    /// Replace the value at `path` with a tombstone.
    pub async fn delete_value(&self, path: &Path, expected: Option<&Chain>) -> Result<Written> {
        self.write(path, None, expected).await
    }

    async fn write(
        &self,
        path: &Path,
        value: Option<Value>,
        expected: Option<&Chain>,
    ) -> Result<Written> {
        let (written, update) = {
            let mut core = self.core.write().await;
            let stored = core.tree.get(path).cloned();

            if value.is_none() && stored.as_ref().is_none_or(EntryData::is_tombstone) {
                return Err(StoreError::NotFound(path.to_string()));
            }

            let stored_chain = stored.as_ref().map(|d| d.chain.clone()).unwrap_or_default();
            if let Some(expected) = expected {
                self.check_client_chain(path, &stored_chain, expected)?;
            }

            let tick = core.registry.highest(&self.node_id) + 1;
            let tock = core.tock + 1;
            let chain = stored_chain.extend(self.node_id, tick, self.chain_depth);
            let data = EntryData {
                value: value.clone(),
                chain: chain.clone(),
                tock,
            };

            self.persist_entry(path, &data)?;
            self.persist_node(self.node_id, tick, tock)?;

            let previous = core.tree.set(path, data.clone())?;
            match core.registry.observe(self.node_id, tick)? {
                Observation::New => {}
                other => {
                    error!(tick, ?other, "local tick did not advance");
                    return Err(StoreError::Internal(format!(
                        "local tick {tick} was already known"
                    )));
                }
            }
            core.tock = tock;
            self.notify(path, data);

            debug!(%path, tick, tock, deleted = value.is_none(), "write committed");

            let written = Written {
                previous: previous.and_then(|d| d.value),
                chain: chain.clone(),
                tick,
                tock,
            };
            let update = Update {
                origin: self.node_id,
                tick,
                tock,
                path: path.clone(),
                value,
                chain,
            };
            (written, update)
        };

        if let Some(broadcaster) = &self.broadcaster {
            // Logged by the broadcaster; anti-entropy resends it.
            let _ = broadcaster.publish(&ReplicaMessage::Update(update)).await;
        }

        Ok(written)
    }

    fn check_client_chain(&self, path: &Path, stored: &Chain, expected: &Chain) -> Result<()> {
        let superseded = || StoreError::Superseded {
            path: path.clone(),
            current: stored.clone(),
        };

        match expected.compare(stored) {
            ChainRelation::Equal => Ok(()),
            ChainRelation::Ancestor => {
                debug!(%path, %expected, %stored, "client chain is stale");
                Err(superseded())
            }
            ChainRelation::Descendant | ChainRelation::Divergent => {
                match self.policy.resolve(Origin::Client, stored, expected) {
                    Resolution::Accept => {
                        debug!(%path, %expected, %stored, "divergent client write accepted");
                        Ok(())
                    }
                    Resolution::Reject => {
                        debug!(%path, %expected, %stored, "divergent client write rejected");
                        Err(superseded())
                    }
                }
            }
        }
    }

    /// Drop retained history and tombstones.
    pub async fn compact(&self) -> Result<CompactStats> {
        let mut core = self.core.write().await;

        if let Some(meta) = &self.meta {
            let opts = WalkOptions {
                add_empty: true,
                ..WalkOptions::default()
            };
            for item in core.tree.walk(&Path::root(), opts) {
                if item.value.is_none() {
                    meta.remove_entry(&item.path)?;
                }
            }
        }

        let stats = core.tree.compact();
        info!(
            history = stats.history_dropped,
            tombstones = stats.tombstones_dropped,
            slots = stats.slots_freed,
            "compacted"
        );
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Peer path
    // ------------------------------------------------------------------

    /// Apply an update received from a peer.
    pub async fn apply_update(&self, update: Update) -> Result<ApplyOutcome> {
        if update.tick == 0 {
            return Err(StoreError::Malformed(format!(
                "update from {} has tick 0",
                update.origin.short()
            )));
        }
        let expected_head = ChainLink::new(update.origin, update.tick);
        if update.chain.head() != Some(&expected_head) {
            return Err(StoreError::Malformed(format!(
                "update {expected_head} carries chain {}",
                update.chain
            )));
        }

        let mut core = self.core.write().await;

        if core
            .registry
            .get(&update.origin)
            .is_some_and(|s| s.is_known(update.tick))
        {
            return Ok(ApplyOutcome::Duplicate);
        }

        let outcome = match core.tree.get(&update.path) {
            None => ApplyOutcome::Applied,
            Some(stored) => match update.chain.compare(&stored.chain) {
                ChainRelation::Descendant => ApplyOutcome::Applied,
                ChainRelation::Equal => ApplyOutcome::Duplicate,
                ChainRelation::Ancestor => ApplyOutcome::Stale,
                ChainRelation::Divergent => {
                    match self.policy.resolve(Origin::Peer, &stored.chain, &update.chain) {
                        Resolution::Accept => ApplyOutcome::Applied,
                        Resolution::Reject => ApplyOutcome::Rejected,
                    }
                }
            },
        };

        let highest = core.registry.highest(&update.origin).max(update.tick);

        if outcome != ApplyOutcome::Applied {
            self.persist_node(update.origin, highest, core.tock)?;
            core.registry.observe(update.origin, update.tick)?;
            return Ok(outcome);
        }

        let tock = core.tock.max(update.tock) + 1;
        let data = EntryData {
            value: update.value,
            chain: update.chain.truncated(self.chain_depth),
            tock,
        };

        self.persist_entry(&update.path, &data)?;
        self.persist_node(update.origin, highest, tock)?;

        core.tree.set(&update.path, data.clone())?;
        core.registry.observe(update.origin, update.tick)?;
        core.tock = tock;
        self.notify(&update.path, data);

        debug!(
            path = %update.path,
            origin = %update.origin.short(),
            tick = update.tick,
            tock,
            "peer update applied"
        );
        Ok(ApplyOutcome::Applied)
    }

    /// Close gaps a peer reported as superseded.
    ///
    /// Ticks above the local high-water mark for `origin` are ignored.
    pub async fn apply_superseded(&self, origin: NodeId, ranges: &RangeSet) -> Result<()> {
        let mut core = self.core.write().await;
        let state = core.registry.state_mut(origin);
        state.mark_known(ranges);
        let highest = state.highest();
        let tock = core.tock;
        self.persist_node(origin, highest, tock)?;
        Ok(())
    }

    /// Build the replies to a peer summary.
    pub async fn answer_summary(
        &self,
        origins: &[strata_sync::OriginSummary],
        max_resend: usize,
    ) -> Vec<ReplicaMessage> {
        let mut core = self.core.write().await;
        let Core {
            tree,
            registry,
            tock,
        } = &mut *core;
        let tock = *tock;
        let present = strata_replica::present_by_origin(tree.heads().map(|h| (h.node, h.tick)));

        let lookup = |origin: NodeId, tick: Tick| {
            let version = tree.version_at(&origin, tick).filter(|v| v.current)?;
            Some(Update {
                origin,
                tick,
                tock,
                path: version.path,
                value: version.data.value,
                chain: version.data.chain,
            })
        };
        strata_replica::reconcile(registry, self.node_id, origins, &present, max_resend, lookup)
    }

    /// Current tock and per-origin summaries.
    pub async fn summary(&self) -> (Tock, Vec<strata_sync::OriginSummary>) {
        let core = self.core.read().await;
        (core.tock, core.registry.summaries())
    }

    /// Hand a committed change to watchers. Called with the write lock held
    /// so watchers see changes in commit order.
    fn notify(&self, path: &Path, data: EntryData) {
        // No watchers is fine.
        let _ = self.changes.send(Change {
            path: path.clone(),
            value: data.value,
            chain: data.chain,
            tock: data.tock,
        });
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn persist_entry(&self, path: &Path, data: &EntryData) -> Result<()> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        meta.put_entry(&EntryRecord {
            path: path.clone(),
            value: data.value.clone(),
            chain: data.chain.clone(),
            tock: data.tock,
        })?;
        Ok(())
    }

    fn persist_node(&self, node: NodeId, tick: Tick, tock: Tock) -> Result<()> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        meta.put_node(&NodeRecord { node, tick, tock })?;
        Ok(())
    }
}
