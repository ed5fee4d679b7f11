//! Shared test harness for Strata integration tests.
//!
//! Provides [`TestCluster`]: N store nodes replicating over a
//! [`LocalBroker`], each with its own temporary metadata store, plus
//! partition, kill and restart hooks for chaos tests.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use strata_chain::Chain;
use strata_engine::{StrataNode, StrataNodeConfig};
use strata_meta::MetaStore;
use strata_net::{LocalBroker, Transport};
use strata_replica::{ReplicaConfig, ReplicaStore, ReplicaTasks, Replicator};
use strata_sync::ReportSelect;
use strata_tree::WalkOptions;
use strata_types::{NodeId, Path};
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Anti-entropy interval used by test clusters.
pub const TEST_INTERVAL: Duration = Duration::from_millis(50);

/// How long [`TestCluster::wait_converged`] waits by default.
pub const CONVERGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deterministic node id for member `i`.
pub fn node_id(i: usize) -> NodeId {
    NodeId::from_name(&format!("member-{i}"))
}

pub fn path(segments: &[&str]) -> Path {
    Path::from(segments)
}

pub fn val(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

/// One entry as every replica must agree on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub path: Path,
    pub value: Option<Bytes>,
    pub chain: Chain,
}

// =========================================================================
// Cluster
// =========================================================================

struct Member {
    id: NodeId,
    node: Arc<StrataNode>,
    meta: Arc<MetaStore>,
    tasks: Option<ReplicaTasks>,
}

/// A simulated cluster of store nodes.
pub struct TestCluster {
    broker: LocalBroker,
    members: Vec<Member>,
    replica_config: ReplicaConfig,
    node_config: StrataNodeConfig,
}

impl TestCluster {
    /// Start an `n`-node cluster with default settings.
    pub async fn new(n: usize) -> Self {
        Self::with_config(
            n,
            ReplicaConfig {
                interval: TEST_INTERVAL,
                ..ReplicaConfig::default()
            },
            StrataNodeConfig::default(),
        )
        .await
    }

    /// Start an `n`-node cluster. `node_config.node_id` is replaced per member.
    pub async fn with_config(
        n: usize,
        replica_config: ReplicaConfig,
        node_config: StrataNodeConfig,
    ) -> Self {
        let mut cluster = Self {
            broker: LocalBroker::default(),
            members: Vec::with_capacity(n),
            replica_config,
            node_config,
        };
        for _ in 0..n {
            cluster.add_node().await;
        }
        cluster
    }

    /// Add and start a new member. Returns its index.
    pub async fn add_node(&mut self) -> usize {
        let index = self.members.len();
        let id = node_id(index);
        let meta = Arc::new(MetaStore::open_temporary().expect("temporary meta store"));
        let (node, tasks) = self.start_member(id, meta.clone()).await;
        self.members.push(Member {
            id,
            node,
            meta,
            tasks: Some(tasks),
        });
        debug!(index, node = %id.short(), "member started");
        index
    }

    async fn start_member(&self, id: NodeId, meta: Arc<MetaStore>) -> (Arc<StrataNode>, ReplicaTasks) {
        let transport: Arc<dyn Transport> = Arc::new(self.broker.endpoint(id));
        let node = Arc::new(
            StrataNode::new(StrataNodeConfig {
                node_id: id,
                ..self.node_config.clone()
            })
            .with_meta(meta)
            .with_transport(transport.clone()),
        );
        node.restore().await.expect("restore");

        let replicator = Replicator::new(
            node.clone() as Arc<dyn ReplicaStore>,
            transport,
            self.replica_config,
        );
        let tasks = replicator.start().await.expect("start replicator");
        (node, tasks)
    }

    /// Node `i`.
    pub fn node(&self, i: usize) -> &Arc<StrataNode> {
        &self.members[i].node
    }

    /// NodeId of member `i`.
    pub fn id(&self, i: usize) -> NodeId {
        self.members[i].id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The bus connecting the members.
    pub fn broker(&self) -> &LocalBroker {
        &self.broker
    }

    /// Whether member `i` is running.
    pub fn is_alive(&self, i: usize) -> bool {
        self.members[i].tasks.is_some()
    }

    // ---------------------------------------------------------------------
    // Fault injection
    // ---------------------------------------------------------------------

    /// Split the cluster: members in different groups cannot reach each other.
    pub async fn partition(&self, groups: &[&[usize]]) {
        for (g, group) in groups.iter().enumerate() {
            for other in &groups[g + 1..] {
                for &a in group.iter() {
                    for &b in other.iter() {
                        self.broker.partition(self.id(a), self.id(b)).await;
                    }
                }
            }
        }
    }

    /// Remove every partition.
    pub async fn heal(&self) {
        self.broker.heal().await;
    }

    /// Stop member `i`'s replication. Its state stays on disk.
    pub fn kill(&mut self, i: usize) {
        if let Some(tasks) = self.members[i].tasks.take() {
            tasks.shutdown();
            debug!(index = i, "member killed");
        }
    }

    /// Rebuild member `i` from its metadata store and rejoin the bus.
    pub async fn restart(&mut self, i: usize) {
        self.kill(i);
        let id = self.members[i].id;
        let meta = self.members[i].meta.clone();
        let (node, tasks) = self.start_member(id, meta).await;
        let member = &mut self.members[i];
        member.node = node;
        member.tasks = Some(tasks);
        debug!(index = i, "member restarted");
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Every entry that carries data or a tombstone on member `i`.
    pub async fn snapshot(&self, i: usize) -> Vec<EntrySnapshot> {
        let opts = WalkOptions {
            add_empty: true,
            ..WalkOptions::default()
        };
        self.node(i)
            .get_tree(Path::root(), opts)
            .collect()
            .await
            .into_iter()
            .filter(|item| !item.chain.is_empty())
            .map(|item| EntrySnapshot {
                path: item.path,
                value: item.value,
                chain: item.chain,
            })
            .collect()
    }

    /// Whether member `i` has no recorded gaps.
    pub async fn has_no_gaps(&self, i: usize) -> bool {
        let select = ReportSelect {
            missing: true,
            ..ReportSelect::default()
        };
        let report = self.node(i).get_state(select).await;
        report.missing.is_none_or(|m| m.is_empty())
    }

    /// Whether every live member holds the same entries and no gaps.
    pub async fn is_converged(&self) -> bool {
        let live: Vec<usize> = (0..self.len()).filter(|&i| self.is_alive(i)).collect();
        let Some((&first, rest)) = live.split_first() else {
            return true;
        };
        let reference = self.snapshot(first).await;
        for &i in &live {
            if !self.has_no_gaps(i).await {
                return false;
            }
        }
        for &i in rest {
            if self.snapshot(i).await != reference {
                return false;
            }
        }
        true
    }

    /// Poll until [`is_converged`](Self::is_converged) or `timeout` passes.
    pub async fn wait_converged(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_converged().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll until member `i` holds `value` at `at` or `timeout` passes.
    pub async fn wait_for_value(
        &self,
        i: usize,
        at: &Path,
        value: &Bytes,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(data) = self.node(i).get_value(at).await
                && data.value.as_ref() == Some(value)
            {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Stop every member.
    pub fn shutdown(mut self) {
        for i in 0..self.len() {
            self.kill(i);
        }
    }
}
