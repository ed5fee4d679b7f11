//! [`NodeRegistry`]: tick state for every origin the store has heard of.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strata_chain::ChainLink;
use strata_types::{NodeId, Tick, Tock};
use tracing::debug;

use crate::{NodeState, Observation, RangeSet, SyncError};

type Result<T> = std::result::Result<T, SyncError>;

/// What one node holds for one origin, as advertised in anti-entropy rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginSummary {
    /// The origin these counters describe.
    pub origin: NodeId,
    /// Highest tick the sender has heard of.
    pub highest: Tick,
    /// Ticks below `highest` the sender lacks.
    pub missing: RangeSet,
}

/// Which fields a `get_state` report should carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSelect {
    pub nodes: bool,
    pub known: bool,
    pub missing: bool,
    pub remote_missing: bool,
    pub present: bool,
}

impl ReportSelect {
    /// Every field.
    pub fn all() -> Self {
        Self {
            nodes: true,
            known: true,
            missing: true,
            remote_missing: true,
            present: true,
        }
    }
}

/// Answer to `get_state`. Unrequested fields are `None`; per-node sets that
/// are empty are left out of their map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    /// The reporting node.
    pub node: NodeId,
    /// Its current tock.
    pub tock: Tock,
    /// Highest tick per origin.
    pub nodes: Option<BTreeMap<NodeId, Tick>>,
    /// Known ticks per origin.
    pub known: Option<BTreeMap<NodeId, RangeSet>>,
    /// Missing ticks per origin.
    pub missing: Option<BTreeMap<NodeId, RangeSet>>,
    /// Gaps peers advertised, per origin.
    pub remote_missing: Option<BTreeMap<NodeId, RangeSet>>,
    /// Ticks that are still the current head of some entry, per origin.
    pub present: Option<BTreeMap<NodeId, RangeSet>>,
}

/// All [`NodeState`]s, keyed by origin.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    states: HashMap<NodeId, NodeState>,
}

impl NodeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `node`, if any contact happened.
    pub fn get(&self, node: &NodeId) -> Option<&NodeState> {
        self.states.get(node)
    }

    /// State for `node`, created on first contact.
    pub fn state_mut(&mut self, node: NodeId) -> &mut NodeState {
        self.states.entry(node).or_insert_with(|| {
            debug!(node = %node.short(), "first contact with origin");
            NodeState::new(node)
        })
    }

    /// Install a state wholesale (used when restoring from disk).
    pub fn insert(&mut self, state: NodeState) {
        self.states.insert(state.node(), state);
    }

    /// Highest tick heard of from `node` (0 if none).
    pub fn highest(&self, node: &NodeId) -> Tick {
        self.states.get(node).map_or(0, NodeState::highest)
    }

    /// Record that `(node, tick)` arrived.
    pub fn observe(&mut self, node: NodeId, tick: Tick) -> Result<Observation> {
        self.state_mut(node).observe(tick)
    }

    /// Number of origins tracked.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no origin is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate over all states.
    pub fn iter(&self) -> impl Iterator<Item = &NodeState> {
        self.states.values()
    }

    /// Per-origin summaries for an anti-entropy round, sorted by origin.
    pub fn summaries(&self) -> Vec<OriginSummary> {
        let mut out: Vec<OriginSummary> = self
            .states
            .values()
            .filter(|s| s.highest() > 0)
            .map(|s| OriginSummary {
                origin: s.node(),
                highest: s.highest(),
                missing: s.missing().clone(),
            })
            .collect();
        out.sort_by_key(|s| s.origin);
        out
    }

    /// Build a `get_state` report.
    ///
    /// `present` lists the current entry heads; it is only consumed when
    /// `select.present` is set.
    pub fn report(
        &self,
        local: NodeId,
        tock: Tock,
        select: ReportSelect,
        present: impl IntoIterator<Item = ChainLink>,
    ) -> StateReport {
        let per_node = |f: fn(&NodeState) -> &RangeSet| -> BTreeMap<NodeId, RangeSet> {
            self.states
                .values()
                .filter(|s| !f(s).is_empty())
                .map(|s| (s.node(), f(s).clone()))
                .collect()
        };

        StateReport {
            node: local,
            tock,
            nodes: select.nodes.then(|| {
                self.states
                    .values()
                    .map(|s| (s.node(), s.highest()))
                    .collect()
            }),
            known: select.known.then(|| per_node(NodeState::known)),
            missing: select.missing.then(|| per_node(NodeState::missing)),
            remote_missing: select
                .remote_missing
                .then(|| per_node(NodeState::remote_missing)),
            present: select.present.then(|| {
                let mut map: BTreeMap<NodeId, RangeSet> = BTreeMap::new();
                for link in present {
                    map.entry(link.node)
                        .or_default()
                        .insert(link.tick..=link.tick);
                }
                map
            }),
        }
    }
}
