//! [`Chain`] and [`ChainLink`].

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{NodeId, Tick};

/// One write in a value's causal history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainLink {
    /// Node that performed the write.
    pub node: NodeId,
    /// That node's tick for the write.
    pub tick: Tick,
}

impl ChainLink {
    /// Create a link.
    pub fn new(node: NodeId, tick: Tick) -> Self {
        Self { node, tick }
    }

    /// Total order used to break divergent histories: tick first, then node.
    pub fn order_key(&self) -> (Tick, NodeId) {
        (self.tick, self.node)
    }
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node.short(), self.tick)
    }
}

/// How two chains relate causally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRelation {
    /// Same head.
    Equal,
    /// The left chain is older: the right one already contains its head.
    Ancestor,
    /// The left chain is newer: it contains the right one's head.
    Descendant,
    /// Neither contains the other's head.
    Divergent,
}

/// Bounded causal history of a value, newest link first.
///
/// A chain never holds two links for the same node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    links: Vec<ChainLink>,
}

impl Chain {
    /// The empty chain (no history).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from links, newest first.
    ///
    /// Later links for a node already seen are dropped.
    pub fn from_links(links: impl IntoIterator<Item = ChainLink>) -> Self {
        let mut out: Vec<ChainLink> = Vec::new();
        for link in links {
            if !out.iter().any(|l| l.node == link.node) {
                out.push(link);
            }
        }
        Self { links: out }
    }

    /// Single-link chain.
    pub fn single(node: NodeId, tick: Tick) -> Self {
        Self {
            links: vec![ChainLink::new(node, tick)],
        }
    }

    /// The most recent write, if any.
    pub fn head(&self) -> Option<&ChainLink> {
        self.links.first()
    }

    /// All links, newest first.
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The tick this chain records for `node`.
    pub fn tick_of(&self, node: &NodeId) -> Option<Tick> {
        self.links.iter().find(|l| l.node == *node).map(|l| l.tick)
    }

    /// Whether this chain already contains `link` (or a later write by the
    /// same node).
    pub fn covers(&self, link: &ChainLink) -> bool {
        self.tick_of(&link.node).is_some_and(|t| t >= link.tick)
    }

    /// Compare `self` against `other`.
    ///
    /// The empty chain is an ancestor of every non-empty chain, and two empty
    /// chains are equal.
    pub fn compare(&self, other: &Chain) -> ChainRelation {
        match (self.head(), other.head()) {
            (None, None) => ChainRelation::Equal,
            (None, Some(_)) => ChainRelation::Ancestor,
            (Some(_), None) => ChainRelation::Descendant,
            (Some(mine), Some(theirs)) => {
                if mine == theirs {
                    return ChainRelation::Equal;
                }
                let older = other.covers(mine);
                let newer = self.covers(theirs);
                match (older, newer) {
                    (true, false) => ChainRelation::Ancestor,
                    (false, true) => ChainRelation::Descendant,
                    _ => ChainRelation::Divergent,
                }
            }
        }
    }

    /// Return a new chain with `(node, tick)` prepended, any older link of
    /// `node` removed and the result truncated to `depth` links (minimum 1).
    pub fn extend(&self, node: NodeId, tick: Tick, depth: usize) -> Chain {
        let depth = depth.max(1);
        let mut links = Vec::with_capacity(depth.min(self.links.len() + 1));
        links.push(ChainLink::new(node, tick));
        links.extend(
            self.links
                .iter()
                .filter(|l| l.node != node)
                .take(depth - 1)
                .copied(),
        );
        Chain { links }
    }

    /// The first `n` links. `truncated(0)` is empty.
    pub fn truncated(&self, n: usize) -> Chain {
        Chain {
            links: self.links.iter().take(n).copied().collect(),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.links.is_empty() {
            return f.write_str("-");
        }
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{link}")?;
        }
        Ok(())
    }
}
