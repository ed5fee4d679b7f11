//! Per-origin [`NodeState`].

use strata_types::{NodeId, Tick};
use tracing::trace;

use crate::{RangeSet, SyncError};

/// What an observed tick did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// A tick past the previous high-water mark.
    New,
    /// Already known; nothing changed.
    Duplicate,
    /// A tick that was recorded as missing.
    FilledGap,
}

/// Counters for one origin node.
///
/// `known` and `missing` are disjoint and together cover exactly
/// `[1, highest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    node: NodeId,
    highest: Tick,
    known: RangeSet,
    missing: RangeSet,
    remote_missing: RangeSet,
}

impl NodeState {
    /// Fresh state: nothing heard from `node` yet.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            highest: 0,
            known: RangeSet::new(),
            missing: RangeSet::new(),
            remote_missing: RangeSet::new(),
        }
    }

    /// Rebuild state from a persisted high-water mark and the ticks known to
    /// be held. Everything else below `highest` starts out missing, so
    /// anti-entropy asks peers about it again.
    pub fn restored(node: NodeId, highest: Tick, held: &RangeSet) -> Self {
        let mut state = Self::new(node);
        if highest == 0 {
            return state;
        }
        state.highest = highest;
        state.missing.insert(1..=highest);
        let mut known = held.clone();
        known.remove(highest.saturating_add(1)..=Tick::MAX);
        known.remove(0..=0);
        state.missing.subtract(&known);
        state.known = known;
        state
    }

    /// The origin these counters belong to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Highest tick heard of (0 if none).
    pub fn highest(&self) -> Tick {
        self.highest
    }

    /// Ticks received, applied or known to be superseded.
    pub fn known(&self) -> &RangeSet {
        &self.known
    }

    /// Ticks below `highest` not yet received.
    pub fn missing(&self) -> &RangeSet {
        &self.missing
    }

    /// Gaps peers have advertised for this origin.
    pub fn remote_missing(&self) -> &RangeSet {
        &self.remote_missing
    }

    /// Whether `tick` has been seen.
    pub fn is_known(&self, tick: Tick) -> bool {
        self.known.contains(tick)
    }

    /// Record that `tick` arrived.
    pub fn observe(&mut self, tick: Tick) -> Result<Observation, SyncError> {
        if tick == 0 {
            return Err(SyncError::ZeroTick { node: self.node });
        }
        if self.known.contains(tick) {
            return Ok(Observation::Duplicate);
        }

        if tick > self.highest {
            if tick > self.highest + 1 {
                self.missing.insert(self.highest + 1..=tick - 1);
                trace!(node = %self.node.short(), from = self.highest + 1, to = tick - 1, "gap recorded");
            }
            self.highest = tick;
            self.known.insert(tick..=tick);
            Ok(Observation::New)
        } else {
            self.missing.remove(tick..=tick);
            self.known.insert(tick..=tick);
            Ok(Observation::FilledGap)
        }
    }

    /// A peer reports that `tick` exists. Marks anything past the current
    /// high-water mark as missing. Returns whether `highest` moved.
    pub fn learn_highest(&mut self, tick: Tick) -> bool {
        if tick <= self.highest {
            return false;
        }
        self.missing.insert(self.highest + 1..=tick);
        self.highest = tick;
        true
    }

    /// Mark ticks as known without a value, e.g. because the sender says they
    /// were superseded. Only ticks up to the current high-water mark count:
    /// a notice cannot raise `highest`. Tick 0 is ignored.
    pub fn mark_known(&mut self, ranges: &RangeSet) {
        if self.highest == 0 {
            return;
        }
        let mut ranges = ranges.intersection(&RangeSet::from_pairs([(1, self.highest)]));
        ranges.subtract(&self.known);
        self.missing.subtract(&ranges);
        self.known.union_with(&ranges);
    }

    /// Add gaps a peer advertised.
    pub fn note_remote_missing(&mut self, ranges: &RangeSet) {
        self.remote_missing.union_with(ranges);
    }

    /// Forget advertised gaps we have answered.
    pub fn clear_remote_missing(&mut self, ranges: &RangeSet) {
        self.remote_missing.subtract(ranges);
    }

    /// Replace the advertised gaps wholesale.
    pub fn set_remote_missing(&mut self, ranges: RangeSet) {
        self.remote_missing = ranges;
    }
}
