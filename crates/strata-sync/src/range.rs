//! [`RangeSet`]: a set of ticks stored as disjoint closed intervals.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use strata_types::Tick;

/// Set of ticks kept as sorted, disjoint, non-adjacent closed intervals.
///
/// Stored as `start → end` (both inclusive).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: BTreeMap<Tick, Tick>,
}

impl RangeSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from closed `(start, end)` pairs. Empty pairs are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Tick, Tick)>) -> Self {
        let mut set = Self::new();
        for (lo, hi) in pairs {
            set.insert(lo..=hi);
        }
        set
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of ticks in the set.
    pub fn count(&self) -> u64 {
        self.ranges.iter().map(|(lo, hi)| hi - lo + 1).sum()
    }

    /// Whether `tick` is in the set.
    pub fn contains(&self, tick: Tick) -> bool {
        self.ranges
            .range(..=tick)
            .next_back()
            .is_some_and(|(_, &hi)| hi >= tick)
    }

    /// Iterate over the intervals as `(start, end)`.
    pub fn pairs(&self) -> impl Iterator<Item = (Tick, Tick)> + '_ {
        self.ranges.iter().map(|(&lo, &hi)| (lo, hi))
    }

    /// Iterate over every tick, ascending.
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.ranges.iter().flat_map(|(&lo, &hi)| lo..=hi)
    }

    /// Smallest tick in the set.
    pub fn first(&self) -> Option<Tick> {
        self.ranges.keys().next().copied()
    }

    /// Largest tick in the set.
    pub fn last(&self) -> Option<Tick> {
        self.ranges.values().next_back().copied()
    }

    /// Add every tick in `range`, merging with neighbours.
    pub fn insert(&mut self, range: RangeInclusive<Tick>) {
        let (mut lo, mut hi) = range.into_inner();
        if lo > hi {
            return;
        }

        // Absorb an interval starting before `lo` that touches or overlaps it.
        if let Some((&plo, &phi)) = self.ranges.range(..lo).next_back()
            && phi.saturating_add(1) >= lo
        {
            self.ranges.remove(&plo);
            lo = plo;
            hi = hi.max(phi);
        }

        // Absorb every interval starting inside `lo..=hi+1`.
        let upper = hi.saturating_add(1);
        let swallowed: Vec<(Tick, Tick)> = self
            .ranges
            .range(lo..=upper)
            .map(|(&a, &b)| (a, b))
            .collect();
        for (a, b) in swallowed {
            self.ranges.remove(&a);
            hi = hi.max(b);
        }

        self.ranges.insert(lo, hi);
    }

    /// Remove every tick in `range`, splitting intervals as needed.
    pub fn remove(&mut self, range: RangeInclusive<Tick>) {
        let (lo, hi) = range.into_inner();
        if lo > hi {
            return;
        }

        let mut affected: Vec<(Tick, Tick)> = Vec::new();
        if let Some((&plo, &phi)) = self.ranges.range(..lo).next_back()
            && phi >= lo
        {
            affected.push((plo, phi));
        }
        affected.extend(self.ranges.range(lo..=hi).map(|(&a, &b)| (a, b)));

        for (a, b) in affected {
            self.ranges.remove(&a);
            if a < lo {
                self.ranges.insert(a, lo - 1);
            }
            if b > hi {
                self.ranges.insert(hi + 1, b);
            }
        }
    }

    /// Add every tick of `other`.
    pub fn union_with(&mut self, other: &RangeSet) {
        for (lo, hi) in other.pairs() {
            self.insert(lo..=hi);
        }
    }

    /// Remove every tick of `other`.
    pub fn subtract(&mut self, other: &RangeSet) {
        for (lo, hi) in other.pairs() {
            self.remove(lo..=hi);
        }
    }

    /// Ticks present in both sets.
    pub fn intersection(&self, other: &RangeSet) -> RangeSet {
        let mut out = RangeSet::new();
        let mut a = self.pairs().peekable();
        let mut b = other.pairs().peekable();
        while let (Some(&(alo, ahi)), Some(&(blo, bhi))) = (a.peek(), b.peek()) {
            let lo = alo.max(blo);
            let hi = ahi.min(bhi);
            if lo <= hi {
                out.ranges.insert(lo, hi);
            }
            if ahi < bhi {
                a.next();
            } else {
                b.next();
            }
        }
        out
    }
}

impl FromIterator<Tick> for RangeSet {
    fn from_iter<T: IntoIterator<Item = Tick>>(iter: T) -> Self {
        let mut set = Self::new();
        for tick in iter {
            set.insert(tick..=tick);
        }
        set
    }
}

impl fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.pairs().map(|(lo, hi)| lo..=hi))
            .finish()
    }
}
