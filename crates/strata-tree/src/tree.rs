//! Arena-backed [`EntryTree`].

use std::collections::{BTreeMap, HashMap};

use strata_chain::{Chain, ChainLink};
use strata_types::{NodeId, Path, Tick, Tock};
use tracing::{debug, trace};

use crate::entry::{CompactStats, EntryData, EntryId, Version};
use crate::error::TreeError;

type Result<T> = std::result::Result<T, TreeError>;

const ROOT: EntryId = EntryId(0);

pub(crate) struct Slot {
    pub(crate) segment: String,
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: BTreeMap<String, EntryId>,
    pub(crate) data: Option<EntryData>,
}

impl Slot {
    fn new(segment: String, parent: Option<EntryId>) -> Self {
        Self {
            segment,
            parent,
            children: BTreeMap::new(),
            data: None,
        }
    }
}

/// A superseded version kept for `(node, tick)` lookups.
struct Historic {
    path: Path,
    data: EntryData,
}

/// Hierarchical map from [`Path`] to [`EntryData`].
///
/// The root slot always exists and can hold a value like any other entry.
pub struct EntryTree {
    pub(crate) slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    /// `(node, tick)` of each entry's current head.
    heads: HashMap<(NodeId, Tick), EntryId>,
    /// Superseded versions, only filled when `retain_history` is set.
    history: HashMap<(NodeId, Tick), Historic>,
    retain_history: bool,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new(false)
    }
}

impl EntryTree {
    /// Create an empty tree.
    ///
    /// With `retain_history`, superseded versions stay reachable through
    /// [`version_at`](Self::version_at) until the next [`compact`](Self::compact).
    pub fn new(retain_history: bool) -> Self {
        Self {
            slots: vec![Some(Slot::new(String::new(), None))],
            free: Vec::new(),
            heads: HashMap::new(),
            history: HashMap::new(),
            retain_history,
        }
    }

    // ----- Lookup -----

    pub(crate) fn slot(&self, id: EntryId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: EntryId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Find the slot for `path`, if it exists.
    pub fn lookup(&self, path: &Path) -> Option<EntryId> {
        let mut cur = ROOT;
        for segment in path.segments() {
            cur = *self.slot(cur)?.children.get(segment)?;
        }
        Some(cur)
    }

    /// Current data at `path`, tombstones included.
    pub fn get(&self, path: &Path) -> Option<&EntryData> {
        let id = self.lookup(path)?;
        self.slot(id)?.data.as_ref()
    }

    /// Rebuild the full path of a slot from its parent links.
    pub fn path_of(&self, id: EntryId) -> Option<Path> {
        let mut segments = Vec::new();
        let mut cur = id;
        loop {
            let slot = self.slot(cur)?;
            match slot.parent {
                Some(parent) => {
                    segments.push(slot.segment.clone());
                    cur = parent;
                }
                None => break,
            }
        }
        segments.reverse();
        Some(Path::from(segments))
    }

    /// Look up a version by the write that produced it.
    ///
    /// Current heads are always found; superseded versions only while history
    /// is retained and not yet compacted.
    pub fn version_at(&self, node: &NodeId, tick: Tick) -> Option<Version> {
        let key = (*node, tick);
        if let Some(&id) = self.heads.get(&key) {
            let slot = self.slot(id)?;
            return Some(Version {
                path: self.path_of(id)?,
                data: slot.data.clone()?,
                current: true,
            });
        }
        self.history.get(&key).map(|h| Version {
            path: h.path.clone(),
            data: h.data.clone(),
            current: false,
        })
    }

    /// Whether `(node, tick)` is the current head of some entry.
    pub fn is_head(&self, node: &NodeId, tick: Tick) -> bool {
        self.heads.contains_key(&(*node, tick))
    }

    /// All current heads.
    pub fn heads(&self) -> impl Iterator<Item = ChainLink> + '_ {
        self.heads.keys().map(|&(node, tick)| ChainLink::new(node, tick))
    }

    /// Number of entries holding a live value.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.data.as_ref().is_some_and(|d| !d.is_tombstone()))
            .count()
    }

    /// Whether no entry holds a live value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of retained superseded versions.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Highest tock stored anywhere in the tree.
    pub fn max_tock(&self) -> Tock {
        self.slots
            .iter()
            .flatten()
            .filter_map(|s| s.data.as_ref().map(|d| d.tock))
            .max()
            .unwrap_or(0)
    }

    // ----- Mutation -----

    /// Store `data` at `path`, creating intermediate slots as needed.
    ///
    /// Returns the data that was replaced. The old head leaves the head index
    /// and, with retention enabled, moves to history.
    pub fn set(&mut self, path: &Path, data: EntryData) -> Result<Option<EntryData>> {
        let head = match data.head() {
            Some(link) => *link,
            None => return Err(TreeError::EmptyChain(path.clone())),
        };
        let id = self.ensure(path);

        if let Some(&owner) = self.heads.get(&(head.node, head.tick))
            && owner != id
        {
            return Err(TreeError::HeadInUse {
                link: head,
                existing: self.path_of(owner).unwrap_or_default(),
                path: path.clone(),
            });
        }

        let previous = match self.slot_mut(id) {
            Some(slot) => slot.data.replace(data),
            None => None,
        };

        if let Some(old) = &previous
            && let Some(old_head) = old.head().copied()
            && old_head != head
        {
            self.heads.remove(&(old_head.node, old_head.tick));
            if self.retain_history {
                self.history.insert(
                    (old_head.node, old_head.tick),
                    Historic {
                        path: path.clone(),
                        data: old.clone(),
                    },
                );
            }
        }
        self.heads.insert((head.node, head.tick), id);

        trace!(%path, head = %head, "entry stored");
        Ok(previous)
    }

    /// Replace the value at `path` with a tombstone carrying `chain` and `tock`.
    pub fn delete(&mut self, path: &Path, chain: Chain, tock: Tock) -> Result<Option<EntryData>> {
        self.set(path, EntryData::tombstone(chain, tock))
    }

    /// Drop history and tombstones, then free slots that hold nothing.
    pub fn compact(&mut self) -> CompactStats {
        let mut stats = CompactStats {
            history_dropped: self.history.len(),
            ..CompactStats::default()
        };
        self.history.clear();

        for idx in 0..self.slots.len() {
            let Some(slot) = self.slots[idx].as_mut() else {
                continue;
            };
            if slot.data.as_ref().is_some_and(EntryData::is_tombstone)
                && let Some(data) = slot.data.take()
            {
                if let Some(head) = data.head() {
                    self.heads.remove(&(head.node, head.tick));
                }
                stats.tombstones_dropped += 1;
            }
        }

        // Reused slots can place a parent after its child, so repeat until a
        // pass frees nothing.
        loop {
            let mut freed = 0;
            for idx in 1..self.slots.len() {
                let prunable = self.slots[idx]
                    .as_ref()
                    .is_some_and(|s| s.data.is_none() && s.children.is_empty());
                if prunable {
                    self.release(EntryId(idx));
                    freed += 1;
                }
            }
            if freed == 0 {
                break;
            }
            stats.slots_freed += freed;
        }

        debug!(
            history = stats.history_dropped,
            tombstones = stats.tombstones_dropped,
            slots = stats.slots_freed,
            "tree compacted"
        );
        stats
    }

    fn ensure(&mut self, path: &Path) -> EntryId {
        let mut cur = ROOT;
        for segment in path.segments() {
            let existing = self.slot(cur).and_then(|s| s.children.get(segment).copied());
            cur = match existing {
                Some(id) => id,
                None => {
                    let id = self.alloc(Slot::new(segment.clone(), Some(cur)));
                    if let Some(parent) = self.slot_mut(cur) {
                        parent.children.insert(segment.clone(), id);
                    }
                    id
                }
            };
        }
        cur
    }

    fn alloc(&mut self, slot: Slot) -> EntryId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                EntryId(idx)
            }
            None => {
                self.slots.push(Some(slot));
                EntryId(self.slots.len() - 1)
            }
        }
    }

    fn release(&mut self, id: EntryId) {
        let Some(slot) = self.slots[id.0].take() else {
            return;
        };
        if let Some(parent) = slot.parent.and_then(|p| self.slot_mut(p)) {
            parent.children.remove(&slot.segment);
        }
        self.free.push(id.0);
    }
}
