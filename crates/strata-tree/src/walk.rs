//! Pre-order enumeration with resumable cursors.

use std::ops::Bound;

use strata_chain::Chain;
use strata_types::Path;

use crate::entry::{EntryId, WalkItem, WalkOptions};
use crate::tree::{EntryTree, Slot};

/// Pending slot on the walk stack: id, relative depth and full path.
type Pending = (EntryId, usize, Path);

impl EntryTree {
    /// Walk the subtree under `root` in pre-order, siblings sorted by segment.
    pub fn walk(&self, root: &Path, opts: WalkOptions) -> Vec<WalkItem> {
        self.walk_after(root, None, opts, usize::MAX)
    }

    /// Continue a walk of `root` after the record at `after`, yielding at
    /// most `limit` records.
    ///
    /// `after` is normally the last path a previous batch returned. It does
    /// not need to exist any more: the walk resumes at its pre-order
    /// successor in the current tree.
    pub fn walk_after(
        &self,
        root: &Path,
        after: Option<&Path>,
        opts: WalkOptions,
        limit: usize,
    ) -> Vec<WalkItem> {
        let mut out = Vec::new();
        let Some(root_id) = self.lookup(root) else {
            return out;
        };

        let mut stack: Vec<Pending> = Vec::new();
        match after {
            None => stack.push((root_id, 0, root.clone())),
            Some(after) => {
                if !after.starts_with(root) {
                    return out;
                }
                self.seek(root_id, root, after, opts, &mut stack);
            }
        }

        while out.len() < limit {
            let Some((id, depth, path)) = stack.pop() else {
                break;
            };
            let Some(slot) = self.slot(id) else {
                continue;
            };

            if depth >= opts.min_depth
                && let Some(item) = record(slot, &path, depth, opts.add_empty)
            {
                out.push(item);
            }

            if opts.descends_to(depth + 1) {
                push_children(&mut stack, slot, &path, depth + 1, None);
            }
        }

        out
    }

    /// Rebuild the stack a walk would hold right after emitting `after`.
    fn seek(
        &self,
        root_id: EntryId,
        root: &Path,
        after: &Path,
        opts: WalkOptions,
        stack: &mut Vec<Pending>,
    ) {
        let suffix = &after.segments()[root.len()..];
        let mut cur = Some(root_id);
        let mut cur_path = root.clone();

        for (i, segment) in suffix.iter().enumerate() {
            let Some(slot) = cur.and_then(|id| self.slot(id)) else {
                return;
            };
            let depth = i + 1;
            if opts.descends_to(depth) {
                push_children(stack, slot, &cur_path, depth, Some(segment));
            }
            cur = slot.children.get(segment).copied();
            cur_path = cur_path.child(segment.clone());
        }

        if let Some(slot) = cur.and_then(|id| self.slot(id)) {
            let depth = suffix.len() + 1;
            if opts.descends_to(depth) {
                push_children(stack, slot, &cur_path, depth, None);
            }
        }
    }
}

/// Push the children of `slot` (only those after `after_segment`, if given)
/// so that the smallest segment ends up on top.
fn push_children(
    stack: &mut Vec<Pending>,
    slot: &Slot,
    path: &Path,
    depth: usize,
    after_segment: Option<&String>,
) {
    let lower = match after_segment {
        Some(seg) => Bound::Excluded(seg.clone()),
        None => Bound::Unbounded,
    };
    for (segment, &child) in slot
        .children
        .range::<String, _>((lower, Bound::Unbounded))
        .rev()
    {
        stack.push((child, depth, path.child(segment.clone())));
    }
}

fn record(slot: &Slot, path: &Path, depth: usize, add_empty: bool) -> Option<WalkItem> {
    match &slot.data {
        Some(data) if data.value.is_some() || add_empty => Some(WalkItem {
            path: path.clone(),
            depth,
            value: data.value.clone(),
            chain: data.chain.clone(),
            tock: data.tock,
        }),
        Some(_) => None,
        None if add_empty => Some(WalkItem {
            path: path.clone(),
            depth,
            value: None,
            chain: Chain::new(),
            tock: 0,
        }),
        None => None,
    }
}
