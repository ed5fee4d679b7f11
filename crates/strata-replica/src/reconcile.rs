//! Anti-entropy: answering a peer's summary.

use std::collections::HashMap;

use strata_net::{ReplicaMessage, Update};
use strata_sync::{NodeRegistry, OriginSummary, RangeSet};
use strata_types::{NodeId, Tick};
use tracing::debug;

/// Fold a peer summary into `registry` and build the messages that close the
/// peer's gaps.
///
/// For every origin, the peer lacks its advertised `missing` ticks plus
/// everything between its `highest` and ours; origins it does not list at all
/// are lacking from tick 1. Of those ticks, the ones we know are answered:
/// ticks in `present` (the current heads, per origin) are resent through
/// `lookup`, every other known tick goes into a `Superseded` notice. Ticks we
/// do not know either stay missing on both sides.
///
/// Work is proportional to the number of ranges plus `max_resend`: `lookup`
/// is never called once the cap is reached, and ticks left over stay in the
/// remote-missing set for the next round. `local` is used as the sender of
/// `Superseded` notices.
pub fn reconcile<F>(
    registry: &mut NodeRegistry,
    local: NodeId,
    origins: &[OriginSummary],
    present: &HashMap<NodeId, RangeSet>,
    max_resend: usize,
    mut lookup: F,
) -> Vec<ReplicaMessage>
where
    F: FnMut(NodeId, Tick) -> Option<Update>,
{
    // ----- Learn from the summary -----

    for summary in origins {
        let state = registry.state_mut(summary.origin);
        if state.learn_highest(summary.highest) {
            debug!(
                origin = %summary.origin.short(),
                highest = summary.highest,
                "peer knows a higher tick"
            );
        }
        state.note_remote_missing(&summary.missing);
    }

    // ----- Work out what the peer lacks -----

    let advertised: HashMap<NodeId, &OriginSummary> =
        origins.iter().map(|s| (s.origin, s)).collect();

    let mut ours: Vec<(NodeId, Tick, RangeSet)> = registry
        .iter()
        .filter(|s| s.highest() > 0)
        .map(|s| (s.node(), s.highest(), s.known().clone()))
        .collect();
    ours.sort_by_key(|(origin, _, _)| *origin);

    let empty = RangeSet::new();
    let mut updates = Vec::new();
    let mut notices = Vec::new();

    for (origin, highest, known) in ours {
        let mut lacking = RangeSet::new();
        match advertised.get(&origin) {
            Some(peer) => {
                lacking.union_with(&peer.missing);
                if highest > peer.highest {
                    lacking.insert(peer.highest + 1..=highest);
                }
            }
            None => lacking.insert(1..=highest),
        }

        let candidates = known.intersection(&lacking);
        if candidates.is_empty() {
            continue;
        }

        let current = candidates.intersection(present.get(&origin).unwrap_or(&empty));
        let mut superseded = candidates;
        superseded.subtract(&current);

        let mut sent = superseded.clone();
        let remaining = max_resend.saturating_sub(updates.len());
        for tick in current.ticks().take(remaining) {
            match lookup(origin, tick) {
                Some(update) => updates.push(ReplicaMessage::Update(update)),
                // Listed as present but gone: nothing to resend.
                None => superseded.insert(tick..=tick),
            }
            sent.insert(tick..=tick);
        }

        registry.state_mut(origin).clear_remote_missing(&sent);

        if !superseded.is_empty() {
            notices.push(ReplicaMessage::Superseded {
                node: local,
                origin,
                ranges: superseded,
            });
        }
    }

    debug!(
        updates = updates.len(),
        notices = notices.len(),
        "summary answered"
    );

    updates.extend(notices);
    updates
}

/// Group current heads by origin, the shape [`reconcile`] takes.
pub fn present_by_origin(
    heads: impl IntoIterator<Item = (NodeId, Tick)>,
) -> HashMap<NodeId, RangeSet> {
    let mut present: HashMap<NodeId, RangeSet> = HashMap::new();
    for (node, tick) in heads {
        present.entry(node).or_default().insert(tick..=tick);
    }
    present
}
