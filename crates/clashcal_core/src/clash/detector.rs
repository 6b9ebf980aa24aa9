//! Clash detector: sweep + union-find grouping with resolution suppression.

use crate::clash::union_find::UnionFind;
use crate::index::interval_index::IntervalIndex;
use crate::model::clash::{ClashGroup, ClashStatus, GroupKey};
use crate::model::event::Event;
use crate::model::resolution::Resolution;
use log::debug;
use std::collections::BTreeMap;

/// Stored decisions of one user, keyed by group.
pub type ResolutionMap = BTreeMap<GroupKey, Resolution>;

const MIN_CLASH_SIZE: usize = 2;

/// Returns the clash groups that still need a user decision.
pub fn detect(events: &[Event], resolutions: &ResolutionMap) -> Vec<ClashGroup> {
    detect_all(events, resolutions)
        .into_iter()
        .filter(|group| !group.is_resolved())
        .collect()
}

/// Returns every clash group, each marked `Resolved` or `Unresolved`.
pub fn detect_all(events: &[Event], resolutions: &ResolutionMap) -> Vec<ClashGroup> {
    let index = IntervalIndex::build(events.iter().cloned());
    detect_in_index(&index, resolutions)
}

/// Groups the events of an already built index.
///
/// A stored resolution suppresses a group only when it was made for exactly
/// the same member set; a newly clashing event re-surfaces the cluster.
pub fn detect_in_index(index: &IntervalIndex, resolutions: &ResolutionMap) -> Vec<ClashGroup> {
    let mut sets = UnionFind::new(index.len());
    for (a, b) in index.clash_links() {
        sets.union(a, b);
    }

    let sorted = index.events();
    let groups: Vec<ClashGroup> = sets
        .components(MIN_CLASH_SIZE)
        .into_iter()
        .map(|positions| {
            let members = positions
                .into_iter()
                .map(|position| sorted[position].clone())
                .collect();
            let mut group = ClashGroup::unresolved(members);
            if resolutions
                .get(&group.group_key)
                .is_some_and(|resolution| resolution.applies_to(&group))
            {
                group.status = ClashStatus::Resolved;
            }
            group
        })
        .collect();

    debug!(
        "event=detect module=clash status=ok events={} groups={} resolved={}",
        index.len(),
        groups.len(),
        groups.iter().filter(|group| group.is_resolved()).count()
    );
    groups
}
