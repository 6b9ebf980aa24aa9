//! Sorted interval index with sweep-line overlap enumeration.

use crate::model::event::{Event, EventKey};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Returns whether two events clash under half-open interval semantics.
///
/// `a.start < b.end && b.start < a.end`, plus one extension: two zero-duration
/// markers at the identical instant clash with each other. An event ending at
/// `T` never clashes with one starting at `T`.
pub fn overlaps(a: &Event, b: &Event) -> bool {
    if a.is_marker() && b.is_marker() {
        return a.start == b.start;
    }
    a.start < b.end && b.start < a.end
}

/// Deterministic index order: `start`, then `id`, then account, ascending.
pub fn compare_events(a: &Event, b: &Event) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.account_email.cmp(&b.account_email))
}

/// Events of one user sorted for overlap queries.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    events: Vec<Event>,
    positions: HashMap<EventKey, usize>,
}

impl IntervalIndex {
    /// Builds the index in `O(n log n)`.
    pub fn build(events: impl IntoIterator<Item = Event>) -> Self {
        let mut index = Self::default();
        index.rebuild(events);
        index
    }

    /// Replaces the indexed set with `events`.
    pub fn rebuild(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events = events.into_iter().collect();
        self.events.sort_by(compare_events);
        self.positions = self
            .events
            .iter()
            .enumerate()
            .map(|(position, event)| (event.key(), position))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Indexed events in index order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, key: &EventKey) -> Option<&Event> {
        self.position(key).map(|position| &self.events[position])
    }

    /// Sorted position of `key`, usable with `events()`.
    pub fn position(&self, key: &EventKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Returns indexed events clashing with `event`, excluding `event` itself.
    ///
    /// Output follows index order.
    pub fn overlapping(&self, event: &Event) -> Vec<&Event> {
        // Anything starting after `event.end` cannot clash; a marker may still
        // clash with another marker starting exactly at `event.end`.
        let upper = self
            .events
            .partition_point(|candidate| candidate.start <= event.end);
        self.events[..upper]
            .iter()
            .filter(|candidate| !candidate.is_same_event(event) && overlaps(candidate, event))
            .collect()
    }

    /// Returns clashing position pairs whose transitive closure equals the
    /// clash relation, with at most one pair per event.
    ///
    /// Single merge-style sweep in index order. Every positive-duration event
    /// still running at an instant overlaps every other one running then, so
    /// linking each newcomer to the furthest-reaching earlier event is enough.
    /// Markers at `T` link to that event when it reaches past `T`, and to the
    /// first marker at `T`.
    pub fn clash_links(&self) -> Vec<(usize, usize)> {
        let mut links = Vec::new();
        // Furthest-ending positive-duration event among those started so far.
        let mut reach: Option<(usize, DateTime<Utc>)> = None;
        let mut group_start = 0;

        while group_start < self.events.len() {
            let at = self.events[group_start].start;
            let group_end = group_start
                + self.events[group_start..].partition_point(|event| event.start == at);
            let group = group_start..group_end;

            // Markers only see events that started strictly before `at`.
            let mut first_marker = None;
            for position in group.clone().filter(|&p| self.events[p].is_marker()) {
                if let Some((reach_position, reach_end)) = reach {
                    if reach_end > at {
                        links.push((reach_position, position));
                    }
                }
                match first_marker {
                    Some(first) => links.push((first, position)),
                    None => first_marker = Some(position),
                }
            }

            for position in group.filter(|&p| !self.events[p].is_marker()) {
                let end = self.events[position].end;
                match reach {
                    Some((reach_position, reach_end)) if reach_end > at => {
                        links.push((reach_position, position));
                        if end > reach_end {
                            reach = Some((position, end));
                        }
                    }
                    _ => reach = Some((position, end)),
                }
            }

            group_start = group_end;
        }

        links
    }
}

#[cfg(test)]
mod tests {
    use super::{overlaps, IntervalIndex};
    use crate::clash::union_find::UnionFind;
    use crate::model::event::{Event, EventKey};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn event(id: &str, start_min: i64, end_min: i64) -> Event {
        let base = Utc.with_ymd_and_hms(2025, 4, 20, 0, 0, 0).unwrap();
        Event::new(
            id,
            "work@example.com",
            id,
            base + Duration::minutes(start_min),
            base + Duration::minutes(end_min),
        )
        .unwrap()
    }

    fn key(id: &str) -> EventKey {
        EventKey::new("work@example.com", id)
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let morning = event("a", 540, 600);
        let next = event("b", 600, 660);
        assert!(!overlaps(&morning, &next));
        assert!(!overlaps(&next, &morning));
    }

    #[test]
    fn markers_clash_only_with_identical_markers_or_strict_containers() {
        let marker = event("m", 600, 600);
        let twin = event("n", 600, 600);
        let container = event("c", 540, 660);
        let ends_at_marker = event("e", 540, 600);
        let starts_at_marker = event("s", 600, 660);

        assert!(overlaps(&marker, &twin));
        assert!(overlaps(&marker, &container));
        assert!(!overlaps(&marker, &ends_at_marker));
        assert!(!overlaps(&marker, &starts_at_marker));
    }

    #[test]
    fn build_sorts_by_start_then_id() {
        let index = IntervalIndex::build(vec![
            event("z", 60, 120),
            event("b", 0, 30),
            event("a", 60, 90),
        ]);

        let ids: Vec<_> = index.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "z"]);
        assert_eq!(index.position(&key("z")), Some(2));
    }

    #[test]
    fn overlapping_excludes_self_and_non_clashing() {
        let index = IntervalIndex::build(vec![
            event("e1", 540, 600),
            event("e2", 570, 630),
            event("e3", 840, 900),
        ]);

        let e1 = index.get(&key("e1")).unwrap().clone();
        let hits: Vec<_> = index.overlapping(&e1).iter().map(|e| e.id.clone()).collect();
        assert_eq!(hits, vec!["e2".to_string()]);
        assert!(index.overlapping(index.get(&key("e3")).unwrap()).is_empty());
    }

    #[test]
    fn rebuild_drops_stale_entries() {
        let mut index = IntervalIndex::build(vec![event("old", 0, 60)]);
        index.rebuild(vec![event("new", 0, 60)]);

        assert_eq!(index.len(), 1);
        assert!(index.get(&key("old")).is_none());
        assert!(index.get(&key("new")).is_some());
    }

    #[test]
    fn same_id_in_two_accounts_is_indexed_twice() {
        let work = event("evt1", 540, 600);
        let mut home = event("evt1", 570, 630);
        home.account_email = "home@example.com".to_string();
        let index = IntervalIndex::build(vec![work.clone(), home.clone()]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&home.key()), Some(&home));
        assert_eq!(index.overlapping(&work), vec![&home]);
        assert_eq!(index.clash_links(), vec![(0, 1)]);
    }

    #[test]
    fn sweep_links_marker_pairs_at_same_instant() {
        let index = IntervalIndex::build(vec![
            event("before", 540, 600),
            event("m1", 600, 600),
            event("m2", 600, 600),
            event("after", 600, 660),
        ]);

        // Sorted: before, after, m1, m2.
        assert_eq!(index.clash_links(), vec![(2, 3)]);
    }

    #[test]
    fn sweep_links_marker_inside_running_event() {
        let index = IntervalIndex::build(vec![
            event("long", 540, 660),
            event("m", 600, 600),
            event("starts_at_marker", 600, 630),
        ]);

        // Sorted: long, m, starts_at_marker.
        assert_eq!(index.clash_links(), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn dense_cluster_yields_one_link_per_newcomer() {
        let index = IntervalIndex::build((0..50).map(|n| event(&format!("e{n:02}"), n, 600)));
        assert_eq!(index.clash_links().len(), 49);
    }

    fn arb_event(id: &'static str) -> impl Strategy<Value = Event> {
        (0i64..1_000, 0i64..240).prop_map(move |(start, len)| event(id, start, start + len))
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_event("a"), b in arb_event("b")) {
            prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        }

        #[test]
        fn positive_event_overlaps_itself(start in 0i64..1_000, len in 1i64..240) {
            let a = event("a", start, start + len);
            prop_assert!(overlaps(&a, &a));
        }

        #[test]
        fn sweep_matches_pairwise_scan(
            spans in proptest::collection::vec((0i64..600, 0i64..120), 0..24)
        ) {
            let events: Vec<_> = spans
                .iter()
                .enumerate()
                .map(|(n, (start, len))| event(&format!("e{n:02}"), *start, start + len))
                .collect();
            let index = IntervalIndex::build(events);
            let sorted = index.events();

            let mut pairwise = UnionFind::new(sorted.len());
            for i in 0..sorted.len() {
                for j in (i + 1)..sorted.len() {
                    if overlaps(&sorted[i], &sorted[j]) {
                        pairwise.union(i, j);
                    }
                }
            }
            let mut swept = UnionFind::new(sorted.len());
            for (a, b) in index.clash_links() {
                prop_assert!(overlaps(&sorted[a], &sorted[b]));
                swept.union(a, b);
            }
            prop_assert_eq!(swept.components(2), pairwise.components(2));
        }
    }
}
