//! Presentation-facing result of one sync cycle.

use crate::model::clash::ClashGroup;
use crate::model::event::{Event, EventKey};
use crate::normalize::normalizer::SkippedEvent;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use uuid::Uuid;

const SYNCED_MESSAGE: &str = "Your events have been synchronized successfully!";
const CLASH_HEADER: &str = "The following events are clashing:";
const UNKNOWN_SOURCE: &str = "Unknown";

/// Everything the presentation layer needs after one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Correlates log lines of one sync cycle.
    pub sync_id: Uuid,
    pub user_id: String,
    /// All normalized events in index order.
    pub events: Vec<Event>,
    /// Merged calendar view: `events` minus discarded ones.
    pub visible_events: Vec<Event>,
    /// Groups awaiting a decision, earliest first.
    pub clashes: Vec<ClashGroup>,
    /// Groups suppressed by a still-valid resolution.
    pub resolved_group_count: usize,
    pub skipped: Vec<SkippedEvent>,
}

impl SyncReport {
    pub fn has_clashes(&self) -> bool {
        !self.clashes.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Events hidden from the merged view. Their provider records still exist.
    pub fn discarded_events(&self) -> BTreeSet<EventKey> {
        let visible: BTreeSet<EventKey> = self.visible_events.iter().map(Event::key).collect();
        self.events
            .iter()
            .map(Event::key)
            .filter(|key| !visible.contains(key))
            .collect()
    }

    /// Visible events starting on `date` (UTC).
    pub fn events_on(&self, date: NaiveDate) -> Vec<&Event> {
        self.visible_events
            .iter()
            .filter(|event| event.start_date() == date)
            .collect()
    }

    /// Distinct UTC dates with at least one visible event.
    pub fn marked_dates(&self) -> BTreeSet<NaiveDate> {
        self.visible_events.iter().map(Event::start_date).collect()
    }

    /// One line per unresolved group: `Clash N: A (..) vs B (..)`.
    pub fn clash_descriptions(&self) -> Vec<String> {
        self.clashes
            .iter()
            .enumerate()
            .map(|(position, group)| {
                let members: Vec<String> = group.members.iter().map(describe_event).collect();
                format!("Clash {}: {}", position + 1, members.join(" vs "))
            })
            .collect()
    }

    /// Short user-facing outcome of the sync.
    pub fn summary_message(&self) -> String {
        if !self.has_clashes() {
            return SYNCED_MESSAGE.to_string();
        }
        let mut lines = vec![CLASH_HEADER.to_string()];
        lines.extend(self.clash_descriptions());
        lines.join("\n")
    }
}

fn describe_event(event: &Event) -> String {
    let start = event.start.format("%b %-d, %Y %H:%M");
    let end = if event.end.date_naive() == event.start.date_naive() {
        event.end.format("%H:%M").to_string()
    } else {
        event.end.format("%b %-d, %Y %H:%M").to_string()
    };
    let source = event.creator_email.as_deref().unwrap_or(UNKNOWN_SOURCE);
    format!("{} ({start} - {end}, source: {source})", event.summary)
}
