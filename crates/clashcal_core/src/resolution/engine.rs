//! Pure resolution engine.

use crate::clash::detector::ResolutionMap;
use crate::error::InvalidChoiceError;
use crate::model::clash::ClashGroup;
use crate::model::event::{Event, EventKey};
use crate::model::resolution::Resolution;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Resolves `group` by keeping `kept` and discarding every other member.
///
/// Resolving the same group with the same choice again yields an equal value
/// apart from `resolved_at`.
///
/// # Errors
/// - `InvalidChoiceError` when `kept` is not a member of `group`.
pub fn resolve(
    group: &ClashGroup,
    kept: &EventKey,
    resolved_at: DateTime<Utc>,
) -> Result<Resolution, InvalidChoiceError> {
    if !group.contains(kept) {
        return Err(InvalidChoiceError {
            group_key: group.group_key.clone(),
            event: kept.clone(),
        });
    }

    let discarded = group
        .members
        .iter()
        .filter(|event| !event.has_key(kept))
        .map(Event::key)
        .collect();

    Ok(Resolution {
        group_key: group.group_key.clone(),
        kept: kept.clone(),
        discarded,
        resolved_at,
    })
}

/// Keys discarded by resolutions that still apply to a current group.
///
/// Resolutions whose group changed membership no longer hide anything, so a
/// re-surfaced cluster shows all of its members again.
pub fn discarded_events(groups: &[ClashGroup], resolutions: &ResolutionMap) -> BTreeSet<EventKey> {
    groups
        .iter()
        .filter_map(|group| {
            resolutions
                .get(&group.group_key)
                .filter(|resolution| resolution.applies_to(group))
        })
        .flat_map(|resolution| resolution.discarded.iter().cloned())
        .collect()
}

/// Merged calendar view: `events` minus the discarded ones, order preserved.
pub fn visible_events(events: &[Event], discarded: &BTreeSet<EventKey>) -> Vec<Event> {
    events
        .iter()
        .filter(|event| !discarded.contains(&event.key()))
        .cloned()
        .collect()
}
