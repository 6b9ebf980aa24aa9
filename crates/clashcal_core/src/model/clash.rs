//! Clash group model.
//!
//! # Responsibility
//! - Represent one maximal cluster of transitively overlapping events.
//! - Derive the deterministic `GroupKey` used to correlate resolutions
//!   across sync cycles.
//!
//! # Invariants
//! - `members.len() >= 2`.
//! - `members` are ordered by `(start, id, account)` ascending.
//! - `group_key` depends only on the set of member `EventKey`s, not on
//!   member order.

use crate::model::event::{Event, EventKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Deterministic identifier of a clash group (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Derives the key from member keys; input order and duplicates are ignored.
    pub fn from_member_keys<'a>(keys: impl IntoIterator<Item = &'a EventKey>) -> Self {
        let sorted: BTreeSet<&EventKey> = keys.into_iter().collect();
        let mut hasher = Sha256::new();
        for key in sorted {
            // Length prefixes keep `("ab", "c")` and `("a", "bc")` distinct.
            for part in [&key.account_email, &key.event_id] {
                hasher.update((part.len() as u64).to_le_bytes());
                hasher.update(part.as_bytes());
            }
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps a previously derived key, e.g. one read back from storage.
    ///
    /// Returns `None` unless `value` is 64 lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let well_formed = trimmed.len() == 64
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        well_formed.then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a clash group still needs a user decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClashStatus {
    Unresolved,
    Resolved,
}

/// Cluster of events whose intervals overlap transitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClashGroup {
    pub group_key: GroupKey,
    pub members: Vec<Event>,
    pub status: ClashStatus,
}

impl ClashGroup {
    /// Builds an unresolved group from members already ordered by `(start, id, account)`.
    pub(crate) fn unresolved(members: Vec<Event>) -> Self {
        let keys: Vec<EventKey> = members.iter().map(Event::key).collect();
        let group_key = GroupKey::from_member_keys(&keys);
        Self {
            group_key,
            members,
            status: ClashStatus::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ClashStatus::Resolved
    }

    pub fn member_keys(&self) -> BTreeSet<EventKey> {
        self.members.iter().map(Event::key).collect()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.members.iter().any(|event| event.has_key(key))
    }

    /// Key of the only member carrying `event_id`.
    ///
    /// Returns `None` when no member, or more than one account's member,
    /// has that provider id.
    pub fn member_key(&self, event_id: &str) -> Option<EventKey> {
        let mut matching = self.members.iter().filter(|event| event.id == event_id);
        let first = matching.next()?;
        matching.next().is_none().then(|| first.key())
    }

    /// Earliest member start; members are sorted, so this is the first one.
    pub fn earliest_start(&self) -> Option<DateTime<Utc>> {
        self.members.first().map(|event| event.start)
    }

    pub fn latest_end(&self) -> Option<DateTime<Utc>> {
        self.members.iter().map(|event| event.end).max()
    }
}
