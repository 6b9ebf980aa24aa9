//! Resolution domain model.
//!
//! # Responsibility
//! - Record one durable user decision for a clash group.
//! - Answer whether a stored decision still applies to a freshly detected
//!   group.
//!
//! # Invariants
//! - `kept` is never part of `discarded`.
//! - `discarded` is non-empty (a group has at least two members).
//! - One resolution per `group_key` per user; later writes overwrite.

use crate::model::clash::{ClashGroup, GroupKey};
use crate::model::event::EventKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Validation error for resolution records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionValidationError {
    #[error("resolution for group `{0}` keeps an event without id or account")]
    BlankKept(GroupKey),
    #[error("resolution for group `{0}` discards nothing")]
    NothingDiscarded(GroupKey),
    #[error("resolution for group `{group_key}` both keeps and discards `{event}`")]
    KeptAlsoDiscarded { group_key: GroupKey, event: EventKey },
}

/// Durable decision retaining one event of a clash group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub group_key: GroupKey,
    pub kept: EventKey,
    pub discarded: BTreeSet<EventKey>,
    /// Millisecond precision once persisted.
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    pub fn validate(&self) -> Result<(), ResolutionValidationError> {
        if self.kept.is_blank() {
            return Err(ResolutionValidationError::BlankKept(self.group_key.clone()));
        }
        if self.discarded.is_empty() {
            return Err(ResolutionValidationError::NothingDiscarded(
                self.group_key.clone(),
            ));
        }
        if self.discarded.contains(&self.kept) {
            return Err(ResolutionValidationError::KeptAlsoDiscarded {
                group_key: self.group_key.clone(),
                event: self.kept.clone(),
            });
        }
        Ok(())
    }

    /// Member set the decision was made for: kept plus discarded.
    pub fn member_keys(&self) -> BTreeSet<EventKey> {
        let mut keys = self.discarded.clone();
        keys.insert(self.kept.clone());
        keys
    }

    /// Returns whether this decision covers exactly the members of `group`.
    pub fn applies_to(&self, group: &ClashGroup) -> bool {
        self.group_key == group.group_key && self.member_keys() == group.member_keys()
    }

    pub fn is_discarded(&self, key: &EventKey) -> bool {
        self.discarded.contains(key)
    }
}
