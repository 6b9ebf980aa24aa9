//! Event domain model.
//!
//! # Responsibility
//! - Define the canonical, provider-independent calendar event.
//! - Enforce the interval invariant at construction time.
//!
//! # Invariants
//! - `id` is non-empty, stable across syncs and unique within one account;
//!   `EventKey` (account plus id) is the identity used everywhere else.
//! - `end` is never earlier than `start`; `start == end` is a zero-duration
//!   marker.
//! - Instants are absolute UTC values.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Stable provider-assigned event identifier.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EventId = String;

/// Account-scoped event identity.
///
/// The same provider id may appear in two linked accounts (a shared invite
/// seen from both calendars); those are two distinct events.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub account_email: String,
    pub event_id: EventId,
}

impl EventKey {
    pub fn new(account_email: impl Into<String>, event_id: impl Into<EventId>) -> Self {
        Self {
            account_email: account_email.into(),
            event_id: event_id.into(),
        }
    }

    /// Parses the `account/id` form printed by `Display`.
    ///
    /// Splits at the first `/`, so ids may contain slashes.
    pub fn parse(value: &str) -> Option<Self> {
        let (account_email, event_id) = value.trim().split_once('/')?;
        let account_email = account_email.trim();
        let event_id = event_id.trim();
        if account_email.is_empty() || event_id.is_empty() {
            return None;
        }
        Some(Self::new(account_email, event_id))
    }

    pub fn is_blank(&self) -> bool {
        self.account_email.trim().is_empty() || self.event_id.trim().is_empty()
    }
}

impl Display for EventKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account_email, self.event_id)
    }
}

/// Validation error for canonical events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventValidationError {
    #[error("event id cannot be empty")]
    EmptyId,
    #[error("event `{event_id}` has no source account")]
    EmptyAccount { event_id: EventId },
    #[error("event `{event_id}` ends at {end} before it starts at {start}")]
    EndBeforeStart {
        event_id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("all-day event `{event_id}` on {date} has no following day")]
    DateOutOfRange { event_id: EventId, date: NaiveDate },
}

/// Canonical calendar event, immutable once normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider identifier, unique within `account_email`.
    pub id: EventId,
    /// Linked account that sourced the event.
    pub account_email: String,
    /// Display text.
    pub summary: String,
    /// Inclusive start instant.
    pub start: DateTime<Utc>,
    /// Exclusive end instant.
    pub end: DateTime<Utc>,
    /// Organizer shown as clash attribution; `None` when the provider omits it.
    pub creator_email: Option<String>,
    /// Whether the provider record was a date-only event.
    #[serde(default)]
    pub all_day: bool,
}

impl Event {
    /// Creates a timed event after validating its interval.
    ///
    /// # Errors
    /// - `EmptyId` / `EmptyAccount` for blank identity fields.
    /// - `EndBeforeStart` when `end < start`.
    pub fn new(
        id: impl Into<EventId>,
        account_email: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, EventValidationError> {
        let event = Self {
            id: id.into(),
            account_email: account_email.into(),
            summary: summary.into(),
            start,
            end,
            creator_email: None,
            all_day: false,
        };
        event.validate()?;
        Ok(event)
    }

    /// Creates an all-day event covering `[00:00 UTC of date, 00:00 UTC of next date)`.
    pub fn all_day(
        id: impl Into<EventId>,
        account_email: impl Into<String>,
        summary: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Self, EventValidationError> {
        let id = id.into();
        let Some(next_day) = date.succ_opt() else {
            return Err(EventValidationError::DateOutOfRange { event_id: id, date });
        };
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = next_day.and_time(NaiveTime::MIN).and_utc();
        let mut event = Self::new(id, account_email, summary, start, end)?;
        event.all_day = true;
        Ok(event)
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(self.account_email.clone(), self.id.clone())
    }

    /// Returns whether `key` names this event.
    pub fn has_key(&self, key: &EventKey) -> bool {
        self.id == key.event_id && self.account_email == key.account_email
    }

    /// Same account and same provider id.
    pub fn is_same_event(&self, other: &Event) -> bool {
        self.id == other.id && self.account_email == other.account_email
    }

    /// Returns a copy carrying the given creator attribution.
    pub fn with_creator(mut self, creator_email: impl Into<String>) -> Self {
        self.creator_email = Some(creator_email.into());
        self
    }

    /// Validates identity and interval invariants.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.id.trim().is_empty() {
            return Err(EventValidationError::EmptyId);
        }
        if self.account_email.trim().is_empty() {
            return Err(EventValidationError::EmptyAccount {
                event_id: self.id.clone(),
            });
        }
        if self.end < self.start {
            return Err(EventValidationError::EndBeforeStart {
                event_id: self.id.clone(),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns whether this event is a point-in-time marker.
    pub fn is_marker(&self) -> bool {
        self.start == self.end
    }

    /// UTC calendar date the event starts on.
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}
