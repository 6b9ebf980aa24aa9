//! Engine error taxonomy.
//!
//! # Responsibility
//! - Name the typed failures the normalizer, resolution engine and sync
//!   orchestrator surface to callers.
//! - Carry enough context (`group_key`, offending id) to render an actionable
//!   message.
//!
//! # Invariants
//! - None of these errors is fatal to the process.
//! - Per-event `MalformedEventError`s are absorbed by the normalizer and
//!   reported as skips; only `NotAnEventList` fails a whole batch.

use crate::model::clash::GroupKey;
use crate::model::event::{EventId, EventKey, EventValidationError};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Which side of an event interval a time error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
}

impl Display for TimeField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Raw provider data that cannot become a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    #[error("event payload is not a list of event records")]
    NotAnEventList,
    #[error("event record #{index} is not an object")]
    NotAnObject { index: usize },
    #[error("event record #{index} has an unrecognized shape: {message}")]
    UnrecognizedShape { index: usize, message: String },
    #[error("event record #{index} has no id")]
    MissingId { index: usize },
    #[error("event `{event_id}` has no source account")]
    MissingAccount { event_id: EventId },
    #[error("event `{event_id}` is missing its {field} time")]
    MissingTime { event_id: EventId, field: TimeField },
    #[error("event `{event_id}` has an unparseable {field} time `{value}`")]
    InvalidTime {
        event_id: EventId,
        field: TimeField,
        value: String,
    },
    #[error("event `{event_id}` repeats an id already seen for account `{account_email}`")]
    DuplicateId {
        event_id: EventId,
        account_email: String,
    },
    #[error(transparent)]
    Invalid(#[from] EventValidationError),
}

impl MalformedEventError {
    /// Stable metadata-only code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAnEventList => "not_an_event_list",
            Self::NotAnObject { .. } => "not_an_object",
            Self::UnrecognizedShape { .. } => "unrecognized_shape",
            Self::MissingId { .. } => "missing_id",
            Self::MissingAccount { .. } => "missing_account",
            Self::MissingTime { .. } => "missing_time",
            Self::InvalidTime { .. } => "invalid_time",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::Invalid(_) => "invalid_event",
        }
    }
}

/// The kept event of a resolution request is not a member of the group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event `{event}` is not a member of clash group `{group_key}`")]
pub struct InvalidChoiceError {
    pub group_key: GroupKey,
    pub event: EventKey,
}

/// A resolution request references a group whose membership has changed.
///
/// Callers should re-fetch current groups before retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("clash group `{group_key}` is stale; re-sync before resolving")]
pub struct StaleGroupError {
    pub group_key: GroupKey,
}
