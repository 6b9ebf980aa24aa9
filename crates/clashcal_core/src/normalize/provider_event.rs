//! Provider-side event record shape.
//!
//! Mirrors the calendar-provider JSON layout: `start`/`end` are either
//! `{ "dateTime": .. }`, `{ "date": .. }`, or a bare string.

use serde::{Deserialize, Serialize};

/// One raw event as delivered by an account feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<ProviderTime>,
    #[serde(default)]
    pub end: Option<ProviderTime>,
    #[serde(default)]
    pub creator: Option<ProviderPerson>,
    /// Linked account the record came from.
    #[serde(default, alias = "email")]
    pub account_email: Option<String>,
}

/// Start or end value of a provider event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderTime {
    /// Bare RFC 3339 date-time or `YYYY-MM-DD` date.
    Text(String),
    Structured {
        #[serde(default, rename = "dateTime")]
        date_time: Option<String>,
        #[serde(default)]
        date: Option<String>,
        /// Informational only; instants are taken from `dateTime` offsets.
        #[serde(default, rename = "timeZone")]
        time_zone: Option<String>,
    },
}

impl ProviderTime {
    pub fn date_time(value: impl Into<String>) -> Self {
        Self::Structured {
            date_time: Some(value.into()),
            date: None,
            time_zone: None,
        }
    }

    pub fn date(value: impl Into<String>) -> Self {
        Self::Structured {
            date_time: None,
            date: Some(value.into()),
            time_zone: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPerson {
    #[serde(default)]
    pub email: Option<String>,
}
