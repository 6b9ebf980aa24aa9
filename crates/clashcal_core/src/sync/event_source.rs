//! Event source contract and file-backed implementation.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to obtain raw provider events for a user.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read event file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event file `{}` is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("account feed `{account_email}` failed: {message}")]
    Feed {
        account_email: String,
        message: String,
    },
}

/// Supplier of raw provider events for an already-authenticated user.
///
/// Implementations may aggregate several linked accounts and handle paging
/// and rate limits; the payload is expected to be a JSON array of records.
pub trait EventSource {
    fn fetch_events(&self, user_id: &str) -> Result<Value, FetchError>;
}

impl<S: EventSource + ?Sized> EventSource for &S {
    fn fetch_events(&self, user_id: &str) -> Result<Value, FetchError> {
        (**self).fetch_events(user_id)
    }
}

/// Reads provider events from a JSON file on every fetch.
///
/// The file holds either one array shared by every user, or an object mapping
/// user ids to arrays. Users missing from the object have no events.
#[derive(Debug, Clone)]
pub struct JsonFileEventSource {
    path: PathBuf,
}

impl JsonFileEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for JsonFileEventSource {
    fn fetch_events(&self, user_id: &str) -> Result<Value, FetchError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| FetchError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|source| FetchError::Parse {
            path: self.path.clone(),
            source,
        })?;

        match document {
            Value::Object(mut users) => Ok(users
                .remove(user_id)
                .unwrap_or_else(|| Value::Array(Vec::new()))),
            other => Ok(other),
        }
    }
}
