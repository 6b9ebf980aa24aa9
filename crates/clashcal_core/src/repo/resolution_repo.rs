//! Resolution store contract, SQLite implementation and in-memory variant.
//!
//! # Responsibility
//! - Persist one resolution per `(user_id, group_key)`.
//! - Load a user's full resolution map at the start of every sync.
//!
//! # Invariants
//! - Saving an existing key overwrites it atomically (last writer wins).
//! - `resolved_at` is stored with millisecond precision.

use crate::clash::detector::ResolutionMap;
use crate::db::DbError;
use crate::model::clash::GroupKey;
use crate::model::event::EventKey;
use crate::model::resolution::{Resolution, ResolutionValidationError};
use chrono::DateTime;
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for resolution persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ResolutionValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("failed to encode resolution: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid persisted resolution data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Per-user store of clash resolutions.
pub trait ResolutionRepository {
    fn load_resolutions(&self, user_id: &str) -> RepoResult<ResolutionMap>;
    fn get_resolution(&self, user_id: &str, group_key: &GroupKey) -> RepoResult<Option<Resolution>>;
    fn save_resolution(&self, user_id: &str, resolution: &Resolution) -> RepoResult<()>;
}

impl<R: ResolutionRepository + ?Sized> ResolutionRepository for &R {
    fn load_resolutions(&self, user_id: &str) -> RepoResult<ResolutionMap> {
        (**self).load_resolutions(user_id)
    }

    fn get_resolution(&self, user_id: &str, group_key: &GroupKey) -> RepoResult<Option<Resolution>> {
        (**self).get_resolution(user_id, group_key)
    }

    fn save_resolution(&self, user_id: &str, resolution: &Resolution) -> RepoResult<()> {
        (**self).save_resolution(user_id, resolution)
    }
}

const RESOLUTION_SELECT_SQL: &str = "SELECT
    group_key,
    kept_account_email,
    kept_event_id,
    discarded_events,
    resolved_at
FROM resolutions";

/// SQLite-backed resolution repository.
pub struct SqliteResolutionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteResolutionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ResolutionRepository for SqliteResolutionRepository<'_> {
    fn load_resolutions(&self, user_id: &str) -> RepoResult<ResolutionMap> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESOLUTION_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY group_key ASC;"
        ))?;

        let mut rows = stmt.query([user_id])?;
        let mut resolutions = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let resolution = parse_resolution_row(row)?;
            resolutions.insert(resolution.group_key.clone(), resolution);
        }

        Ok(resolutions)
    }

    fn get_resolution(&self, user_id: &str, group_key: &GroupKey) -> RepoResult<Option<Resolution>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESOLUTION_SELECT_SQL}
             WHERE user_id = ?1 AND group_key = ?2;"
        ))?;

        let mut rows = stmt.query(params![user_id, group_key.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_resolution_row(row)?));
        }

        Ok(None)
    }

    fn save_resolution(&self, user_id: &str, resolution: &Resolution) -> RepoResult<()> {
        resolution.validate()?;
        let discarded = serde_json::to_string(&resolution.discarded)?;

        self.conn.execute(
            "INSERT INTO resolutions (
                user_id,
                group_key,
                kept_account_email,
                kept_event_id,
                discarded_events,
                resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, group_key) DO UPDATE SET
                kept_account_email = excluded.kept_account_email,
                kept_event_id = excluded.kept_event_id,
                discarded_events = excluded.discarded_events,
                resolved_at = excluded.resolved_at;",
            params![
                user_id,
                resolution.group_key.as_str(),
                resolution.kept.account_email.as_str(),
                resolution.kept.event_id.as_str(),
                discarded,
                resolution.resolved_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }
}

fn parse_resolution_row(row: &Row<'_>) -> RepoResult<Resolution> {
    let key_text: String = row.get("group_key")?;
    let group_key = GroupKey::parse(&key_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid group key `{key_text}` in resolutions.group_key"
        ))
    })?;

    let discarded_text: String = row.get("discarded_events")?;
    let discarded: BTreeSet<EventKey> = serde_json::from_str(&discarded_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid event list `{discarded_text}` in resolutions.discarded_events"
        ))
    })?;

    let resolved_ms: i64 = row.get("resolved_at")?;
    let resolved_at = DateTime::from_timestamp_millis(resolved_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{resolved_ms}` in resolutions.resolved_at"
        ))
    })?;

    let resolution = Resolution {
        group_key,
        kept: EventKey::new(
            row.get::<_, String>("kept_account_email")?,
            row.get::<_, String>("kept_event_id")?,
        ),
        discarded,
        resolved_at,
    };
    resolution.validate()?;
    Ok(resolution)
}

/// Process-local resolution store, for embedding without a database and for tests.
#[derive(Debug, Default)]
pub struct InMemoryResolutionRepository {
    users: Mutex<BTreeMap<String, ResolutionMap>>,
}

impl InMemoryResolutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResolutionRepository for InMemoryResolutionRepository {
    fn load_resolutions(&self, user_id: &str) -> RepoResult<ResolutionMap> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }

    fn get_resolution(&self, user_id: &str, group_key: &GroupKey) -> RepoResult<Option<Resolution>> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .get(user_id)
            .and_then(|resolutions| resolutions.get(group_key))
            .cloned())
    }

    fn save_resolution(&self, user_id: &str, resolution: &Resolution) -> RepoResult<()> {
        resolution.validate()?;
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users
            .entry(user_id.to_string())
            .or_default()
            .insert(resolution.group_key.clone(), resolution.clone());
        Ok(())
    }
}
