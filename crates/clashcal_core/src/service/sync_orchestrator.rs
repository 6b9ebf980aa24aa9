//! Sync orchestration use-case service.
//!
//! # Responsibility
//! - Run fetch → normalize → detect for one user and report the result.
//! - Apply explicit resolve requests against the latest detected groups.
//!
//! # Invariants
//! - At most one sync or resolve runs per user at a time; concurrent requests
//!   for the same user are rejected, other users are unaffected.
//! - Resolutions are re-read from the repository at the start of every sync.
//! - Resolve requests only target groups from the user's latest sync.
//! - The latest-groups snapshot is held per user until `end_session` drops it
//!   or the orchestrator itself is dropped.

use crate::clash::detector::detect_in_index;
use crate::error::{InvalidChoiceError, MalformedEventError, StaleGroupError};
use crate::index::interval_index::IntervalIndex;
use crate::model::clash::{ClashGroup, ClashStatus, GroupKey};
use crate::model::event::EventKey;
use crate::model::resolution::Resolution;
use crate::normalize::normalizer::normalize_payload;
use crate::repo::resolution_repo::{RepoError, ResolutionRepository};
use crate::resolution::engine::{discarded_events, resolve, visible_events};
use crate::service::sync_report::SyncReport;
use crate::sync::event_source::{EventSource, FetchError};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Service error for sync and resolve use-cases.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("user id cannot be empty")]
    InvalidUserId,
    #[error("a sync is already in progress for user `{0}`")]
    SyncInProgress(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Malformed(#[from] MalformedEventError),
    #[error(transparent)]
    InvalidChoice(#[from] InvalidChoiceError),
    #[error(transparent)]
    StaleGroup(#[from] StaleGroupError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl SyncError {
    /// Stable metadata-only code for log lines and callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUserId => "invalid_user_id",
            Self::SyncInProgress(_) => "sync_in_progress",
            Self::Fetch(_) => "fetch_failed",
            Self::Malformed(_) => "malformed_payload",
            Self::InvalidChoice(_) => "invalid_choice",
            Self::StaleGroup(_) => "stale_group",
            Self::Repo(_) => "repo_failed",
        }
    }
}

/// Per-user sync orchestrator over an event source and a resolution store.
///
/// Meant to live for one app session. Long-running embeddings call
/// `end_session` when a user goes idle so their snapshot is released.
pub struct SyncOrchestrator<S: EventSource, R: ResolutionRepository> {
    source: S,
    repo: R,
    in_flight: Mutex<BTreeSet<String>>,
    latest_groups: Mutex<BTreeMap<String, Vec<ClashGroup>>>,
}

impl<S: EventSource, R: ResolutionRepository> SyncOrchestrator<S, R> {
    pub fn new(source: S, repo: R) -> Self {
        Self {
            source,
            repo,
            in_flight: Mutex::new(BTreeSet::new()),
            latest_groups: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Runs one sync cycle for `user_id`.
    ///
    /// # Errors
    /// - `SyncInProgress` while another sync/resolve for the user runs.
    /// - `Fetch`, `Malformed` (payload not a list) and `Repo` failures.
    ///   Individually malformed records are skipped, not errors.
    pub fn sync(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        let user_id = normalize_user_id(user_id)?;
        let _guard = self.begin(&user_id)?;
        let sync_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!("event=sync module=service status=start sync_id={sync_id} user_id={user_id}");

        match self.run_sync(sync_id, &user_id) {
            Ok(report) => {
                info!(
                    "event=sync module=service status=ok sync_id={} user_id={} events={} clashes={} resolved={} skipped={} duration_ms={}",
                    sync_id,
                    user_id,
                    report.events.len(),
                    report.clashes.len(),
                    report.resolved_group_count,
                    report.skipped_count(),
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                warn!(
                    "event=sync module=service status=error sync_id={} user_id={} duration_ms={} error_code={}",
                    sync_id,
                    user_id,
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Resolves one group from the user's latest sync by keeping `kept`.
    ///
    /// Re-resolving an already resolved group with another choice replaces
    /// the stored decision.
    ///
    /// # Errors
    /// - `StaleGroup` when `group_key` is not among the latest detected groups.
    /// - `InvalidChoice` when `kept` is not a member of the group.
    pub fn resolve(
        &self,
        user_id: &str,
        group_key: &GroupKey,
        kept: &EventKey,
    ) -> Result<Resolution, SyncError> {
        let user_id = normalize_user_id(user_id)?;
        let _guard = self.begin(&user_id)?;

        let result = self.apply_resolution(&user_id, group_key, kept);
        match &result {
            Ok(resolution) => info!(
                "event=resolve module=service status=ok user_id={} group_key={} discarded={}",
                user_id,
                group_key,
                resolution.discarded.len()
            ),
            Err(err) => warn!(
                "event=resolve module=service status=error user_id={} group_key={} error_code={}",
                user_id,
                group_key,
                err.code()
            ),
        }
        result
    }

    /// Groups detected by the user's latest sync, resolved ones included.
    pub fn latest_groups(&self, user_id: &str) -> Vec<ClashGroup> {
        let latest = self
            .latest_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        latest.get(user_id.trim()).cloned().unwrap_or_default()
    }

    /// Drops the user's latest-groups snapshot; returns whether one existed.
    ///
    /// Later resolve requests fail with `StaleGroup` until the next sync.
    /// Stored resolutions are untouched.
    ///
    /// # Errors
    /// - `SyncInProgress` while a sync or resolve for the user runs.
    pub fn end_session(&self, user_id: &str) -> Result<bool, SyncError> {
        let user_id = normalize_user_id(user_id)?;
        let _guard = self.begin(&user_id)?;
        let removed = self
            .latest_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
            .is_some();
        info!("event=end_session module=service status=ok user_id={user_id} removed={removed}");
        Ok(removed)
    }

    /// Number of users whose latest groups are currently held.
    pub fn session_count(&self) -> usize {
        self.latest_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn run_sync(&self, sync_id: Uuid, user_id: &str) -> Result<SyncReport, SyncError> {
        let payload = self.source.fetch_events(user_id)?;
        let batch = normalize_payload(&payload)?;
        let resolutions = self.repo.load_resolutions(user_id)?;

        let index = IntervalIndex::build(batch.events);
        let groups = detect_in_index(&index, &resolutions);
        let discarded = discarded_events(&groups, &resolutions);
        let events = index.events().to_vec();
        let visible = visible_events(&events, &discarded);

        let resolved_group_count = groups.iter().filter(|group| group.is_resolved()).count();
        let clashes = groups
            .iter()
            .filter(|group| !group.is_resolved())
            .cloned()
            .collect();

        self.latest_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), groups);

        Ok(SyncReport {
            sync_id,
            user_id: user_id.to_string(),
            events,
            visible_events: visible,
            clashes,
            resolved_group_count,
            skipped: batch.skipped,
        })
    }

    fn apply_resolution(
        &self,
        user_id: &str,
        group_key: &GroupKey,
        kept: &EventKey,
    ) -> Result<Resolution, SyncError> {
        let group = self
            .latest_groups(user_id)
            .into_iter()
            .find(|group| &group.group_key == group_key)
            .ok_or_else(|| StaleGroupError {
                group_key: group_key.clone(),
            })?;

        let resolution = resolve(&group, kept, now_millis())?;
        self.repo.save_resolution(user_id, &resolution)?;

        if let Some(groups) = self
            .latest_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(user_id)
        {
            for group in groups.iter_mut().filter(|group| &group.group_key == group_key) {
                group.status = ClashStatus::Resolved;
            }
        }

        Ok(resolution)
    }

    fn begin(&self, user_id: &str) -> Result<InFlightGuard<'_>, SyncError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(user_id.to_string()) {
            return Err(SyncError::SyncInProgress(user_id.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            user_id: user_id.to_string(),
        })
    }
}

/// Releases the per-user in-flight slot on drop, including on error paths.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<BTreeSet<String>>,
    user_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

fn normalize_user_id(user_id: &str) -> Result<String, SyncError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidUserId);
    }
    Ok(trimmed.to_string())
}

/// Current time truncated to the store's millisecond precision.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
