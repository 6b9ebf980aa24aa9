//! Provider record → canonical `Event` conversion.
//!
//! # Responsibility
//! - Convert provider time representations into half-open UTC intervals.
//! - Skip unusable records with a logged warning instead of failing the sync.
//!
//! # Invariants
//! - All-day events cover `[00:00 UTC of start date, 00:00 UTC of end date)`;
//!   an end date not after the start date widens to one full day.
//! - Offset-less date-times are read as UTC.
//! - The first valid record wins when an id repeats within one account of a
//!   batch; the same id under two accounts is two events.

use crate::error::{MalformedEventError, TimeField};
use crate::model::event::{Event, EventId, EventKey};
use crate::normalize::provider_event::{ProviderEvent, ProviderTime};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashSet;

const UNTITLED_SUMMARY: &str = "(No title)";
const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One provider record that did not become an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    /// Position of the record in the input batch.
    pub index: usize,
    /// Provider id when the record carried one.
    pub event_id: Option<EventId>,
    pub reason: MalformedEventError,
}

/// Normalizer output: usable events plus the records that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub events: Vec<Event>,
    pub skipped: Vec<SkippedEvent>,
}

impl NormalizedBatch {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Normalizes a raw JSON payload as returned by an event source.
///
/// # Errors
/// - `NotAnEventList` when `payload` is not a JSON array. Every other defect
///   is recorded per record in `NormalizedBatch::skipped`.
pub fn normalize_payload(payload: &Value) -> Result<NormalizedBatch, MalformedEventError> {
    match payload.as_array() {
        Some(records) => Ok(normalize(records)),
        None => {
            warn!(
                "event=normalize module=normalize status=error error_code={}",
                MalformedEventError::NotAnEventList.code()
            );
            Err(MalformedEventError::NotAnEventList)
        }
    }
}

/// Normalizes raw JSON records, skipping the ones that cannot be decoded.
pub fn normalize(records: &[Value]) -> NormalizedBatch {
    let mut collector = BatchCollector::default();
    for (index, record) in records.iter().enumerate() {
        if !record.is_object() {
            collector.skip(index, None, MalformedEventError::NotAnObject { index });
            continue;
        }
        match serde_json::from_value::<ProviderEvent>(record.clone()) {
            Ok(provider_event) => collector.push(index, &provider_event),
            Err(err) => collector.skip(
                index,
                record.get("id").and_then(Value::as_str).map(str::to_string),
                MalformedEventError::UnrecognizedShape {
                    index,
                    message: err.to_string(),
                },
            ),
        }
    }
    collector.finish()
}

/// Normalizes already-decoded provider events.
pub fn normalize_events(events: &[ProviderEvent]) -> NormalizedBatch {
    let mut collector = BatchCollector::default();
    for (index, provider_event) in events.iter().enumerate() {
        collector.push(index, provider_event);
    }
    collector.finish()
}

/// Converts one provider event; `index` is used only for error context.
pub fn normalize_event(
    index: usize,
    provider_event: &ProviderEvent,
) -> Result<Event, MalformedEventError> {
    let event_id = provider_event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MalformedEventError::MissingId { index })?
        .to_string();

    let account_email = provider_event
        .account_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| MalformedEventError::MissingAccount {
            event_id: event_id.clone(),
        })?
        .to_string();

    let start = resolve_time(&event_id, TimeField::Start, provider_event.start.as_ref())?;
    let end = resolve_time(&event_id, TimeField::End, provider_event.end.as_ref())?;
    let (start_at, end_at) = to_interval(&event_id, start, end)?;

    let summary = provider_event
        .summary
        .as_deref()
        .filter(|summary| !summary.trim().is_empty())
        .unwrap_or(UNTITLED_SUMMARY)
        .to_string();

    let creator_email = provider_event
        .creator
        .as_ref()
        .and_then(|creator| creator.email.as_deref())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);

    let event = Event {
        id: event_id,
        account_email,
        summary,
        start: start_at,
        end: end_at,
        creator_email,
        all_day: matches!(start, ResolvedTime::Date(_)),
    };
    event.validate()?;
    Ok(event)
}

#[derive(Default)]
struct BatchCollector {
    batch: NormalizedBatch,
    seen: HashSet<EventKey>,
    total: usize,
}

impl BatchCollector {
    fn push(&mut self, index: usize, provider_event: &ProviderEvent) {
        self.total += 1;
        let raw_id = provider_event.id.clone();
        match normalize_event(index, provider_event) {
            Ok(event) => {
                if self.seen.insert(event.key()) {
                    self.batch.events.push(event);
                } else {
                    let Event {
                        id, account_email, ..
                    } = event;
                    self.record_skip(
                        index,
                        Some(id.clone()),
                        MalformedEventError::DuplicateId {
                            event_id: id,
                            account_email,
                        },
                    );
                }
            }
            Err(reason) => self.record_skip(index, raw_id, reason),
        }
    }

    fn skip(&mut self, index: usize, event_id: Option<EventId>, reason: MalformedEventError) {
        self.total += 1;
        self.record_skip(index, event_id, reason);
    }

    fn record_skip(&mut self, index: usize, event_id: Option<EventId>, reason: MalformedEventError) {
        warn!(
            "event=normalize_skip module=normalize status=skipped index={} error_code={}",
            index,
            reason.code()
        );
        self.batch.skipped.push(SkippedEvent {
            index,
            event_id,
            reason,
        });
    }

    fn finish(self) -> NormalizedBatch {
        info!(
            "event=normalize module=normalize status=ok total={} normalized={} skipped={}",
            self.total,
            self.batch.events.len(),
            self.batch.skipped.len()
        );
        self.batch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedTime {
    Instant(DateTime<Utc>),
    Date(NaiveDate),
}

fn resolve_time(
    event_id: &str,
    field: TimeField,
    value: Option<&ProviderTime>,
) -> Result<ResolvedTime, MalformedEventError> {
    let missing = || MalformedEventError::MissingTime {
        event_id: event_id.to_string(),
        field,
    };
    match value.ok_or_else(missing)? {
        ProviderTime::Text(text) => parse_text(event_id, field, text),
        ProviderTime::Structured {
            date_time: Some(text),
            ..
        } => parse_date_time(text)
            .map(ResolvedTime::Instant)
            .ok_or_else(|| invalid_time(event_id, field, text)),
        ProviderTime::Structured {
            date: Some(text), ..
        } => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(ResolvedTime::Date)
            .map_err(|_| invalid_time(event_id, field, text)),
        ProviderTime::Structured { .. } => Err(missing()),
    }
}

fn parse_text(event_id: &str, field: TimeField, text: &str) -> Result<ResolvedTime, MalformedEventError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MalformedEventError::MissingTime {
            event_id: event_id.to_string(),
            field,
        });
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(ResolvedTime::Date(date));
    }
    parse_date_time(trimmed)
        .map(ResolvedTime::Instant)
        .ok_or_else(|| invalid_time(event_id, field, text))
}

fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, NAIVE_DATE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn to_interval(
    event_id: &str,
    start: ResolvedTime,
    end: ResolvedTime,
) -> Result<(DateTime<Utc>, DateTime<Utc>), MalformedEventError> {
    let start_at = match start {
        ResolvedTime::Instant(instant) => instant,
        ResolvedTime::Date(date) => midnight_utc(date),
    };
    let end_at = match (start, end) {
        (_, ResolvedTime::Instant(instant)) => instant,
        (ResolvedTime::Date(start_date), ResolvedTime::Date(end_date)) if end_date <= start_date => {
            let next_day = start_date
                .succ_opt()
                .ok_or_else(|| MalformedEventError::InvalidTime {
                    event_id: event_id.to_string(),
                    field: TimeField::End,
                    value: start_date.to_string(),
                })?;
            midnight_utc(next_day)
        }
        (_, ResolvedTime::Date(end_date)) => midnight_utc(end_date),
    };
    Ok((start_at, end_at))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn invalid_time(event_id: &str, field: TimeField, value: &str) -> MalformedEventError {
    MalformedEventError::InvalidTime {
        event_id: event_id.to_string(),
        field,
        value: value.to_string(),
    }
}
