//! Event normalization from provider records.
//!
//! # Responsibility
//! - Decode heterogeneous provider event records.
//! - Map timed and all-day representations to one UTC interval.
//! - Absorb per-record failures as counted skips.
//!
//! # Invariants
//! - Only events satisfying `Event::validate()` leave this module.
//! - Output order follows input order; sorting belongs to the interval index.

pub mod normalizer;
pub mod provider_event;
