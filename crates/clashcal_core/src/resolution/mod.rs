//! Resolution of clash groups.
//!
//! # Responsibility
//! - Turn a user's "keep this one" choice into a `Resolution` value.
//! - Derive the merged calendar view that hides discarded events.
//!
//! # Invariants
//! - Resolving never deletes provider records; discard is local suppression.
//! - The engine never reads a clock; callers pass `resolved_at`.

pub mod engine;
