//! Interval indexing over a user's merged events.
//!
//! # Responsibility
//! - Keep events in a deterministic `(start, id, account)` order.
//! - Answer overlap queries with half-open interval semantics.
//!
//! # Invariants
//! - Identical inputs always produce identical orderings.
//! - A rebuild replaces the whole indexed set; no stale entries survive.

pub mod interval_index;
