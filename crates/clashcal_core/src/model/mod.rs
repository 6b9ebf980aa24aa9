//! Canonical domain model for the clash engine.
//!
//! # Responsibility
//! - Define the value types shared by normalizer, index, detector and
//!   resolution engine.
//! - Keep identity by stable ids, never by object reference.
//!
//! # Invariants
//! - Every `Event` satisfies `start <= end`.
//! - A `ClashGroup` has at least two members ordered by `(start, id, account)`.
//! - A `Resolution` keeps exactly one member and discards all others.

pub mod clash;
pub mod event;
pub mod resolution;
