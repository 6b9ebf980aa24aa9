//! Clash detection over a user's merged events.
//!
//! # Responsibility
//! - Group transitively overlapping events into `ClashGroup`s.
//! - Suppress groups whose exact member set already has a resolution.
//!
//! # Invariants
//! - Detection is deterministic: same events and resolutions, same output.
//! - Groups are ordered by earliest member start, then earliest member id.

pub mod detector;
pub(crate) mod union_find;
