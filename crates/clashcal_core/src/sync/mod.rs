//! Event source boundary for sync cycles.
//!
//! # Responsibility
//! - Define the `EventSource` contract the orchestrator fetches through.
//! - Aggregate the account feeds a user has linked.
//!
//! # Invariants
//! - Sources return raw provider payloads; normalization happens downstream.
//! - Fetch failures are typed and never panic.

pub mod account_registry;
pub mod event_source;
