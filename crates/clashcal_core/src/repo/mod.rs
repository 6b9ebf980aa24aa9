//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the resolution store contract consumed by the sync orchestrator.
//! - Isolate SQLite query details from engine and service code.
//!
//! # Invariants
//! - Writes validate `Resolution::validate()` before persistence.
//! - Reads reject invalid persisted state instead of masking it.

pub mod resolution_repo;
