//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate fetch, normalization, detection and resolution per user.
//! - Keep CLI and presentation callers decoupled from engine internals.

pub mod sync_orchestrator;
pub mod sync_report;
