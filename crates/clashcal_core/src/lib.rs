//! Clash detection and resolution engine for merged multi-account calendars.
//! This crate is the single source of truth for clash invariants.

pub mod clash;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod resolution;
pub mod service;
pub mod sync;

pub use clash::detector::{detect, detect_all, detect_in_index, ResolutionMap};
pub use config::{ConfigError, EngineConfig};
pub use error::{InvalidChoiceError, MalformedEventError, StaleGroupError, TimeField};
pub use index::interval_index::{overlaps, IntervalIndex};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::clash::{ClashGroup, ClashStatus, GroupKey};
pub use model::event::{Event, EventId, EventKey, EventValidationError};
pub use model::resolution::{Resolution, ResolutionValidationError};
pub use normalize::normalizer::{
    normalize, normalize_event, normalize_events, normalize_payload, NormalizedBatch,
    SkippedEvent,
};
pub use normalize::provider_event::{ProviderEvent, ProviderPerson, ProviderTime};
pub use repo::resolution_repo::{
    InMemoryResolutionRepository, RepoError, RepoResult, ResolutionRepository,
    SqliteResolutionRepository,
};
pub use resolution::engine::{discarded_events, resolve, visible_events};
pub use service::sync_orchestrator::{SyncError, SyncOrchestrator};
pub use service::sync_report::SyncReport;
pub use sync::account_registry::{
    AccountFeed, AccountRegistry, AccountRegistryError, StaticAccountFeed,
};
pub use sync::event_source::{EventSource, FetchError, JsonFileEventSource};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
