use clashcal_core::db::open_db_in_memory;
use clashcal_core::{
    AccountRegistry, ClashStatus, EventKey, EventSource, FetchError, GroupKey, InMemoryResolutionRepository,
    ResolutionRepository, SqliteResolutionRepository, StaticAccountFeed, SyncError, SyncOrchestrator,
};
use serde_json::{json, Value};
use std::sync::{Arc, Barrier, Mutex};

/// Event source whose payload can be swapped between syncs.
struct ScriptedSource {
    payload: Mutex<Value>,
}

impl ScriptedSource {
    fn new(payload: Value) -> Self {
        Self {
            payload: Mutex::new(payload),
        }
    }

    fn replace(&self, payload: Value) {
        *self.payload.lock().unwrap() = payload;
    }
}

impl EventSource for ScriptedSource {
    fn fetch_events(&self, _user_id: &str) -> Result<Value, FetchError> {
        Ok(self.payload.lock().unwrap().clone())
    }
}

fn record(id: &str, account: &str, start: &str, end: &str) -> Value {
    json!({
        "id": id,
        "summary": format!("Meeting {id}"),
        "email": account,
        "start": { "dateTime": format!("2025-04-20T{start}:00Z") },
        "end": { "dateTime": format!("2025-04-20T{end}:00Z") },
    })
}

fn base_day() -> Value {
    json!([
        record("E1", "work@example.com", "09:00", "10:00"),
        record("E2", "home@example.com", "09:30", "10:30"),
        record("E3", "work@example.com", "14:00", "15:00"),
    ])
}

fn work(id: &str) -> EventKey {
    EventKey::new("work@example.com", id)
}

fn home(id: &str) -> EventKey {
    EventKey::new("home@example.com", id)
}

fn member_ids(group: &clashcal_core::ClashGroup) -> Vec<&str> {
    group.members.iter().map(|event| event.id.as_str()).collect()
}

#[test]
fn overlapping_pair_is_reported_and_distant_event_is_not() {
    let conn = open_db_in_memory().unwrap();
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        SqliteResolutionRepository::new(&conn),
    );

    let report = orchestrator.sync("alice").unwrap();
    assert_eq!(report.events.len(), 3);
    assert_eq!(report.clashes.len(), 1);
    assert_eq!(member_ids(&report.clashes[0]), vec!["E1", "E2"]);
    assert_eq!(report.clashes[0].status, ClashStatus::Unresolved);
    assert!(report.summary_message().contains("Clash 1: Meeting E1"));
}

#[test]
fn detection_is_idempotent_for_unchanged_inputs() {
    let conn = open_db_in_memory().unwrap();
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        SqliteResolutionRepository::new(&conn),
    );

    let first = orchestrator.sync("alice").unwrap();
    let second = orchestrator.sync("alice").unwrap();
    assert_eq!(first.clashes, second.clashes);
    assert_ne!(first.sync_id, second.sync_id);
}

#[test]
fn resolving_keeps_one_and_suppresses_group_on_next_sync() {
    let conn = open_db_in_memory().unwrap();
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        SqliteResolutionRepository::new(&conn),
    );

    let report = orchestrator.sync("alice").unwrap();
    let group_key = report.clashes[0].group_key.clone();
    let resolution = orchestrator.resolve("alice", &group_key, &work("E1")).unwrap();
    assert_eq!(resolution.kept, work("E1"));
    assert!(resolution.is_discarded(&home("E2")));
    assert!(orchestrator.latest_groups("alice")[0].is_resolved());

    let next = orchestrator.sync("alice").unwrap();
    assert!(next.clashes.is_empty());
    assert_eq!(next.resolved_group_count, 1);
    assert_eq!(next.summary_message(), "Your events have been synchronized successfully!");

    // Discarded, not deleted: still part of the normalized set.
    assert!(next.events.iter().any(|event| event.id == "E2"));
    assert!(!next.visible_events.iter().any(|event| event.id == "E2"));
    assert!(next.discarded_events().contains(&home("E2")));
}

#[test]
fn new_overlapping_event_invalidates_prior_resolution() {
    let conn = open_db_in_memory().unwrap();
    let source = ScriptedSource::new(base_day());
    let orchestrator = SyncOrchestrator::new(&source, SqliteResolutionRepository::new(&conn));

    let report = orchestrator.sync("alice").unwrap();
    orchestrator
        .resolve("alice", &report.clashes[0].group_key, &work("E1"))
        .unwrap();

    let mut payload = base_day();
    payload
        .as_array_mut()
        .unwrap()
        .push(record("D", "home@example.com", "09:15", "09:45"));
    source.replace(payload);

    let next = orchestrator.sync("alice").unwrap();
    assert_eq!(next.clashes.len(), 1);
    assert_eq!(member_ids(&next.clashes[0]), vec!["E1", "D", "E2"]);
    assert_eq!(next.clashes[0].status, ClashStatus::Unresolved);
    // The stale decision no longer hides E2.
    assert_eq!(next.visible_events.len(), 4);
}

#[test]
fn re_resolving_with_other_choice_reverses_discard() {
    let conn = open_db_in_memory().unwrap();
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        SqliteResolutionRepository::new(&conn),
    );

    let report = orchestrator.sync("alice").unwrap();
    let group_key = report.clashes[0].group_key.clone();
    orchestrator.resolve("alice", &group_key, &work("E1")).unwrap();
    orchestrator.sync("alice").unwrap();
    orchestrator.resolve("alice", &group_key, &home("E2")).unwrap();

    let stored = orchestrator.repo().load_resolutions("alice").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[&group_key].kept, home("E2"));

    let next = orchestrator.sync("alice").unwrap();
    assert!(next.visible_events.iter().any(|event| event.id == "E2"));
    assert!(!next.visible_events.iter().any(|event| event.id == "E1"));
}

#[test]
fn malformed_record_is_skipped_and_counted() {
    let conn = open_db_in_memory().unwrap();
    let payload = json!([
        record("A", "work@example.com", "08:00", "08:30"),
        record("B", "work@example.com", "09:00", "09:30"),
        { "id": "broken", "email": "work@example.com", "end": { "dateTime": "2025-04-20T10:00:00Z" } },
        record("C", "work@example.com", "11:00", "11:30"),
        record("D", "work@example.com", "12:00", "12:30"),
    ]);
    let orchestrator =
        SyncOrchestrator::new(ScriptedSource::new(payload), SqliteResolutionRepository::new(&conn));

    let report = orchestrator.sync("alice").unwrap();
    assert_eq!(report.events.len(), 4);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.skipped[0].event_id.as_deref(), Some("broken"));
}

#[test]
fn non_list_payload_fails_sync_with_typed_error() {
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(json!({ "items": "nope" })),
        InMemoryResolutionRepository::new(),
    );

    let err = orchestrator.sync("alice").unwrap_err();
    assert!(matches!(err, SyncError::Malformed(_)));
    // The in-flight slot is released on error.
    assert!(matches!(
        orchestrator.sync("alice"),
        Err(SyncError::Malformed(_))
    ));
}

#[test]
fn resolving_unknown_group_is_stale_and_non_member_is_invalid() {
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        InMemoryResolutionRepository::new(),
    );

    let unknown = GroupKey::from_member_keys([&work("E1"), &work("E3")]);
    let err = orchestrator.resolve("alice", &unknown, &work("E1")).unwrap_err();
    assert!(matches!(err, SyncError::StaleGroup(ref stale) if stale.group_key == unknown));

    let report = orchestrator.sync("alice").unwrap();
    let group_key = report.clashes[0].group_key.clone();
    let err = orchestrator.resolve("alice", &group_key, &work("E3")).unwrap_err();
    match err {
        SyncError::InvalidChoice(choice) => {
            assert_eq!(choice.event, work("E3"));
            assert_eq!(choice.group_key, group_key);
        }
        other => panic!("unexpected error: {other}"),
    }
    // E1 lives in the work account only.
    assert!(matches!(
        orchestrator.resolve("alice", &group_key, &home("E1")),
        Err(SyncError::InvalidChoice(_))
    ));
    assert!(orchestrator.repo().load_resolutions("alice").unwrap().is_empty());
}

#[test]
fn group_from_previous_membership_is_stale_after_resync() {
    let source = ScriptedSource::new(base_day());
    let orchestrator = SyncOrchestrator::new(&source, InMemoryResolutionRepository::new());

    let old_key = orchestrator.sync("alice").unwrap().clashes[0].group_key.clone();
    let mut payload = base_day();
    payload
        .as_array_mut()
        .unwrap()
        .push(record("D", "home@example.com", "09:15", "09:45"));
    source.replace(payload);
    orchestrator.sync("alice").unwrap();

    assert!(matches!(
        orchestrator.resolve("alice", &old_key, &work("E1")),
        Err(SyncError::StaleGroup(_))
    ));
}

#[test]
fn blank_user_id_is_rejected() {
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        InMemoryResolutionRepository::new(),
    );
    assert!(matches!(
        orchestrator.sync("   "),
        Err(SyncError::InvalidUserId)
    ));
}

/// Blocks fetches for one user until released.
struct GatedSource {
    gated_user: &'static str,
    entered: Barrier,
    release: Barrier,
}

impl EventSource for GatedSource {
    fn fetch_events(&self, user_id: &str) -> Result<Value, FetchError> {
        if user_id == self.gated_user {
            self.entered.wait();
            self.release.wait();
        }
        Ok(base_day())
    }
}

#[test]
fn concurrent_sync_for_same_user_is_rejected_other_users_proceed() {
    let source = GatedSource {
        gated_user: "alice",
        entered: Barrier::new(2),
        release: Barrier::new(2),
    };
    let orchestrator = SyncOrchestrator::new(&source, InMemoryResolutionRepository::new());

    std::thread::scope(|scope| {
        let running = scope.spawn(|| orchestrator.sync("alice"));
        source.entered.wait();

        assert!(matches!(
            orchestrator.sync("alice"),
            Err(SyncError::SyncInProgress(user)) if user == "alice"
        ));
        assert!(matches!(
            orchestrator.resolve(
                "alice",
                &GroupKey::from_member_keys([&work("E1"), &home("E2")]),
                &work("E1")
            ),
            Err(SyncError::SyncInProgress(_))
        ));
        assert_eq!(orchestrator.sync("bob").unwrap().clashes.len(), 1);

        source.release.wait();
        let report = running.join().unwrap().unwrap();
        assert_eq!(report.clashes.len(), 1);
    });

    assert!(orchestrator.sync("alice").is_ok());
}

#[test]
fn linked_account_feeds_are_merged_before_detection() {
    let unstamped = |id: &str, start: &str, end: &str| {
        json!({
            "id": id,
            "summary": id,
            "start": { "dateTime": format!("2025-04-20T{start}:00Z") },
            "end": { "dateTime": format!("2025-04-20T{end}:00Z") },
        })
    };
    let mut registry = AccountRegistry::new();
    registry
        .register(Arc::new(StaticAccountFeed::new(
            "work@example.com",
            vec![unstamped("W1", "09:00", "10:00")],
        )))
        .unwrap();
    registry
        .register(Arc::new(StaticAccountFeed::new(
            "home@example.com",
            vec![unstamped("H1", "09:30", "10:30")],
        )))
        .unwrap();
    registry.link("alice", "work@example.com").unwrap();

    let orchestrator = SyncOrchestrator::new(&registry, InMemoryResolutionRepository::new());
    let report = orchestrator.sync("alice").unwrap();
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].account_email, "work@example.com");
    assert!(report.clashes.is_empty());
    drop(orchestrator);

    registry.link("alice", "home@example.com").unwrap();
    let orchestrator = SyncOrchestrator::new(&registry, InMemoryResolutionRepository::new());
    let report = orchestrator.sync("alice").unwrap();
    assert_eq!(report.clashes.len(), 1);
    assert_eq!(member_ids(&report.clashes[0]), vec!["W1", "H1"]);
}

#[test]
fn same_id_in_two_accounts_clashes_and_resolves_per_account() {
    let conn = open_db_in_memory().unwrap();
    let payload = json!([
        record("evt1", "work@example.com", "09:00", "10:00"),
        record("evt1", "home@example.com", "09:30", "10:30"),
    ]);
    let orchestrator =
        SyncOrchestrator::new(ScriptedSource::new(payload), SqliteResolutionRepository::new(&conn));

    let report = orchestrator.sync("alice").unwrap();
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.skipped_count(), 0);
    assert_eq!(report.clashes.len(), 1);
    let group = &report.clashes[0];
    assert_eq!(member_ids(group), vec!["evt1", "evt1"]);
    assert_eq!(group.member_key("evt1"), None);

    let resolution = orchestrator
        .resolve("alice", &group.group_key, &home("evt1"))
        .unwrap();
    assert_eq!(resolution.discarded.iter().collect::<Vec<_>>(), vec![&work("evt1")]);

    let next = orchestrator.sync("alice").unwrap();
    assert!(next.clashes.is_empty());
    assert_eq!(next.visible_events.len(), 1);
    assert_eq!(next.visible_events[0].account_email, "home@example.com");
}

#[test]
fn ending_a_session_releases_the_snapshot_but_keeps_resolutions() {
    let orchestrator = SyncOrchestrator::new(
        ScriptedSource::new(base_day()),
        InMemoryResolutionRepository::new(),
    );

    let group_key = orchestrator.sync("alice").unwrap().clashes[0].group_key.clone();
    orchestrator.sync("bob").unwrap();
    orchestrator.resolve("alice", &group_key, &work("E1")).unwrap();
    assert_eq!(orchestrator.session_count(), 2);

    assert!(orchestrator.end_session("alice").unwrap());
    assert!(!orchestrator.end_session("alice").unwrap());
    assert_eq!(orchestrator.session_count(), 1);
    assert!(orchestrator.latest_groups("alice").is_empty());
    assert!(matches!(
        orchestrator.resolve("alice", &group_key, &work("E1")),
        Err(SyncError::StaleGroup(_))
    ));

    let next = orchestrator.sync("alice").unwrap();
    assert!(next.clashes.is_empty());
    assert_eq!(next.resolved_group_count, 1);
}
