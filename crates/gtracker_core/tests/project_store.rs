use gtracker_core::{
    Chain, ManualClock, MemoryStorage, Project, ProjectDraft, ProjectRepository, ProjectStatus,
    ProjectStore, ProjectType, RepoError, SlotProjectRepository, StorageBackend, StorageError,
    StorageResult, StoreError, SubmitOutcome, ValidationError, CHECK_WINDOW_MS,
};
use std::io::ErrorKind;

const NOW: i64 = 1_700_000_000_000;

type TestStore<'a> = ProjectStore<SlotProjectRepository<&'a mut MemoryStorage>, &'a ManualClock>;

fn draft(name: &str) -> ProjectDraft {
    ProjectDraft::new(name, ProjectType::Testnet, Chain::Ethereum, ProjectStatus::Active)
}

fn open<'a>(storage: &'a mut MemoryStorage, clock: &'a ManualClock) -> TestStore<'a> {
    ProjectStore::open(SlotProjectRepository::new(storage), clock)
}

fn persisted(storage: &MemoryStorage) -> Vec<Project> {
    SlotProjectRepository::new(storage.clone())
        .load_projects()
        .unwrap()
        .unwrap_or_default()
}

fn seeded(storage: &mut MemoryStorage, clock: &ManualClock, names: &[&str]) {
    let mut store = open(storage, clock);
    for name in names {
        store.add(draft(name)).unwrap();
    }
}

#[test]
fn empty_storage_loads_empty_list() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let store = open(&mut storage, &clock);
    assert!(store.is_empty());
    assert!(store.startup_warning().is_none());
}

#[test]
fn add_to_empty_list_round_trips_through_storage() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    {
        let mut store = open(&mut storage, &clock);
        let list = store.add(draft("Foo")).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Foo");
        assert_eq!(list[0].cost, 0.0);
        assert_eq!(list[0].twitter, "");
        assert_eq!(list[0].checked_until, None);
    }

    let reloaded = open(&mut storage, &clock);
    assert_eq!(reloaded.get_all().len(), 1);
    assert_eq!(reloaded.get_all()[0].name, "Foo");
    assert_eq!(reloaded.get_all()[0].kind, ProjectType::Testnet);
}

#[test]
fn add_appends_at_end_and_allows_duplicate_names() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let mut store = open(&mut storage, &clock);

    store.add(draft("Foo")).unwrap();
    store.add(draft("Bar")).unwrap();
    let before = store.len();
    let list = store.add(draft("Foo")).unwrap();

    assert_eq!(list.len(), before + 1);
    assert_eq!(list.last().unwrap().name, "Foo");
    assert_ne!(list[0].id, list[2].id);
}

#[test]
fn negative_cost_is_rejected_without_mutation() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["Foo"]);
    let snapshot = storage.get("projects").unwrap();

    let mut store = open(&mut storage, &clock);
    let mut bad = draft("Foo");
    bad.cost = -5.0;

    assert_eq!(store.validate(&bad), Err(ValidationError::InvalidCost));
    let err = store.update(0, bad.clone()).unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::InvalidCost)));
    assert_eq!(err.user_message(), "Cost must not be negative");
    let err = store.add(bad).unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::InvalidCost)));

    assert_eq!(store.len(), 1);
    assert_eq!(store.get_all()[0].cost, 0.0);
    drop(store);
    assert_eq!(storage.get("projects").unwrap(), snapshot);
}

#[test]
fn non_http_links_are_rejected() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let mut store = open(&mut storage, &clock);

    for link in ["x.com/foo", "www.foo.xyz", "ftp://foo.xyz", "https://", " https://a"] {
        let mut bad = draft("Foo");
        bad.twitter = link.to_string();
        let err = store.add(bad).unwrap_err();
        assert!(
            matches!(err, StoreError::Validation(ValidationError::InvalidTwitterUrl)),
            "{link}"
        );

        let mut bad = draft("Foo");
        bad.website = link.to_string();
        let err = store.submit(bad, None).unwrap_err();
        assert!(
            matches!(err, StoreError::Validation(ValidationError::InvalidWebsiteUrl)),
            "{link}"
        );
        assert!(err.user_message().contains("must start with http:// or https://"));
    }
    assert!(store.is_empty());
}

#[test]
fn update_replaces_in_place_and_keeps_id() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A", "B", "C"]);

    let mut store = open(&mut storage, &clock);
    let original_id = store.get_all()[1].id;
    let mut edited = store.get_all()[1].to_draft();
    edited.name = "B2".to_string();
    edited.status = ProjectStatus::EarlyAccess;
    edited.cost = 12.5;
    edited.website = "https://b.example".to_string();

    let outcome = store.submit(edited, Some(1)).unwrap();
    assert_eq!(outcome, SubmitOutcome::Updated { index: 1 });
    let names: Vec<_> = store.get_all().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["A", "B2", "C"]);
    assert_eq!(store.get_all()[1].id, original_id);
    drop(store);

    let reloaded = persisted(&storage);
    assert_eq!(reloaded[1].status, ProjectStatus::EarlyAccess);
    assert_eq!(reloaded[1].cost, 12.5);
    assert_eq!(reloaded[1].id, original_id);
}

#[test]
fn out_of_range_indices_fail_without_mutation() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A"]);
    let mut store = open(&mut storage, &clock);

    let err = store.update(1, draft("X")).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { index: 1, len: 1 }));
    let err = store.toggle_check(5).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { index: 5, len: 1 }));
    let err = store.delete(1, |_| true).unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange { .. }));
    assert!(store.is_checked(3).is_err());

    assert_eq!(store.len(), 1);
    assert_eq!(store.get_all()[0].name, "A");
}

#[test]
fn delete_requires_confirmation() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A", "B", "C"]);
    let mut store = open(&mut storage, &clock);

    let mut prompted = None;
    let declined = store
        .delete(0, |project| {
            prompted = Some(project.name.clone());
            false
        })
        .unwrap();
    assert!(declined.is_none());
    assert_eq!(prompted.as_deref(), Some("A"));
    assert_eq!(store.len(), 3);

    let removed = store.delete(0, |_| true).unwrap().unwrap();
    assert_eq!(removed.name, "A");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get_all()[0].name, "B");
    assert_eq!(store.position(removed.id), None);
    drop(store);

    let names: Vec<_> = persisted(&storage).into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["B", "C"]);
}

#[test]
fn toggle_check_twice_is_its_own_inverse() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A", "B"]);
    let mut store = open(&mut storage, &clock);
    let before = store.get_all().to_vec();

    let checked = store.toggle_check(0).unwrap();
    assert_eq!(checked.checked_until, Some(NOW + CHECK_WINDOW_MS));
    assert!(store.is_checked(0).unwrap());

    let unchecked = store.toggle_check(0).unwrap();
    assert_eq!(unchecked.checked_until, Some(0));
    assert!(!store.is_checked(0).unwrap());

    assert_eq!(store.len(), before.len());
    let mut expected = before[0].clone();
    expected.checked_until = Some(0);
    assert_eq!(store.get_all()[0], expected);
    assert_eq!(store.get_all()[1], before[1]);
}

#[test]
fn checked_state_expires_without_mutation() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A"]);
    let mut store = open(&mut storage, &clock);

    store.toggle_check(0).unwrap();
    clock.advance(CHECK_WINDOW_MS - 1);
    assert!(store.is_checked(0).unwrap());

    clock.advance(1);
    assert!(!store.is_checked(0).unwrap());
    assert_eq!(store.get_all()[0].checked_until, Some(NOW + CHECK_WINDOW_MS));

    // Expired records re-check instead of resetting.
    let rechecked = store.toggle_check(0).unwrap();
    assert_eq!(rechecked.checked_until, Some(clock_now(&clock) + CHECK_WINDOW_MS));
}

#[test]
fn record_checked_one_second_ago_reads_unchecked() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let mut store = open(&mut storage, &clock);
    let mut value = draft("A");
    value.checked_until = Some(NOW - 1_000);
    store.add(value).unwrap();

    assert!(!store.is_checked(0).unwrap());
    assert!(!gtracker_core::is_checked(&store.get_all()[0], NOW));
}

#[test]
fn load_after_each_mutation_matches_memory() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let mut store = open(&mut storage, &clock);

    store.add(draft("A")).unwrap();
    store.add(draft("B")).unwrap();
    let in_memory = store.get_all().to_vec();
    assert_eq!(store.load().unwrap(), in_memory.as_slice());

    store.toggle_check(1).unwrap();
    let in_memory = store.get_all().to_vec();
    assert_eq!(store.load().unwrap(), in_memory.as_slice());

    store.delete(0, |_| true).unwrap();
    let in_memory = store.get_all().to_vec();
    assert_eq!(store.load().unwrap(), in_memory.as_slice());
}

#[test]
fn malformed_storage_is_reported_and_quarantined() {
    let mut storage = MemoryStorage::new();
    storage.set("projects", "{not json").unwrap();
    let clock = ManualClock::new(NOW);

    let mut store = open(&mut storage, &clock);
    assert!(store.is_empty());
    let warning = store.startup_warning().unwrap().to_string();
    assert!(warning.contains("failed to read projects"), "{warning}");

    store.add(draft("Fresh")).unwrap();
    drop(store);

    assert_eq!(
        storage.get("projects.corrupt").unwrap().as_deref(),
        Some("{not json")
    );
    assert_eq!(persisted(&storage).len(), 1);
}

#[test]
fn load_reports_storage_read_error() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A"]);

    let mut store = open(&mut storage, &clock);
    assert_eq!(store.len(), 1);
    drop(store);

    storage.set("projects", "[1, 2]").unwrap();
    let mut store = ProjectStore::new(SlotProjectRepository::new(&mut storage), &clock);
    let err = store.load().unwrap_err();
    assert!(matches!(err, StoreError::StorageRead(_)));
    assert!(store.is_empty());
}

/// Memory slots whose reads can be switched to fail like a broken disk.
struct UnreadableStorage {
    inner: MemoryStorage,
    reads_fail: bool,
}

impl StorageBackend for UnreadableStorage {
    fn kind(&self) -> &'static str {
        "unreadable"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        if self.reads_fail {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: ErrorKind::PermissionDenied.into(),
            });
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn unreadable_slot_is_never_overwritten_without_backup() {
    let mut inner = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut inner, &clock, &["Kept"]);
    let original = inner.get("projects").unwrap();

    let storage = UnreadableStorage {
        inner,
        reads_fail: true,
    };
    let mut store = ProjectStore::open(SlotProjectRepository::new(storage), &clock);
    assert!(store.is_empty());
    assert!(store.startup_warning().is_some());
    assert!(store.is_write_blocked());

    let err = store.add(draft("Fresh")).unwrap_err();
    assert!(matches!(err, StoreError::StorageRead(RepoError::Unpreserved)));
    assert!(err.user_message().contains("backed up"));
    let err = store.submit(draft("Fresh"), None).unwrap_err();
    assert!(matches!(err, StoreError::StorageRead(RepoError::Unpreserved)));
    assert!(store.flush().is_err());
    assert!(store.is_empty());

    store.repository_mut().storage_mut().reads_fail = false;
    assert_eq!(store.repository_mut().storage_mut().inner.get("projects").unwrap(), original);
    assert_eq!(store.load().unwrap().len(), 1);
    assert!(!store.is_write_blocked());
    store.add(draft("Fresh")).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn failed_load_blocks_writes_until_reload() {
    let mut storage = MemoryStorage::new();
    storage.set("projects", "{oops").unwrap();
    let clock = ManualClock::new(NOW);
    let mut store = ProjectStore::new(SlotProjectRepository::new(&mut storage), &clock);

    assert!(store.load().is_err());
    assert!(store.add(draft("A")).is_err());

    store.repository_mut().storage_mut().set("projects", "[]").unwrap();
    store.load().unwrap();
    store.add(draft("A")).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn reopening_malformed_slot_keeps_a_single_backup() {
    let mut storage = MemoryStorage::new();
    storage.set("projects", "{not json").unwrap();
    let clock = ManualClock::new(NOW);

    for _ in 0..3 {
        let store = open(&mut storage, &clock);
        assert!(store.startup_warning().is_some());
        assert!(!store.is_write_blocked());
    }

    assert_eq!(
        storage.get("projects.corrupt").unwrap().as_deref(),
        Some("{not json")
    );
    assert_eq!(storage.get("projects.corrupt.1").unwrap(), None);
}

#[test]
fn legacy_ids_stay_stable_across_reopen() {
    let mut storage = MemoryStorage::new();
    storage
        .set(
            "projects",
            r#"[{"name":"Old","type":"Wallet","chain":"OP","status":"Claim","cost":"3"}]"#,
        )
        .unwrap();
    let clock = ManualClock::new(NOW);

    let first = open(&mut storage, &clock).get_all()[0].id;
    let second = open(&mut storage, &clock).get_all()[0].id;
    assert_eq!(first, second);

    let mut store = open(&mut storage, &clock);
    store.toggle_check(0).unwrap();
    assert_eq!(store.get_all()[0].id, first);
    drop(store);
    assert_eq!(persisted(&storage)[0].id, first);
}

#[test]
fn failed_write_keeps_change_and_marks_dirty() {
    let mut storage = MemoryStorage::with_quota(64);
    let clock = ManualClock::new(NOW);
    let mut store = open(&mut storage, &clock);

    let err = store.add(draft("A project with a long enough name")).unwrap_err();
    assert!(matches!(err, StoreError::StorageWrite(_)));
    assert!(err.user_message().contains("may be lost"));
    assert_eq!(store.len(), 1);
    assert!(store.is_dirty());
    assert_eq!(store.get_all()[0].name, "A project with a long enough name");

    let err = store.toggle_check(0).unwrap_err();
    assert!(matches!(err, StoreError::StorageWrite(_)));
    assert!(store.is_checked(0).unwrap());
}

#[test]
fn flush_persists_retained_change_once_storage_recovers() {
    let mut storage = MemoryStorage::with_quota(16);
    let clock = ManualClock::new(NOW);
    {
        let mut store = open(&mut storage, &clock);
        assert!(store.add(draft("Foo")).is_err());
        assert!(store.flush().is_err());
        assert!(store.is_dirty());

        store.repository_mut().storage_mut().set_quota(None);
        store.flush().unwrap();
        assert!(!store.is_dirty());
    }

    let reloaded = persisted(&storage);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].name, "Foo");
}

#[test]
fn position_tracks_ids_across_deletes() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    seeded(&mut storage, &clock, &["A", "B", "C"]);
    let mut store = open(&mut storage, &clock);

    let c_id = store.get_all()[2].id;
    assert_eq!(store.position(c_id), Some(2));
    store.delete(0, |_| true).unwrap();
    assert_eq!(store.position(c_id), Some(1));
}

fn clock_now(clock: &ManualClock) -> i64 {
    use gtracker_core::Clock;
    clock.now_ms()
}

#[test]
fn long_digit_costs_reload_bit_identical() {
    let mut storage = MemoryStorage::new();
    let clock = ManualClock::new(NOW);
    let costs = [0.1 + 0.2, 123_456.789_012_345_67, 9.876_543_210_987_654e-7, 1e21 / 3.0];
    {
        let mut store = open(&mut storage, &clock);
        for cost in costs {
            let mut value = draft("Precise");
            value.cost = cost;
            store.add(value).unwrap();
        }
    }

    let reloaded = persisted(&storage);
    for (project, cost) in reloaded.iter().zip(costs) {
        assert_eq!(project.cost.to_bits(), cost.to_bits());
    }
}
