//! Commit sequencing, rollback, notifications and the JSON backend.

mod common;

use async_trait::async_trait;
use common::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use warden_events::{Event, EventBus, EventBusError, EventBusResult, EventHandler, StoreEvent};
use warden_store::{
    Authorizable, JsonFileBackend, MemoryBackend, PrivilegeStore, ReadTransaction, StoreBackend, StoreConfig, StoreError,
    StoreResult, Tables, WriteTransaction,
};

/// Backend whose commits always fail.
struct FailingCommitBackend {
    inner: MemoryBackend,
}

struct FailingCommit {
    inner: Box<dyn WriteTransaction>,
}

#[async_trait]
impl WriteTransaction for FailingCommit {
    fn tables(&self) -> &Tables {
        self.inner.tables()
    }

    fn tables_mut(&mut self) -> &mut Tables {
        self.inner.tables_mut()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let FailingCommit { inner } = *self;
        inner.rollback();
        Err(StoreError::StoreUnavailable("disk full".to_string()))
    }

    fn rollback(self: Box<Self>) {
        let FailingCommit { inner } = *self;
        inner.rollback();
    }
}

#[async_trait]
impl StoreBackend for FailingCommitBackend {
    async fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction>> {
        Ok(Box::new(FailingCommit {
            inner: self.inner.begin_write().await?,
        }))
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn ReadTransaction>> {
        self.inner.begin_read().await
    }
}

/// Handler that always fails.
struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    async fn handle(&self, _event: Event) -> EventBusResult<()> {
        Err(EventBusError::HandlerError("unavailable".to_string()))
    }

    fn topics(&self) -> Vec<String> {
        vec!["#".to_string()]
    }
}

#[tokio::test]
async fn test_sequence_ids_increase_by_one() {
    let fx = TestFixture::new();

    let first = fx.store.create_role("r1", ADMIN_USER).await.unwrap();
    let second = fx.store.add_groups_to_role("r1", ["g1"], ADMIN_USER).await.unwrap();
    let third = fx
        .store
        .grant_privilege("r1", &collection("query", "collection1"), ADMIN_USER)
        .await
        .unwrap();

    assert_eq!(first.sequence_id, 1);
    assert_eq!(second.sequence_id, 2);
    assert_eq!(third.sequence_id, 3);
    assert_eq!(first.server_uuid, fx.store.server_uuid());
    assert_eq!(fx.store.last_sequence_id().await, 3);
}

#[tokio::test]
async fn test_failed_mutation_consumes_no_sequence_id() {
    let fx = TestFixture::new();
    fx.store.create_role("r1", ADMIN_USER).await.unwrap();

    assert!(fx.store.create_role("r1", ADMIN_USER).await.is_err());
    assert!(fx
        .store
        .grant_privilege("r2", &collection("query", "collection1"), ADMIN_USER)
        .await
        .is_err());

    let next = fx.store.create_role("r2", ADMIN_USER).await.unwrap();
    assert_eq!(next.sequence_id, 2);
}

#[tokio::test]
async fn test_queries_do_not_advance_sequence() {
    let fx = TestFixture::new();
    fx.store.create_role("r1", ADMIN_USER).await.unwrap();

    fx.store.roles_for_groups(["g1"]).await.unwrap();
    fx.store.privileges_for_roles(["r1"]).await.unwrap();
    assert_eq!(fx.store.last_sequence_id().await, 1);
}

#[tokio::test]
async fn test_denied_grant_leaves_store_unchanged() {
    let fx = TestFixture::new();
    fx.create_roles(&["r1"]).await;
    fx.store
        .add_groups_to_role("r1", [NO_GRANT_OPTION_GROUP], ADMIN_USER)
        .await
        .unwrap();

    let result = fx
        .store
        .grant_privilege("r1", &collection("all", "collection1"), NO_GRANT_OPTION_USER)
        .await;
    assert!(matches!(result, Err(StoreError::GrantDenied(_))));
    assert!(fx.store.privileges_for_roles(["r1"]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_commit_rolls_back() {
    let backend = FailingCommitBackend {
        inner: MemoryBackend::new(Duration::from_secs(5)),
    };
    let fx = TestFixture::with_backend(Arc::new(backend));

    let result = fx.store.create_role("r1", ADMIN_USER).await;
    assert!(matches!(result, Err(StoreError::StoreUnavailable(_))));
    assert_eq!(fx.store.last_sequence_id().await, 0);

    let result = fx.store.add_groups_to_role("r1", ["g1"], ADMIN_USER).await;
    assert!(matches!(result, Err(StoreError::NoSuchObject(_))));
}

#[tokio::test]
async fn test_concurrent_commits_are_totally_ordered() {
    let fx = TestFixture::new();
    let store = Arc::new(fx.store);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create_role(&format!("role{}", i), ADMIN_USER).await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().sequence_id);
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_commit_publishes_event() {
    let fx = TestFixture::new();
    let mut roles = fx.bus.subscribe("role.*").await.unwrap();
    let mut privileges = fx.bus.subscribe("privilege.#").await.unwrap();

    let created = fx.store.create_role("r1", ADMIN_USER).await.unwrap();
    let query = collection("query", "collection1");
    let granted = fx.store.grant_privilege("r1", &query, ADMIN_USER).await.unwrap();

    let event = roles.recv().await.unwrap();
    assert_eq!(event.event_type, "role.created");
    assert_eq!(event.commit, created);
    assert_eq!(event.requestor, ADMIN_USER);

    let event = privileges.recv().await.unwrap();
    assert_eq!(event.commit, granted);
    assert_eq!(
        event.parse_payload::<StoreEvent>().unwrap(),
        StoreEvent::PrivilegeGranted {
            role: "r1".to_string(),
            privilege: query,
        }
    );
    assert!(privileges.try_recv().is_none());
}

#[tokio::test]
async fn test_failed_mutation_publishes_nothing() {
    let fx = TestFixture::new();
    let mut all = fx.bus.subscribe("#").await.unwrap();

    assert!(fx.store.drop_role("r1", ADMIN_USER).await.is_err());
    assert!(all.try_recv().is_none());
}

#[tokio::test]
async fn test_handler_failure_keeps_commit() {
    let fx = TestFixture::new();
    fx.bus.register_handler(Arc::new(FailingHandler)).await.unwrap();

    fx.store.create_role("r1", ADMIN_USER).await.unwrap();
    fx.store.add_groups_to_role("r1", ["g1"], ADMIN_USER).await.unwrap();
    assert_eq!(fx.store.roles_for_groups(["g1"]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_json_backend_persists_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let backend = JsonFileBackend::open(&path, Duration::from_secs(5)).await.unwrap();
        let fx = TestFixture::with_backend(Arc::new(backend));
        fx.create_roles(&["r1"]).await;
        fx.store.add_groups_to_role("r1", ["g1"], ADMIN_USER).await.unwrap();
        fx.store
            .grant_privilege("r1", &collection("all", "collection1"), ADMIN_USER)
            .await
            .unwrap();
    }

    let backend = JsonFileBackend::open(&path, Duration::from_secs(5)).await.unwrap();
    assert_eq!(backend.path(), path.as_path());
    let tables = backend.snapshot().await;
    assert!(tables.role_exists("r1"));
    assert_eq!(tables.privilege_count(), 1);

    let fx = TestFixture::with_backend(Arc::new(backend));
    assert_eq!(
        fx.store.privileges_for_roles(["r1"]).await.unwrap(),
        HashSet::from([collection("all", "collection1")])
    );
}

#[tokio::test]
async fn test_cancelled_mutation_keeps_file_and_memory_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let backend = Arc::new(JsonFileBackend::open(&path, Duration::from_secs(5)).await.unwrap());
    let fx = TestFixture::with_backend(backend.clone());

    for i in 0..50u64 {
        let _ = tokio::time::timeout(
            Duration::from_micros(i * 20),
            fx.store.create_role(&format!("role{}", i), ADMIN_USER),
        )
        .await;

        let memory = backend.snapshot().await;
        let disk: Tables = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap(),
            Err(_) => Tables::new(),
        };
        assert_eq!(disk, memory, "iteration {}", i);
        assert_eq!(memory.role_count() as u64, fx.store.last_sequence_id().await);
    }
}

#[tokio::test]
async fn test_json_backend_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("store.json");

    let backend = JsonFileBackend::open(&path, Duration::from_secs(5)).await.unwrap();
    let fx = TestFixture::with_backend(Arc::new(backend));

    let result = fx.store.create_role("r1", ADMIN_USER).await;
    assert!(matches!(result, Err(StoreError::StoreUnavailable(_))));
    let result = fx.store.add_groups_to_role("r1", ["g1"], ADMIN_USER).await;
    assert!(matches!(result, Err(StoreError::NoSuchObject(_))));
}

#[tokio::test]
async fn test_json_backend_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{not json").unwrap();

    let result = JsonFileBackend::open(&path, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(StoreError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_from_config_with_store_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        admin_groups: vec!["Admins".to_string()],
        store_path: Some(dir.path().join("store.json")),
        user_groups: [("root".to_string(), vec!["admins".to_string()])].into_iter().collect(),
        ..StoreConfig::default()
    };

    let store = PrivilegeStore::from_config(&config).await.unwrap();
    store.create_role("r1", "root").await.unwrap();
    store
        .grant_privilege("r1", &collection("query", "collection1"), "root")
        .await
        .unwrap();
    assert!(dir.path().join("store.json").exists());

    let result = store
        .grant_privilege("r1", &collection("update", "collection1"), "nobody")
        .await;
    assert!(matches!(result, Err(StoreError::GrantDenied(_))));
}

#[tokio::test]
async fn test_rename_event_carries_stored_names() {
    let fx = TestFixture::new();
    let mut renamed = fx.bus.subscribe("privilege.renamed").await.unwrap();

    fx.store
        .rename_privilege(
            COMPONENT,
            SERVICE,
            &[Authorizable::new("Collection", "Coll1")],
            &[Authorizable::new("Collection", "NEW_Coll")],
            ADMIN_USER,
        )
        .await
        .unwrap();

    let event = renamed.recv().await.unwrap();
    match event.parse_payload::<StoreEvent>().unwrap() {
        StoreEvent::PrivilegeRenamed { old_path, new_path, .. } => {
            assert_eq!(old_path[0].name(), "coll1");
            assert_eq!(new_path[0].name(), "new_coll");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}
