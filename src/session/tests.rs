use crate::env;
use crate::error::{SessionError, StoreError};
use crate::identity::{Address, Credential, Identity, Role};
use crate::session::*;
use crate::store::{CredentialStore, FileStore, MemoryStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Helper function to create a complete test identity
fn create_test_identity(id: u64, token: &str) -> Identity {
    let mut identity = Identity::new(id, "Maria Souza", "123.456.789-00")
        .with_role(Role::Member)
        .with_credential(Credential::new(token).unwrap());
    identity.phone = "(41) 99999-0000".to_string();
    identity.registration = "08/12345".to_string();
    identity.valid_until = "2026-12-31".to_string();
    identity.birth_date = "1990-05-01".to_string();
    identity.validated = true;
    identity.address = Some(Address {
        street: "Rua XV de Novembro".to_string(),
        number: "100".to_string(),
        city: "Curitiba".to_string(),
        state: "PR".to_string(),
        ..Default::default()
    });
    identity
}

fn create_manager(store: Arc<dyn CredentialStore>) -> SessionManager {
    SessionManager::new(store, SessionManagerConfig::default())
}

/// Store whose writes can be switched to fail, hang or wait on a gate
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_credential_writes: AtomicBool,
    hang_credential_writes: AtomicBool,
    fail_removes: AtomicBool,
    /// Writes wait while a test holds this for writing
    write_gate: tokio::sync::RwLock<()>,
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        if key == env::store::CREDENTIAL_KEY && self.hang_credential_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let credential_failure =
            key == env::store::CREDENTIAL_KEY && self.fail_credential_writes.load(Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) || credential_failure {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write(key, value).await
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.read(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("read-only")));
        }
        self.inner.remove(key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test]
async fn test_session_round_trip_across_cold_start() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    let identity = create_test_identity(42, "abc123");

    {
        let manager = create_manager(Arc::new(FileStore::new(&path)));
        let update = manager.establish_session(identity.clone()).await.unwrap();
        assert!(update.durability.is_persisted());
    }

    let restarted = create_manager(Arc::new(FileStore::new(&path)));
    assert_eq!(restarted.state().await, SessionState::Stale);
    assert_eq!(restarted.current_identity().await, Some(identity.clone()));
    assert_eq!(restarted.state().await, SessionState::Active);
    assert_eq!(
        restarted.credential().await.map(|c| c.expose().to_string()),
        Some("abc123".to_string())
    );
}

#[tokio::test]
async fn test_identity_and_credential_stored_under_separate_keys() {
    let store = Arc::new(MemoryStore::new());
    let manager = create_manager(store.clone());
    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();

    let stored_identity = store.read(env::store::IDENTITY_KEY).await.unwrap().unwrap();
    assert!(!stored_identity.contains("abc123"));
    let envelope: StoredIdentity = serde_json::from_str(&stored_identity).unwrap();
    assert_eq!(envelope.format_version, env::store::IDENTITY_FORMAT_VERSION);
    assert!(envelope.identity.credential.is_none());

    assert_eq!(
        store.read(env::store::CREDENTIAL_KEY).await.unwrap().as_deref(),
        Some("abc123")
    );
}

#[tokio::test]
async fn test_identity_without_credential_is_absent() {
    let store = Arc::new(MemoryStore::new());
    {
        let manager = create_manager(store.clone());
        manager
            .establish_session(create_test_identity(42, "abc123"))
            .await
            .unwrap();
    }
    store.remove(env::store::CREDENTIAL_KEY).await.unwrap();

    let restarted = create_manager(store.clone());
    assert_eq!(restarted.current_identity().await, None);
    assert_eq!(restarted.credential().await, None);
    assert_eq!(restarted.state().await, SessionState::Absent);
}

#[tokio::test]
async fn test_credential_without_identity_is_absent() {
    let store = Arc::new(MemoryStore::new());
    store
        .write(env::store::CREDENTIAL_KEY, "orphan")
        .await
        .unwrap();

    let manager = create_manager(store);
    assert_eq!(manager.current_identity().await, None);
    assert_eq!(manager.auth_context().await, None);
}

#[tokio::test]
async fn test_corrupt_identity_is_absent() {
    let store = Arc::new(MemoryStore::new());
    store
        .write(env::store::IDENTITY_KEY, "{not json")
        .await
        .unwrap();
    store
        .write(env::store::CREDENTIAL_KEY, "abc123")
        .await
        .unwrap();

    let manager = create_manager(store);
    assert_eq!(manager.current_identity().await, None);
}

#[tokio::test]
async fn test_unknown_format_version_is_absent() {
    let store = Arc::new(MemoryStore::new());
    let envelope = serde_json::json!({
        "format_version": 99,
        "saved_at": "2026-01-01T00:00:00Z",
        "identity": create_test_identity(42, "abc123").without_credential(),
    });
    store
        .write(env::store::IDENTITY_KEY, &envelope.to_string())
        .await
        .unwrap();
    store
        .write(env::store::CREDENTIAL_KEY, "abc123")
        .await
        .unwrap();

    let manager = create_manager(store);
    assert_eq!(manager.current_identity().await, None);
}

#[tokio::test]
async fn test_establish_requires_credential() {
    let manager = create_manager(Arc::new(MemoryStore::new()));
    let err = manager
        .establish_session(Identity::new(1, "Sem Hash", "000"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidIdentity(_)));
    assert_eq!(manager.current_identity().await, None);
}

#[tokio::test]
async fn test_clear_session_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let manager = create_manager(store.clone());

    assert!(manager.clear_session().await.is_persisted());
    assert!(manager.clear_session().await.is_persisted());
    assert_eq!(manager.current_identity().await, None);

    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();
    assert!(manager.clear_session().await.is_persisted());
    assert!(manager.clear_session().await.is_persisted());

    assert_eq!(manager.current_identity().await, None);
    assert_eq!(manager.state().await, SessionState::Absent);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_store_write_failure_keeps_process_session() {
    let store = Arc::new(FlakyStore::default());
    store.fail_writes.store(true, Ordering::SeqCst);
    let manager = create_manager(store.clone());

    let identity = create_test_identity(42, "abc123");
    let update = manager.establish_session(identity.clone()).await.unwrap();

    assert!(matches!(update.durability, Durability::MemoryOnly { .. }));
    assert_eq!(manager.current_identity().await, Some(identity));

    // The next cold start finds nothing and forces a new login
    let restarted = create_manager(store);
    assert_eq!(restarted.current_identity().await, None);
}

#[tokio::test]
async fn test_partial_write_is_rolled_back() {
    let store = Arc::new(FlakyStore::default());
    let manager = create_manager(store.clone());
    manager
        .establish_session(create_test_identity(1, "old-token"))
        .await
        .unwrap();

    store.fail_credential_writes.store(true, Ordering::SeqCst);
    let update = manager
        .establish_session(create_test_identity(2, "new-token"))
        .await
        .unwrap();
    assert!(!update.durability.is_persisted());

    // Neither the new identity with the old credential nor a half session remains
    assert!(!store.inner.contains_key(env::store::IDENTITY_KEY));
    assert!(!store.inner.contains_key(env::store::CREDENTIAL_KEY));
    assert_eq!(manager.current_identity().await.map(|i| i.id), Some(2));
}

#[tokio::test]
async fn test_cancelled_save_never_pairs_new_identity_with_old_credential() {
    let store = Arc::new(FlakyStore::default());
    let manager = create_manager(store.clone());
    manager
        .establish_session(create_test_identity(1, "token-A"))
        .await
        .unwrap();

    store.hang_credential_writes.store(true, Ordering::SeqCst);
    let mut second = create_test_identity(2, "token-B");
    second.name = "Bruno".to_string();
    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        manager.establish_session(second),
    )
    .await;
    assert!(outcome.is_err(), "save should still be pending");

    assert!(!store.inner.contains_key(env::store::CREDENTIAL_KEY));

    let restarted = create_manager(store.clone());
    assert_eq!(restarted.current_identity().await, None);
    assert_eq!(restarted.credential().await, None);
    assert_eq!(restarted.state().await, SessionState::Absent);
}

#[tokio::test]
async fn test_clear_failure_is_reported() {
    let store = Arc::new(FlakyStore::default());
    let manager = create_manager(store.clone());
    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();

    store.fail_removes.store(true, Ordering::SeqCst);
    let durability = manager.clear_session().await;
    assert!(matches!(durability, Durability::MemoryOnly { reason } if reason.contains("read-only")));
    assert_eq!(manager.current_identity().await, None);
}

#[tokio::test]
async fn test_replace_identity_keeps_credential() {
    let manager = create_manager(Arc::new(MemoryStore::new()));
    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();

    let mut edited = create_test_identity(42, "unused").without_credential();
    edited.phone = "(41) 98888-1111".to_string();

    let update = manager.replace_identity(edited).await.unwrap();
    assert_eq!(update.identity.phone, "(41) 98888-1111");
    assert_eq!(
        manager.credential().await.map(|c| c.expose().to_string()),
        Some("abc123".to_string())
    );
}

#[tokio::test]
async fn test_replace_identity_rejects_other_principal_and_missing_session() {
    let manager = create_manager(Arc::new(MemoryStore::new()));

    let err = manager
        .replace_identity(create_test_identity(42, "abc123"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::SessionInvalid);

    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();
    let err = manager
        .replace_identity(create_test_identity(7, "abc123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidIdentity(_)));
}

#[tokio::test]
async fn test_update_photo_preserves_other_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    let original = create_test_identity(42, "abc123");

    let manager = create_manager(Arc::new(FileStore::new(&path)));
    manager.establish_session(original.clone()).await.unwrap();
    manager
        .update_photo(Some("https://cdn.example.org/42.jpg".to_string()))
        .await
        .unwrap();

    let restarted = create_manager(Arc::new(FileStore::new(&path)));
    let restored = restarted.current_identity().await.unwrap();
    assert_eq!(restored.photo.as_deref(), Some("https://cdn.example.org/42.jpg"));
    assert_eq!(
        Identity {
            photo: None,
            ..restored
        },
        original
    );
}

#[tokio::test]
async fn test_update_photo_applies_on_top_of_queued_replacement() {
    let store = Arc::new(FlakyStore::default());
    let manager = Arc::new(create_manager(store.clone()));
    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();

    // Hold store writes so each change queues on the session lock
    let gate = store.write_gate.write().await;

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut identity = create_test_identity(42, "abc123");
            identity.phone = "(41) 98888-1111".to_string();
            manager.replace_identity(identity).await.unwrap();
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let rename = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut identity = create_test_identity(42, "abc123");
            identity.phone = "(41) 98888-1111".to_string();
            identity.name = "Maria Souza Lima".to_string();
            manager.replace_identity(identity).await.unwrap();
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let photo = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .update_photo(Some("https://cdn.example.org/42.jpg".to_string()))
                .await
                .unwrap();
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    drop(gate);
    first.await.unwrap();
    rename.await.unwrap();
    photo.await.unwrap();

    let current = manager.current_identity().await.unwrap();
    assert_eq!(current.name, "Maria Souza Lima");
    assert_eq!(current.photo.as_deref(), Some("https://cdn.example.org/42.jpg"));

    let restored = create_manager(store).current_identity().await.unwrap();
    assert_eq!(restored, current);
}

#[tokio::test]
async fn test_subscriber_receives_new_identity_once() {
    let manager = create_manager(Arc::new(MemoryStore::new()));
    let received: Arc<Mutex<Vec<Option<u64>>>> = Arc::default();

    let sink = Arc::clone(&received);
    manager
        .publisher()
        .subscribe(move |identity| sink.lock().unwrap().push(identity.map(|i| i.id)));

    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.as_slice(), &[None, Some(42)]);
    assert_eq!(received.iter().filter(|id| **id == Some(42)).count(), 1);
}

#[tokio::test]
async fn test_subscriber_after_clear_starts_with_absent() {
    let manager = create_manager(Arc::new(MemoryStore::new()));
    manager
        .establish_session(create_test_identity(42, "abc123"))
        .await
        .unwrap();
    manager.clear_session().await;

    let received: Arc<Mutex<Vec<Option<u64>>>> = Arc::default();
    let sink = Arc::clone(&received);
    let id = manager
        .publisher()
        .subscribe(move |identity| sink.lock().unwrap().push(identity.map(|i| i.id)));

    assert_eq!(received.lock().unwrap().as_slice(), &[None]);

    assert!(manager.publisher().unsubscribe(id));
    assert!(!manager.publisher().unsubscribe(id));
    manager
        .establish_session(create_test_identity(43, "def456"))
        .await
        .unwrap();
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_restore_publishes_restored_identity() {
    let store = Arc::new(MemoryStore::new());
    {
        let manager = create_manager(store.clone());
        manager
            .establish_session(create_test_identity(42, "abc123"))
            .await
            .unwrap();
    }

    let restarted = create_manager(store);
    let mut changes = restarted.publisher().watch();
    assert!(changes.borrow().is_none());

    restarted.current_identity().await;
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().as_ref().map(|i| i.id), Some(42));
}

#[tokio::test]
async fn test_repeated_identical_publish_is_coalesced() {
    let publisher = IdentityPublisher::new();
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    publisher.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let identity = create_test_identity(1, "t");
    assert!(publisher.publish(Some(identity.clone())));
    assert!(!publisher.publish(Some(identity)));
    assert!(publisher.publish(None));

    // initial delivery + two changes
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(publisher.subscriber_count(), 1);
}

#[tokio::test]
async fn test_concurrent_establish_leaves_consistent_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    let manager = Arc::new(create_manager(Arc::new(FileStore::new(&path))));

    let mut handles = Vec::new();
    for id in 1..=8u64 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .establish_session(create_test_identity(id, &format!("token-{}", id)))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let in_memory = manager.current_identity().await.unwrap();
    let restarted = create_manager(Arc::new(FileStore::new(&path)));
    let on_disk = restarted.current_identity().await.unwrap();

    assert_eq!(in_memory, on_disk);
    assert_eq!(
        on_disk.credential.unwrap().expose(),
        format!("token-{}", on_disk.id)
    );
}
