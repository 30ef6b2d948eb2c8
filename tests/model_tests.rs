use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use schoolhub::cache::{CacheError, ExpiringCache, RecordCache, VerifyPolicy};
use schoolhub::db::{Document, MemoryStore, RecordStore, Rule};
use schoolhub::domain::{Chat, ChatType, Record, RecordId, User, UserRole};
use schoolhub::services::{CachedRecordService, ModelError, RecordService};

/// Counts full-collection loads per collection.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    loads: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    fn loads(&self, collection: &str) -> usize {
        self.loads
            .lock()
            .unwrap()
            .get(collection)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn get_all_documents(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        *self
            .loads
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default() += 1;
        self.inner.get_all_documents(collection).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        self.inner.get_document(collection, id).await
    }

    async fn get_documents_by_rule(
        &self,
        collection: &str,
        rule: &Rule,
    ) -> anyhow::Result<Vec<Document>> {
        self.inner.get_documents_by_rule(collection, rule).await
    }

    async fn create_document(
        &self,
        collection: &str,
        document: Document,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.create_document(collection, document).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.update_document(collection, id, document).await
    }

    async fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.delete_document(collection, id).await
    }
}

/// Reports an empty list for every key and drops every write.
#[derive(Default)]
struct ForgetfulCache {
    appends: AtomicU32,
}

#[async_trait]
impl RecordCache for ForgetfulCache {
    async fn get<R: Record>(&self, _key: &str) -> Option<Vec<R>> {
        Some(Vec::new())
    }

    async fn put<R: Record>(&self, _key: &str, _records: Vec<R>, _ttl: Duration) {}

    async fn append<R: Record>(&self, _key: &str, _record: R) -> bool {
        self.appends.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn replace<R: Record>(&self, _key: &str, _id: &RecordId, _record: R) -> bool {
        false
    }

    async fn remove<R: Record>(&self, _key: &str, _id: &RecordId) -> bool {
        false
    }

    async fn clear(&self) {}

    async fn retain_only(&self, _key: &str) {}
}

const CHAT_TTL: Duration = Duration::from_secs(120);

struct Harness {
    store: Arc<CountingStore>,
    chats: CachedRecordService<Chat>,
    users: CachedRecordService<User>,
}

fn harness() -> Harness {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(ExpiringCache::new());

    Harness {
        chats: CachedRecordService::new(
            store.clone(),
            cache.clone(),
            CHAT_TTL,
            VerifyPolicy::default(),
        ),
        users: CachedRecordService::new(
            store.clone(),
            cache,
            Duration::from_secs(600),
            VerifyPolicy::default(),
        ),
        store,
    }
}

fn study_group() -> Chat {
    Chat {
        id: None,
        chat_type: ChatType::Group,
        name: "Study Group".to_string(),
        targets: vec![],
        courses: vec![],
        clubs: vec![],
        messages: vec![],
    }
}

fn grace() -> User {
    User {
        id: None,
        username: "grace".to_string(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        role: UserRole::Admin,
        school: None,
    }
}

#[tokio::test]
async fn test_create_assigns_id_and_lists_chat_once() {
    let h = harness();

    let created = h.chats.create(study_group()).await.unwrap();
    let id = created.id.clone().expect("generated id");
    assert_eq!(created.name, "Study Group");

    let all = h.chats.get_all().await.unwrap();
    assert_eq!(all.iter().filter(|c| c.id.as_ref() == Some(&id)).count(), 1);
}

#[tokio::test]
async fn test_get_by_id_after_create_returns_same_content() {
    let h = harness();

    let input = study_group();
    let created = h.chats.create(input.clone()).await.unwrap();
    let id = created.id.clone().unwrap();

    let found = h.chats.get_by_id(&id).await.unwrap().unwrap();
    let mut expected = input;
    expected.id = Some(id);
    assert_eq!(found, expected);

    assert!(
        h.chats
            .get_by_id(&RecordId::new("missing"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_update_never_duplicates_ids() {
    let h = harness();

    let first = h.chats.create(study_group()).await.unwrap();
    let mut other = study_group();
    other.name = "Exam Prep".to_string();
    h.chats.create(other).await.unwrap();
    h.chats.get_all().await.unwrap();

    let id = first.id.clone().unwrap();
    for name in ["Renamed", "Renamed again"] {
        let mut patch = study_group();
        patch.name = name.to_string();
        let updated = h.chats.update(&id, patch).await.unwrap();
        assert_eq!(updated.id.as_ref(), Some(&id));
    }

    let all = h.chats.get_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_ne!(all[0].id, all[1].id);
    let renamed = h.chats.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(renamed.name, "Renamed again");
}

#[tokio::test]
async fn test_delete_shrinks_list_by_one() {
    let h = harness();

    let keep = h.chats.create(study_group()).await.unwrap();
    let gone = h.chats.create(study_group()).await.unwrap();
    assert_eq!(h.chats.get_all().await.unwrap().len(), 2);

    let gone_id = gone.id.unwrap();
    assert!(h.chats.delete(&gone_id).await.unwrap());

    assert!(h.chats.get_by_id(&gone_id).await.unwrap().is_none());
    let all = h.chats.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, keep.id);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_controls_store_reloads() {
    let h = harness();

    h.chats.get_all().await.unwrap();
    assert_eq!(h.store.loads("chats"), 1);

    tokio::time::advance(CHAT_TTL - Duration::from_secs(1)).await;
    h.chats.get_all().await.unwrap();
    assert_eq!(h.store.loads("chats"), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    h.chats.get_all().await.unwrap();
    assert_eq!(h.store.loads("chats"), 2);

    h.chats.get_all().await.unwrap();
    assert_eq!(h.store.loads("chats"), 2);
}

#[tokio::test]
async fn test_write_invalidates_other_collections() {
    let h = harness();

    h.users.get_all().await.unwrap();
    h.users.get_all().await.unwrap();
    assert_eq!(h.store.loads("users"), 1);

    h.chats.create(study_group()).await.unwrap();

    h.users.get_all().await.unwrap();
    assert_eq!(h.store.loads("users"), 2);
}

#[tokio::test]
async fn test_write_keeps_own_collection_cached() {
    let h = harness();

    h.users.get_all().await.unwrap();
    h.users.create(grace()).await.unwrap();

    let users = h.users.get_all().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(h.store.loads("users"), 1);
}

#[tokio::test]
async fn test_update_unknown_id_is_database_error() {
    let h = harness();

    let err = h
        .chats
        .update(&RecordId::new("nope"), study_group())
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
}

#[tokio::test]
async fn test_second_delete_is_database_error() {
    let h = harness();

    let id = h.chats.create(study_group()).await.unwrap().id.unwrap();
    assert!(h.chats.delete(&id).await.unwrap());

    let err = h.chats.delete(&id).await.unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unverifiable_write_reports_cache_error() {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(ForgetfulCache::default());
    let chats: CachedRecordService<Chat, ForgetfulCache> = CachedRecordService::new(
        store.clone(),
        cache.clone(),
        CHAT_TTL,
        VerifyPolicy::default(),
    );

    let started = tokio::time::Instant::now();
    let err = chats.create(study_group()).await.unwrap_err();
    assert!(matches!(err, ModelError::Cache(_)));

    // One append from the write itself, then three re-insertions.
    assert_eq!(cache.appends.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() >= Duration::from_millis(1500));

    // The store kept the write.
    assert_eq!(store.inner.len("chats").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unverifiable_update_reports_cache_error() {
    let store = Arc::new(CountingStore::default());
    let seeded = CachedRecordService::<Chat>::new(
        store.clone(),
        Arc::new(ExpiringCache::new()),
        CHAT_TTL,
        VerifyPolicy::default(),
    );
    let id = seeded.create(study_group()).await.unwrap().id.unwrap();

    let cache = Arc::new(ForgetfulCache::default());
    let chats: CachedRecordService<Chat, ForgetfulCache> = CachedRecordService::new(
        store.clone(),
        cache.clone(),
        CHAT_TTL,
        VerifyPolicy::default(),
    );

    let mut patch = study_group();
    patch.name = "Renamed".to_string();

    let started = tokio::time::Instant::now();
    let err = chats.update(&id, patch).await.unwrap_err();
    assert!(matches!(
        err,
        ModelError::Cache(CacheError::NotVerified { ref key, retries: 3, .. }) if key == "chats"
    ));

    // Replace reports nothing to patch, so every append is a re-insertion.
    assert_eq!(cache.appends.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(1500));

    // The store kept the update.
    let stored = store.inner.get_document("chats", id.as_str()).await.unwrap().unwrap();
    assert_eq!(stored["name"], "Renamed");
}
