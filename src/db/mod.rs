use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod memory;
pub mod migrator;
pub mod population;
pub mod repositories;
pub mod rule;

pub use memory::MemoryStore;
pub use rule::{Rule, RuleError};

/// A stored record as a JSON object. The `id` key is always present on
/// documents coming out of a store.
pub type Document = Map<String, Value>;

/// Persistence for record collections.
///
/// Every operation answers `Ok(None)` when the store could not perform it
/// (unknown id, nothing written); `Err` is reserved for transport failures.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_all_documents(&self, collection: &str) -> Result<Vec<Document>>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn get_documents_by_rule(&self, collection: &str, rule: &Rule) -> Result<Vec<Document>>;

    /// Persists a new document. The store assigns the id; any `id` in the
    /// input is ignored.
    async fn create_document(&self, collection: &str, document: Document)
    -> Result<Option<Document>>;

    /// Merges `document` over the stored one and returns the result.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<Option<Document>>;

    /// Removes a document and returns what was removed.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;
}

/// Shallow merge used by updates: top-level fields of `patch` replace those of
/// `existing`; the id never changes.
#[must_use]
pub fn merge_documents(mut existing: Document, patch: Document) -> Document {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        existing.insert(key, value);
    }
    existing
}

#[must_use]
pub fn document_id(document: &Document) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// `SeaORM`-backed record store.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every connection to an in-memory SQLite database sees its own empty
        // database, so the pool must stay at a single connection.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(false);

        if !in_memory {
            opt.max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn document_repo(&self) -> repositories::document::DocumentRepository {
        repositories::document::DocumentRepository::new(self.conn.clone())
    }
}

#[async_trait]
impl RecordStore for Store {
    async fn get_all_documents(&self, collection: &str) -> Result<Vec<Document>> {
        self.document_repo().list(collection).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.document_repo().get(collection, id).await
    }

    async fn get_documents_by_rule(&self, collection: &str, rule: &Rule) -> Result<Vec<Document>> {
        let documents = self.document_repo().list(collection).await?;
        if rule.is_empty() {
            return Ok(documents);
        }
        Ok(documents.into_iter().filter(|d| rule.matches(d)).collect())
    }

    async fn create_document(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<Option<Document>> {
        self.document_repo().insert(collection, document).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<Option<Document>> {
        self.document_repo().update(collection, id, document).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.document_repo().remove(collection, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_keeps_id_and_unpatched_fields() {
        let existing = doc(json!({"id": "c1", "name": "Old", "targets": ["u1"]}));
        let patch = doc(json!({"id": "other", "name": "New"}));

        let merged = merge_documents(existing, patch);
        assert_eq!(merged["id"], "c1");
        assert_eq!(merged["name"], "New");
        assert_eq!(merged["targets"], json!(["u1"]));
    }

    #[tokio::test]
    async fn sqlite_store_crud() {
        let store = Store::new("sqlite::memory:").await.unwrap();

        let created = store
            .create_document("chats", doc(json!({"id": "ignored", "name": "Study Group"})))
            .await
            .unwrap()
            .unwrap();
        let id = document_id(&created).unwrap().to_string();
        assert_ne!(id, "ignored");

        let all = store.get_all_documents("chats").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.get_all_documents("clubs").await.unwrap().is_empty());

        let updated = store
            .update_document("chats", &id, doc(json!({"name": "Renamed"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "Renamed");
        assert_eq!(document_id(&updated), Some(id.as_str()));

        let rule = Rule::try_from(json!({"name": "Renamed"})).unwrap();
        let found = store.get_documents_by_rule("chats", &rule).await.unwrap();
        assert_eq!(found.len(), 1);

        let everything = store
            .get_documents_by_rule("chats", &Rule::default())
            .await
            .unwrap();
        assert_eq!(everything.len(), 1);

        assert!(store.delete_document("chats", &id).await.unwrap().is_some());
        assert!(store.delete_document("chats", &id).await.unwrap().is_none());
        assert!(
            store
                .update_document("chats", &id, doc(json!({"name": "x"})))
                .await
                .unwrap()
                .is_none()
        );
    }
}
