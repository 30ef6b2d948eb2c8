//! In-process record store.
//!
//! Same semantics as the `SeaORM` store, without a database. Documents keep
//! insertion order per collection.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Document, RecordStore, Rule, document_id, merge_documents};
use crate::domain::RecordId;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all_documents(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d) == Some(id)))
            .cloned())
    }

    async fn get_documents_by_rule(&self, collection: &str, rule: &Rule) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().filter(|d| rule.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_document(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<Option<Document>> {
        let id = RecordId::generate();
        document.insert("id".to_string(), Value::String(id.into()));

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());

        Ok(Some(document))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(slot) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)))
        else {
            return Ok(None);
        };

        let merged = merge_documents(std::mem::take(slot), document);
        *slot = merged.clone();
        Ok(Some(merged))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };

        Ok(docs
            .iter()
            .position(|d| document_id(d) == Some(id))
            .map(|index| docs.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let store = MemoryStore::new();
        let a = store
            .create_document("users", doc(json!({"id": "mine", "username": "a"})))
            .await
            .unwrap()
            .unwrap();
        let b = store
            .create_document("users", doc(json!({"username": "b"})))
            .await
            .unwrap()
            .unwrap();

        assert_ne!(document_id(&a), Some("mine"));
        assert_ne!(document_id(&a), document_id(&b));
        assert_eq!(store.len("users").await, 2);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let store = MemoryStore::new();
        assert!(
            store
                .update_document("users", "nope", doc(json!({"username": "x"})))
                .await
                .unwrap()
                .is_none()
        );

        let created = store
            .create_document("users", doc(json!({"username": "a"})))
            .await
            .unwrap()
            .unwrap();
        let id = document_id(&created).unwrap().to_string();

        let updated = store
            .update_document("users", &id, doc(json!({"username": "b"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["username"], "b");
        assert_eq!(document_id(&updated), Some(id.as_str()));

        assert!(store.delete_document("users", &id).await.unwrap().is_some());
        assert!(store.delete_document("users", &id).await.unwrap().is_none());
        assert!(store.is_empty("users").await);
    }
}
