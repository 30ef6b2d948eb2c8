//! Cached implementation of the `RecordService` trait.

use crate::cache::{ExpiringCache, RecordCache, VerifyPolicy, refresh_with, verify_in_cache};
use crate::db::population::{dehydrate, populate, populate_one};
use crate::db::{Document, RecordStore, Rule};
use crate::domain::{Record, RecordId};
use crate::services::record_service::{ModelError, RecordService};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Serves one record type from the shared cache, backed by a record store.
///
/// Every write persists first, then evicts every other collection from the
/// cache, patches this collection's own entry and (for create and update)
/// verifies that the written record is visible in it.
pub struct CachedRecordService<R, C = ExpiringCache> {
    store: Arc<dyn RecordStore>,
    cache: Arc<C>,
    ttl: Duration,
    verify: VerifyPolicy,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, C: RecordCache> CachedRecordService<R, C> {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<C>,
        ttl: Duration,
        verify: VerifyPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            verify,
            _record: PhantomData,
        }
    }

    fn encode(record: &R) -> Result<Document, ModelError> {
        let value = serde_json::to_value(record)
            .map_err(|e| ModelError::Validation(format!("Record cannot be serialized: {e}")))?;
        let Value::Object(mut document) = value else {
            return Err(ModelError::Validation(
                "Record must serialize to an object".to_string(),
            ));
        };

        document.remove("id");
        dehydrate(&mut document, R::population());
        Ok(document)
    }

    fn decode(document: Document) -> Result<R, ModelError> {
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            ModelError::retrieval(format!("Stored {} record is malformed: {e}", R::COLLECTION))
        })
    }

    fn store_error(action: &str, err: &anyhow::Error) -> ModelError {
        ModelError::database(format!("Failed to {action} {}: {err}", R::COLLECTION))
    }

    async fn decode_all(&self, documents: Vec<Document>) -> Result<Vec<R>, ModelError> {
        let populated = populate(self.store.as_ref(), documents, R::population())
            .await
            .map_err(|e| Self::store_error("populate", &e))?;
        populated.into_iter().map(Self::decode).collect()
    }

    async fn hydrate(&self, document: Document) -> Result<R, ModelError> {
        let populated = populate_one(self.store.as_ref(), document, R::population())
            .await
            .map_err(|e| Self::store_error("populate", &e))?;
        Self::decode(populated)
    }

    async fn load_all(&self) -> Result<Vec<R>, ModelError> {
        let documents = self
            .store
            .get_all_documents(R::COLLECTION)
            .await
            .map_err(|e| Self::store_error("load", &e))?;
        self.decode_all(documents).await
    }

    async fn reload(&self) -> Result<Vec<R>, ModelError> {
        refresh_with(self.cache.as_ref(), R::COLLECTION, self.ttl, || self.load_all()).await
    }
}

#[async_trait]
impl<R: Record, C: RecordCache + 'static> RecordService<R> for CachedRecordService<R, C> {
    async fn get_all(&self) -> Result<Vec<R>, ModelError> {
        if let Some(records) = self.cache.get::<R>(R::COLLECTION).await {
            return Ok(records);
        }

        debug!(collection = R::COLLECTION, "Cache miss, reloading from store");
        self.reload().await
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<R>, ModelError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .find(|record| record.id() == Some(id)))
    }

    async fn get_all_by_rule(&self, rule: &Rule) -> Result<Vec<R>, ModelError> {
        let documents = self
            .store
            .get_documents_by_rule(R::COLLECTION, rule)
            .await
            .map_err(|e| Self::store_error("query", &e))?;
        self.decode_all(documents).await
    }

    async fn create(&self, record: R) -> Result<R, ModelError> {
        record.validate().map_err(ModelError::Validation)?;
        let document = Self::encode(&record)?;

        let stored = self
            .store
            .create_document(R::COLLECTION, document)
            .await
            .map_err(|e| Self::store_error("create", &e))?
            .ok_or_else(|| {
                ModelError::database(format!("{} record could not be created", R::COLLECTION))
            })?;
        let created = self.hydrate(stored).await?;

        self.cache.retain_only(R::COLLECTION).await;
        self.cache.append(R::COLLECTION, created.clone()).await;
        verify_in_cache(self.cache.as_ref(), R::COLLECTION, &created, &self.verify).await?;

        info!(
            collection = R::COLLECTION,
            id = ?created.id(),
            "Record created"
        );
        Ok(created)
    }

    async fn update(&self, id: &RecordId, record: R) -> Result<R, ModelError> {
        record.validate().map_err(ModelError::Validation)?;
        let document = Self::encode(&record)?;

        let stored = self
            .store
            .update_document(R::COLLECTION, id.as_str(), document)
            .await
            .map_err(|e| Self::store_error("update", &e))?
            .ok_or_else(|| {
                ModelError::database(format!(
                    "{} record {id} could not be updated",
                    R::COLLECTION
                ))
            })?;
        let updated = self.hydrate(stored).await?;

        self.cache.retain_only(R::COLLECTION).await;
        self.cache.replace(R::COLLECTION, id, updated.clone()).await;
        verify_in_cache(self.cache.as_ref(), R::COLLECTION, &updated, &self.verify).await?;

        info!(collection = R::COLLECTION, id = %id, "Record updated");
        Ok(updated)
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, ModelError> {
        self.store
            .delete_document(R::COLLECTION, id.as_str())
            .await
            .map_err(|e| Self::store_error("delete", &e))?
            .ok_or_else(|| {
                ModelError::database(format!(
                    "{} record {id} could not be deleted",
                    R::COLLECTION
                ))
            })?;

        self.cache.retain_only(R::COLLECTION).await;
        self.cache.remove::<R>(R::COLLECTION, id).await;

        info!(collection = R::COLLECTION, id = %id, "Record deleted");
        Ok(true)
    }

    async fn refresh(&self) -> Result<Vec<R>, ModelError> {
        self.reload().await
    }
}
