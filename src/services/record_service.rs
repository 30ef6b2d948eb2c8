//! Domain service for record collections.
//!
//! One service instance per entity type fronts the record store with the
//! shared expiring cache. Handlers only ever talk to this trait.

use crate::cache::CacheError;
use crate::db::{Rule, RuleError};
use crate::domain::{Record, RecordId};
use thiserror::Error;

/// Errors surfaced by record services.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The store failed or returned nothing for a query or write.
    #[error("Database error: {0}")]
    Database(String),

    /// The write reached the store but the cache could not be confirmed to
    /// reflect it.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }
}

impl From<RuleError> for ModelError {
    fn from(err: RuleError) -> Self {
        Self::Retrieval(err.to_string())
    }
}

/// Domain service trait for one record type.
///
/// # Examples
///
/// ```rust,ignore
/// use schoolhub::domain::Chat;
/// use schoolhub::services::{ModelError, RecordService};
/// use std::sync::Arc;
///
/// async fn example(chats: Arc<dyn RecordService<Chat>>) -> Result<(), ModelError> {
///     for chat in chats.get_all().await? {
///         println!("{}", chat.name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait RecordService<R: Record>: Send + Sync {
    /// All records, populated, served from the cache when fresh.
    ///
    /// # Errors
    ///
    /// - Returns [`ModelError::Database`] when a reload fails
    /// - Returns [`ModelError::Retrieval`] when stored data no longer decodes
    async fn get_all(&self) -> Result<Vec<R>, ModelError>;

    /// The record with the given id, or `None` when no record matches.
    async fn get_by_id(&self, id: &RecordId) -> Result<Option<R>, ModelError>;

    /// Records matching `rule`, read from the store directly.
    async fn get_all_by_rule(&self, rule: &Rule) -> Result<Vec<R>, ModelError>;

    /// Persists a new record and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// - Returns [`ModelError::Validation`] if the record is rejected
    /// - Returns [`ModelError::Database`] if the store does not persist it
    /// - Returns [`ModelError::Cache`] if the cache cannot be verified
    async fn create(&self, record: R) -> Result<R, ModelError>;

    /// Merges `record` over the stored record `id`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`RecordService::create`]; an unknown id is a
    /// [`ModelError::Database`].
    async fn update(&self, id: &RecordId, record: R) -> Result<R, ModelError>;

    /// Removes the record `id`. Deleting an id the store does not hold is a
    /// [`ModelError::Database`].
    async fn delete(&self, id: &RecordId) -> Result<bool, ModelError>;

    /// Drops the whole cache and reloads this collection.
    async fn refresh(&self) -> Result<Vec<R>, ModelError>;
}
