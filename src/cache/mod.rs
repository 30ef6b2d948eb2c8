//! Read-through cache of fully populated record lists.
//!
//! One entry per collection key holds the whole list of that collection's
//! records together with an expiry instant. Entries are typed: a key is always
//! read and written with the record type it was stored with.
//!
//! Per key the cache moves between three states:
//!
//! ```text
//!   ABSENT --refresh--> FRESH --ttl elapses--> STALE
//!      ^                  |                      |
//!      +----- clear ------+------ refresh -------+
//! ```
//!
//! Writes through the record services evict every other key (see
//! [`RecordCache::retain_only`]), so any write forces the next read of an
//! unrelated collection to reload from the store.

pub mod verify;

pub use verify::{VerifyPolicy, verify_in_cache};

use async_trait::async_trait;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::{Record, RecordId};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Record in '{0}' has no id and cannot be verified")]
    MissingId(String),

    #[error("Record {id} not present in '{key}' cache after {retries} re-insertions")]
    NotVerified {
        key: String,
        id: RecordId,
        retries: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheState {
    Absent,
    Fresh,
    Stale,
}

/// Summary of one entry, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub state: CacheState,
    pub len: usize,
    pub expires_in_ms: u64,
}

/// Storage seam for cached record lists.
///
/// [`ExpiringCache`] is the production implementation; tests substitute their
/// own to observe or sabotage cache behaviour.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// The cached list while the entry is fresh, `None` otherwise.
    async fn get<R: Record>(&self, key: &str) -> Option<Vec<R>>;

    /// Stores a list and arms its expiry at `now + ttl`.
    async fn put<R: Record>(&self, key: &str, records: Vec<R>, ttl: Duration);

    /// Pushes a record onto a fresh entry and re-arms it. A record whose id is
    /// already listed replaces that element instead. Returns whether an entry
    /// was modified.
    async fn append<R: Record>(&self, key: &str, record: R) -> bool;

    /// Substitutes the element with the given id and re-arms the entry.
    async fn replace<R: Record>(&self, key: &str, id: &RecordId, record: R) -> bool;

    /// Drops the element with the given id and re-arms the entry.
    async fn remove<R: Record>(&self, key: &str, id: &RecordId) -> bool;

    /// Evicts every entry.
    async fn clear(&self);

    /// Evicts every entry except `key`.
    async fn retain_only(&self, key: &str);
}

/// Clears the whole cache, loads `key` with `load` and stores the result.
///
/// A refresh of one collection also evicts all others. Nothing is stored when
/// `load` fails.
pub async fn refresh_with<C, R, E, F, Fut>(
    cache: &C,
    key: &str,
    ttl: Duration,
    load: F,
) -> Result<Vec<R>, E>
where
    C: RecordCache + ?Sized,
    R: Record,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    cache.clear().await;
    metrics::counter!("cache_refreshes_total", "collection" => key.to_string()).increment(1);

    let records = load().await?;
    debug!(collection = key, count = records.len(), "Cache refreshed");
    cache.put(key, records.clone(), ttl).await;
    Ok(records)
}

struct CacheEntry {
    records: Box<dyn Any + Send + Sync>,
    len: usize,
    ttl: Duration,
    expires_at: Instant,
}

impl CacheEntry {
    fn new<R: Record>(records: Vec<R>, ttl: Duration, now: Instant) -> Self {
        Self {
            len: records.len(),
            records: Box::new(records),
            ttl,
            expires_at: now + ttl,
        }
    }

    /// Fresh up to and including `expires_at`; stale strictly after.
    fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    fn state(&self, now: Instant) -> CacheState {
        if self.is_fresh(now) {
            CacheState::Fresh
        } else {
            CacheState::Stale
        }
    }

    fn records<R: Record>(&self) -> Option<&Vec<R>> {
        self.records.downcast_ref::<Vec<R>>()
    }

    /// Applies `f` to the typed list, then re-arms the expiry.
    fn modify<R: Record>(&mut self, now: Instant, f: impl FnOnce(&mut Vec<R>) -> bool) -> bool {
        let Some(records) = self.records.downcast_mut::<Vec<R>>() else {
            return false;
        };
        let changed = f(records);
        self.len = records.len();
        self.expires_at = now + self.ttl;
        changed
    }
}

/// In-memory, expiring implementation of [`RecordCache`].
///
/// Each instance is independent; services share one through an `Arc`.
#[derive(Default)]
pub struct ExpiringCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ExpiringCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, key: &str) -> CacheState {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .map_or(CacheState::Absent, |entry| entry.state(now))
    }

    pub async fn snapshot(&self) -> Vec<CacheEntryInfo> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        let mut infos: Vec<CacheEntryInfo> = entries
            .iter()
            .map(|(key, entry)| CacheEntryInfo {
                key: key.clone(),
                state: entry.state(now),
                len: entry.len,
                expires_in_ms: u64::try_from(
                    entry.expires_at.saturating_duration_since(now).as_millis(),
                )
                .unwrap_or(u64::MAX),
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    async fn modify_fresh<R: Record>(&self, key: &str, f: impl FnOnce(&mut Vec<R>) -> bool) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get(key).map(|entry| entry.is_fresh(now)) {
            Some(true) => entries
                .get_mut(key)
                .is_some_and(|entry| entry.modify(now, f)),
            Some(false) => {
                // A stale list must not be re-armed; the next read reloads it.
                entries.remove(key);
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl RecordCache for ExpiringCache {
    async fn get<R: Record>(&self, key: &str) -> Option<Vec<R>> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        let records = match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                let records = entry.records::<R>();
                if records.is_none() {
                    warn!(collection = key, "Cache entry holds a different record type");
                }
                records.cloned()
            }
            _ => None,
        };

        if records.is_some() {
            metrics::counter!("cache_hits_total", "collection" => key.to_string()).increment(1);
        } else {
            metrics::counter!("cache_misses_total", "collection" => key.to_string()).increment(1);
        }
        records
    }

    async fn put<R: Record>(&self, key: &str, records: Vec<R>, ttl: Duration) {
        let entry = CacheEntry::new(records, ttl, Instant::now());
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn append<R: Record>(&self, key: &str, record: R) -> bool {
        self.modify_fresh::<R>(key, |records| {
            let existing = record
                .id()
                .and_then(|id| records.iter().position(|r| r.id() == Some(id)));
            match existing {
                Some(index) => records[index] = record,
                None => records.push(record),
            }
            true
        })
        .await
    }

    async fn replace<R: Record>(&self, key: &str, id: &RecordId, record: R) -> bool {
        self.modify_fresh::<R>(key, |records| {
            match records.iter_mut().find(|r| r.id() == Some(id)) {
                Some(slot) => {
                    *slot = record;
                    true
                }
                None => false,
            }
        })
        .await
    }

    async fn remove<R: Record>(&self, key: &str, id: &RecordId) -> bool {
        self.modify_fresh::<R>(key, |records| {
            let before = records.len();
            records.retain(|r| r.id() != Some(id));
            records.len() != before
        })
        .await
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn retain_only(&self, key: &str) {
        self.entries.write().await.retain(|k, _| k == key);
    }
}
