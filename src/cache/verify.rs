//! Post-write check that a written record is visible in the cache.

use tokio::time::Duration;
use tracing::{debug, warn};

use super::{CacheError, RecordCache};
use crate::domain::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Re-insertions attempted before giving up.
    pub retries: u32,
    /// Pause after each re-insertion.
    pub delay: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Confirms that `record` is listed (by id) in the cached list for `key`.
///
/// While it is missing the record is pushed again and the check repeats after
/// `policy.delay`, at most `policy.retries` times. An absent entry counts as
/// verified: the next read reloads the collection, written record included.
///
/// On failure the store already holds the write; only the cache is behind.
pub async fn verify_in_cache<C, R>(
    cache: &C,
    key: &str,
    record: &R,
    policy: &VerifyPolicy,
) -> Result<(), CacheError>
where
    C: RecordCache + ?Sized,
    R: Record,
{
    let id = record
        .id()
        .ok_or_else(|| CacheError::MissingId(key.to_string()))?;

    let mut remaining = policy.retries;
    loop {
        let Some(records) = cache.get::<R>(key).await else {
            debug!(collection = key, id = %id, "Cache entry absent, write will be seen on reload");
            return Ok(());
        };

        if records.iter().any(|r| r.id() == Some(id)) {
            return Ok(());
        }

        if remaining == 0 {
            return Err(CacheError::NotVerified {
                key: key.to_string(),
                id: id.clone(),
                retries: policy.retries,
            });
        }

        warn!(
            collection = key,
            id = %id,
            remaining,
            "Written record missing from cache, re-inserting"
        );
        metrics::counter!("cache_verify_retries_total", "collection" => key.to_string())
            .increment(1);

        cache.append(key, record.clone()).await;
        remaining -= 1;
        tokio::time::sleep(policy.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ExpiringCache;
    use crate::cache::tests::{Note, note};
    use crate::domain::RecordId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Reports a present but empty list forever and swallows every write.
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

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_reinsertions() {
        let cache = ForgetfulCache::default();
        let started = Instant::now();

        let result = verify_in_cache(&cache, "notes", &note("1", "a"), &VerifyPolicy::default()).await;

        assert!(matches!(
            result,
            Err(CacheError::NotVerified { retries: 3, .. })
        ));
        assert_eq!(cache.appends.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn present_record_verifies_immediately() {
        let cache = ExpiringCache::new();
        cache
            .put("notes", vec![note("1", "a")], Duration::from_secs(60))
            .await;
        let started = Instant::now();

        verify_in_cache(&cache, "notes", &note("1", "a"), &VerifyPolicy::default())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_reinserted_once() {
        let cache = ExpiringCache::new();
        cache
            .put("notes", Vec::<Note>::new(), Duration::from_secs(60))
            .await;

        verify_in_cache(&cache, "notes", &note("7", "late"), &VerifyPolicy::default())
            .await
            .unwrap();

        let notes = cache.get::<Note>("notes").await.unwrap();
        assert_eq!(notes, vec![note("7", "late")]);
    }

    #[tokio::test]
    async fn absent_entry_counts_as_verified() {
        let cache = ExpiringCache::new();
        verify_in_cache(&cache, "notes", &note("1", "a"), &VerifyPolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn records_without_id_cannot_be_verified() {
        let cache = ExpiringCache::new();
        let unsaved = Note {
            id: None,
            text: "draft".to_string(),
        };
        assert!(matches!(
            verify_in_cache(&cache, "notes", &unsaved, &VerifyPolicy::default()).await,
            Err(CacheError::MissingId(_))
        ));
    }
}
