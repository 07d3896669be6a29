use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::assembler::NewsBatch;
use crate::error::UpstreamFetchError;

/// Reserved key for the newest batch.
pub const LATEST_KEY: &str = "latest";

/// One hour, for every entry. A constant of the deployment, not a
/// per-call knob.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache key for the page starting at `cursor`.
pub fn more_key(cursor: &str) -> String {
    format!("more:{cursor}")
}

/// TTL-bound store for assembled batches, keyed by `latest` or
/// `more:<cursor>`. At most one live entry per key; a refresh overwrites.
/// No eviction beyond TTL expiry: the key space is bounded by the
/// cursors actually seen.
///
/// This is a soft cache, not a system of record. Concurrent readers see
/// the latest committed entry or absence; racing writers to one key are
/// last-write-wins.
pub struct BatchCache {
    entries: Cache<String, Arc<NewsBatch>>,
}

impl BatchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<NewsBatch>> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: impl Into<String>, batch: NewsBatch) {
        self.entries.insert(key.into(), Arc::new(batch)).await;
    }

    /// Return the cached batch for `key`, or run `load` to produce it.
    ///
    /// Concurrent callers for the same cold key are coalesced into a
    /// single load, so a miss stampede issues one upstream fetch. A
    /// failed load caches nothing; every waiter sees the same error.
    pub async fn fetch_with<F>(
        &self,
        key: impl Into<String>,
        load: F,
    ) -> Result<Arc<NewsBatch>, Arc<UpstreamFetchError>>
    where
        F: Future<Output = Result<NewsBatch, UpstreamFetchError>>,
    {
        self.entries
            .try_get_with(key.into(), async move { load.await.map(Arc::new) })
            .await
    }

    /// Approximate number of live entries, for the status endpoint.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}
