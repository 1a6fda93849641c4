//! Read-through cache layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use repokit_core::cache::{
    decode, derive_key, encode, Cache, CacheCounters, CachePolicy, CacheStats, ReadMethod,
};
use repokit_core::entity::{Document, Entity};
use repokit_core::query::{FilterCriteria, PaginatedResult, PaginationRequest, Pipeline};
use repokit_core::storage::{Repository, Result};

use super::single_flight::SingleFlight;

enum Lookup<V> {
    Hit(V),
    Miss,
    /// The cache backend failed; the read must go straight to the store.
    Unavailable,
}

/// Cache-aside reads shared by every method of a [`CachedRepository`].
struct ReadThrough<C: ?Sized> {
    cache: Arc<C>,
    policy: CachePolicy,
    counters: Arc<CacheCounters>,
    flights: SingleFlight,
}

impl<C: Cache + ?Sized> ReadThrough<C> {
    async fn lookup<V: DeserializeOwned>(&self, key: &str) -> Lookup<V> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(value) => Lookup::Hit(value),
                Err(error) => {
                    // Treat as a miss; the fresh value overwrites it.
                    tracing::warn!(key, error = %error, "Failed to decode cached value");
                    Lookup::Miss
                }
            },
            Ok(None) => Lookup::Miss,
            Err(error) => {
                tracing::warn!(key, error = %error, "Cache lookup failed, bypassing cache");
                Lookup::Unavailable
            }
        }
    }

    async fn store<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) {
        let bytes = match encode(value) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(key, error = %error, "Failed to encode value for cache");
                return;
            }
        };
        if let Err(error) = self.cache.set(key, &bytes, Some(ttl)).await {
            tracing::warn!(key, error = %error, "Failed to populate cache");
        }
    }

    async fn load_and_store<V, Fut>(&self, key: &str, ttl: Duration, load: Fut) -> Result<V>
    where
        V: Serialize,
        Fut: Future<Output = Result<V>>,
    {
        // Errors are returned as-is and never cached.
        let value = load.await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    async fn read<V, F, Fut>(
        &self,
        repository: &str,
        method: ReadMethod,
        args: Value,
        load: F,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let Some(ttl) = self.policy.ttl_for(method) else {
            return load().await;
        };
        let key = derive_key(repository, method.as_str(), &args);

        match self.lookup(&key).await {
            Lookup::Hit(value) => {
                tracing::trace!(key = %key, "Cache hit");
                self.counters.record_hit();
                return Ok(value);
            }
            Lookup::Unavailable => {
                self.counters.record_bypass();
                return load().await;
            }
            Lookup::Miss => {}
        }

        if !self.policy.single_flight() {
            tracing::trace!(key = %key, "Cache miss");
            self.counters.record_miss();
            return self.load_and_store(&key, ttl, load()).await;
        }

        let _flight = self.flights.acquire(&key).await;
        // Another caller may have filled the key while we waited.
        match self.lookup(&key).await {
            Lookup::Hit(value) => {
                tracing::trace!(key = %key, "Cache hit after waiting on in-flight load");
                self.counters.record_coalesced();
                Ok(value)
            }
            Lookup::Unavailable => {
                self.counters.record_bypass();
                load().await
            }
            Lookup::Miss => {
                tracing::trace!(key = %key, "Cache miss");
                self.counters.record_miss();
                self.load_and_store(&key, ttl, load()).await
            }
        }
    }
}

/// Wraps a repository's read methods with a TTL read-through cache.
///
/// Writes pass straight through; pair with
/// [`Invalidating`](crate::storage::Invalidating) below this layer so writes
/// purge what this layer cached. Empty results (`None`, `[]`, `0`, `false`)
/// are cached like any other value. Cache backend failures are logged and
/// the read goes to the inner repository.
pub struct CachedRepository<R, C: ?Sized> {
    inner: R,
    reads: ReadThrough<C>,
}

impl<R, C: Cache + ?Sized> CachedRepository<R, C> {
    pub fn new(inner: R, cache: Arc<C>, policy: CachePolicy) -> Self {
        Self::with_counters(inner, cache, policy, Arc::new(CacheCounters::new()))
    }

    /// Creates the layer reporting into shared `counters`.
    pub fn with_counters(
        inner: R,
        cache: Arc<C>,
        policy: CachePolicy,
        counters: Arc<CacheCounters>,
    ) -> Self {
        Self {
            inner,
            reads: ReadThrough {
                cache,
                policy,
                counters,
                flights: SingleFlight::new(),
            },
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.reads.counters.snapshot()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

fn filter_args(filters: &FilterCriteria) -> Value {
    json!({ "filters": filters.to_document() })
}

#[async_trait]
impl<T, R, C> Repository<T> for CachedRepository<R, C>
where
    T: Entity,
    R: Repository<T>,
    C: Cache + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::FindById,
                json!({ "id": id }),
                || self.inner.find_by_id(id),
            )
            .await
    }

    async fn find_one(&self, filters: &FilterCriteria) -> Result<Option<T>> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::FindOne,
                filter_args(filters),
                || self.inner.find_one(filters),
            )
            .await
    }

    async fn find_all(&self, filters: &FilterCriteria) -> Result<Vec<T>> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::FindAll,
                filter_args(filters),
                || self.inner.find_all(filters),
            )
            .await
    }

    async fn find_with_pagination(
        &self,
        filters: &FilterCriteria,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResult<T>> {
        let args = json!({
            "filters": filters.to_document(),
            "pagination": pagination,
        });
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::FindWithPagination,
                args,
                || self.inner.find_with_pagination(filters, pagination),
            )
            .await
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        self.inner.create(draft).await
    }

    async fn update(&self, id: &str, patch: T::Patch) -> Result<Option<T>> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn count(&self, filters: &FilterCriteria) -> Result<u64> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::Count,
                filter_args(filters),
                || self.inner.count(filters),
            )
            .await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::Exists,
                json!({ "id": id }),
                || self.inner.exists(id),
            )
            .await
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<T>> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::FindMany,
                json!({ "ids": ids }),
                || self.inner.find_many(ids),
            )
            .await
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<Vec<T>> {
        self.inner.create_many(drafts).await
    }

    async fn update_many(&self, filters: &FilterCriteria, patch: T::Patch) -> Result<u64> {
        self.inner.update_many(filters, patch).await
    }

    async fn delete_many(&self, filters: &FilterCriteria) -> Result<u64> {
        self.inner.delete_many(filters).await
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        self.reads
            .read(
                self.inner.name(),
                ReadMethod::Aggregate,
                json!({ "pipeline": pipeline.to_documents() }),
                || self.inner.aggregate(pipeline),
            )
            .await
    }
}
