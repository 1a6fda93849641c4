//! Write-side cache invalidation.

use std::sync::Arc;

use async_trait::async_trait;

use repokit_core::cache::{Cache, CacheCounters, InvalidationPattern, WriteMethod};
use repokit_core::entity::{Document, Entity};
use repokit_core::query::{FilterCriteria, PaginatedResult, PaginationRequest, Pipeline};
use repokit_core::storage::{Repository, Result};

/// Purges cached reads by prefix.
///
/// Failures are logged and swallowed: the write that triggered the purge has
/// already been persisted.
pub struct InvalidationCoordinator<C: ?Sized> {
    cache: Arc<C>,
    patterns: Vec<InvalidationPattern>,
    counters: Arc<CacheCounters>,
}

impl<C: Cache + ?Sized> InvalidationCoordinator<C> {
    /// Creates a coordinator purging the namespace of `repository`.
    pub fn new(cache: Arc<C>, repository: &str) -> Self {
        Self {
            cache,
            patterns: vec![InvalidationPattern::for_repository(repository)],
            counters: Arc::new(CacheCounters::new()),
        }
    }

    /// Also purges `pattern` after every write.
    pub fn with_pattern(mut self, pattern: InvalidationPattern) -> Self {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
        self
    }

    pub fn with_counters(mut self, counters: Arc<CacheCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn patterns(&self) -> &[InvalidationPattern] {
        &self.patterns
    }

    /// Purges every configured pattern. Returns the number of removed keys.
    pub async fn purge(&self, method: WriteMethod) -> u64 {
        let mut removed = 0;
        for pattern in &self.patterns {
            match self.cache.delete_by_prefix(pattern.as_str()).await {
                Ok(count) => {
                    tracing::debug!(
                        pattern = %pattern,
                        method = method.as_str(),
                        removed = count,
                        "Invalidated cache entries"
                    );
                    removed += count;
                }
                Err(error) => {
                    tracing::warn!(
                        pattern = %pattern,
                        method = method.as_str(),
                        error = %error,
                        "Failed to invalidate cache entries"
                    );
                }
            }
        }
        self.counters.record_purged(removed);
        removed
    }
}

/// Runs the coordinator after each successful write of the inner repository.
///
/// Writes that fail, or that change nothing (`update` of a missing id,
/// `delete` returning false, bulk writes matching nothing), leave the cache
/// alone. Reads pass straight through.
pub struct Invalidating<R, C: ?Sized> {
    inner: R,
    coordinator: InvalidationCoordinator<C>,
}

impl<R, C: Cache + ?Sized> Invalidating<R, C> {
    pub fn new(inner: R, coordinator: InvalidationCoordinator<C>) -> Self {
        Self { inner, coordinator }
    }

    pub fn coordinator(&self) -> &InvalidationCoordinator<C> {
        &self.coordinator
    }

    async fn after_write(&self, method: WriteMethod, changed: bool) {
        if changed {
            self.coordinator.purge(method).await;
        }
    }
}

#[async_trait]
impl<T, R, C> Repository<T> for Invalidating<R, C>
where
    T: Entity,
    R: Repository<T>,
    C: Cache + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.inner.find_by_id(id).await
    }

    async fn find_one(&self, filters: &FilterCriteria) -> Result<Option<T>> {
        self.inner.find_one(filters).await
    }

    async fn find_all(&self, filters: &FilterCriteria) -> Result<Vec<T>> {
        self.inner.find_all(filters).await
    }

    async fn find_with_pagination(
        &self,
        filters: &FilterCriteria,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResult<T>> {
        self.inner.find_with_pagination(filters, pagination).await
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        let created = self.inner.create(draft).await?;
        self.after_write(WriteMethod::Create, true).await;
        Ok(created)
    }

    async fn update(&self, id: &str, patch: T::Patch) -> Result<Option<T>> {
        let updated = self.inner.update(id, patch).await?;
        self.after_write(WriteMethod::Update, updated.is_some())
            .await;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.inner.delete(id).await?;
        self.after_write(WriteMethod::Delete, deleted).await;
        Ok(deleted)
    }

    async fn count(&self, filters: &FilterCriteria) -> Result<u64> {
        self.inner.count(filters).await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.inner.exists(id).await
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<T>> {
        self.inner.find_many(ids).await
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<Vec<T>> {
        let created = self.inner.create_many(drafts).await?;
        self.after_write(WriteMethod::CreateMany, !created.is_empty())
            .await;
        Ok(created)
    }

    async fn update_many(&self, filters: &FilterCriteria, patch: T::Patch) -> Result<u64> {
        let updated = self.inner.update_many(filters, patch).await?;
        self.after_write(WriteMethod::UpdateMany, updated > 0).await;
        Ok(updated)
    }

    async fn delete_many(&self, filters: &FilterCriteria) -> Result<u64> {
        let deleted = self.inner.delete_many(filters).await?;
        self.after_write(WriteMethod::DeleteMany, deleted > 0).await;
        Ok(deleted)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        self.inner.aggregate(pipeline).await
    }
}
