//! Composition of the repository layers.
//!
//! Every repository is built the same way:
//!
//! ```text
//! Traced ─► CachedRepository ─► Invalidating ─► base repository ─► DocumentStore
//! ```
//!
//! Tracing sees every call, including cache hits. The cache layer answers
//! reads. Invalidation sits below the cache so it purges only after the base
//! repository confirmed the write.

use std::sync::Arc;

use repokit_core::cache::{Cache, CacheCounters, CachePolicy, CacheStats, InvalidationPattern};
use repokit_core::entity::Entity;
use repokit_core::storage::Repository;
use repokit_core::trace::{ExceptionReporter, Redactor};

use super::cached::CachedRepository;
use super::invalidating::{Invalidating, InvalidationCoordinator};
use super::traced::Traced;

/// A fully layered repository over `R`.
pub type Layered<R> =
    Traced<CachedRepository<Invalidating<R, dyn Cache>, dyn Cache>, dyn ExceptionReporter>;

/// Shared pieces every layered repository is built from.
///
/// One `Layers` is created at start-up; repositories built from it share
/// the cache backend, the reporter and the cache statistics.
#[derive(Clone)]
pub struct Layers {
    cache: Arc<dyn Cache>,
    reporter: Arc<dyn ExceptionReporter>,
    policy: CachePolicy,
    redactor: Redactor,
    counters: Arc<CacheCounters>,
}

impl Layers {
    pub fn new(cache: Arc<dyn Cache>, reporter: Arc<dyn ExceptionReporter>) -> Self {
        Self {
            cache,
            reporter,
            policy: CachePolicy::default(),
            redactor: Redactor::default(),
            counters: Arc::new(CacheCounters::new()),
        }
    }

    /// Default cache policy for repositories built without their own.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Statistics across every repository built from these layers.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Wraps `base` with tracing, caching and invalidation.
    pub fn wrap<T, R>(&self, base: R) -> Layered<R>
    where
        T: Entity,
        R: Repository<T>,
    {
        self.wrap_with::<T, R>(base, self.policy.clone(), Vec::new())
    }

    /// Like [`wrap`](Self::wrap), with a repository-specific policy and
    /// extra patterns purged on every write.
    pub fn wrap_with<T, R>(
        &self,
        base: R,
        policy: CachePolicy,
        extra_patterns: Vec<InvalidationPattern>,
    ) -> Layered<R>
    where
        T: Entity,
        R: Repository<T>,
    {
        let mut coordinator = InvalidationCoordinator::new(self.cache.clone(), base.name())
            .with_counters(self.counters.clone());
        for pattern in extra_patterns {
            coordinator = coordinator.with_pattern(pattern);
        }

        let invalidating = Invalidating::new(base, coordinator);
        let cached = CachedRepository::with_counters(
            invalidating,
            self.cache.clone(),
            policy,
            self.counters.clone(),
        );
        Traced::new(cached, self.reporter.clone()).with_redactor(self.redactor.clone())
    }
}
