//! Explicitly constructed set of repositories.
//!
//! Built once at start-up and passed down by reference (or cloned; every
//! field is an `Arc` underneath). There is no global registry.

use std::sync::Arc;

use repokit_core::cache::{Cache, CacheStats};
use repokit_core::entity::Entity;
use repokit_core::storage::DocumentStore;
use repokit_core::trace::ExceptionReporter;

use crate::config::Config;
use crate::entities::booking::{Booking, BookingRepository, BOOKING_REPOSITORY};
use crate::entities::transaction::{Transaction, TransactionRepository, TRANSACTION_REPOSITORY};
use crate::entities::user::{User, UserRepository, USER_REPOSITORY};
use crate::storage::{GenericRepository, Layers};

/// Every entity repository, fully layered.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub transactions: TransactionRepository,
    pub bookings: BookingRepository,
    layers: Layers,
}

impl Repositories {
    /// Builds every repository over collections handed out by `collection`.
    pub fn new<S, F>(
        collection: F,
        cache: Arc<dyn Cache>,
        reporter: Arc<dyn ExceptionReporter>,
        config: &Config,
    ) -> Self
    where
        S: DocumentStore + 'static,
        F: Fn(&str) -> S,
    {
        let layers = Layers::new(cache, reporter)
            .with_policy(config.cache_policy())
            .with_redactor(config.redactor());

        let users = GenericRepository::<User, S>::new(USER_REPOSITORY, collection(User::COLLECTION))
            .with_max_limit(config.max_page_limit);
        let transactions = GenericRepository::<Transaction, S>::new(
            TRANSACTION_REPOSITORY,
            collection(Transaction::COLLECTION),
        )
        .with_max_limit(config.max_page_limit);
        let bookings =
            GenericRepository::<Booking, S>::new(BOOKING_REPOSITORY, collection(Booking::COLLECTION))
                .with_max_limit(config.max_page_limit);

        Self {
            users: UserRepository::new(Arc::new(layers.wrap::<User, _>(users))),
            transactions: TransactionRepository::new(Arc::new(
                layers.wrap::<Transaction, _>(transactions),
            )),
            bookings: BookingRepository::new(Arc::new(layers.wrap::<Booking, _>(bookings))),
            layers,
        }
    }

    /// Cache statistics across all repositories.
    pub fn cache_stats(&self) -> CacheStats {
        self.layers.stats()
    }
}

/// Creates the cache backend selected by the enabled features.
#[cfg(not(feature = "redis"))]
pub async fn create_cache(config: &Config) -> anyhow::Result<Arc<dyn Cache>> {
    use crate::cache::MemoryCache;

    tracing::info!(max_entries = config.cache_max_entries, "Using in-memory cache");
    Ok(Arc::new(MemoryCache::new(config.cache_max_entries)))
}

/// Creates the cache backend selected by the enabled features.
#[cfg(feature = "redis")]
pub async fn create_cache(config: &Config) -> anyhow::Result<Arc<dyn Cache>> {
    use crate::cache::RedisCache;

    tracing::info!(url = %config.redis_url, "Using Redis cache");
    Ok(Arc::new(RedisCache::new(&config.redis_url).await?))
}
