use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Byte-oriented cache backend shared by every repository.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key. Expired entries are misses.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key starting with `prefix`. Returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;
}
