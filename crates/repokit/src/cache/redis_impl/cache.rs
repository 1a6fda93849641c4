//! Redis cache implementation.
//!
//! Uses set-based key tracking for prefix deletion without SCAN. Every
//! namespaced key (`"UserRepository:findById:..."`) is added to the
//! namespace's tracking set (`"_keys:UserRepository"`). A `get` miss removes
//! the key from its set, so keys that expired on their own do not pile up
//! between purges.
//!
//! # Non-Atomicity Safety
//!
//! `set`, `delete` and `delete_by_prefix` each issue several commands. A
//! crash between them can leave a tracking set referencing a key that no
//! longer exists, or a key that expired on its own. Both are harmless: `DEL`
//! and `SREM` on missing members are no-ops, and the next purge of the
//! namespace removes the stale references.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use repokit_core::cache::{namespace_of, tracking_key, Cache, CacheError, Result};

/// Redis cache backend using connection manager for pooling.
///
/// Prefixes passed to `delete_by_prefix` must start with a namespace
/// (`"Name:"`); un-namespaced keys are not tracked and never purged by
/// prefix.
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(to_cache_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(to_cache_error)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(to_cache_error)?;

        // Expired keys leave their tracking entry behind; drop it on the miss.
        if result.is_none() {
            if let Some(namespace) = namespace_of(key) {
                conn.srem::<_, _, ()>(tracking_key(namespace), key)
                    .await
                    .map_err(to_cache_error)?;
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                let seconds = duration.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(to_cache_error)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(to_cache_error)?;
            }
        }

        if let Some(namespace) = namespace_of(key) {
            conn.sadd::<_, _, ()>(tracking_key(namespace), key)
                .await
                .map_err(to_cache_error)?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();

        if let Some(namespace) = namespace_of(key) {
            conn.srem::<_, _, ()>(tracking_key(namespace), key)
                .await
                .map_err(to_cache_error)?;
        }
        conn.del::<_, ()>(key).await.map_err(to_cache_error)?;

        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let Some(namespace) = namespace_of(prefix) else {
            tracing::warn!(prefix, "Prefix has no namespace; nothing tracked to delete");
            return Ok(0);
        };

        let mut conn = self.conn.clone();
        let tracking = tracking_key(namespace);

        let tracked_keys: Vec<String> = conn.smembers(&tracking).await.map_err(to_cache_error)?;
        let keys_to_delete: Vec<&String> = tracked_keys
            .iter()
            .filter(|k| k.starts_with(prefix))
            .collect();

        if keys_to_delete.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn
            .del(&keys_to_delete)
            .await
            .map_err(to_cache_error)?;
        conn.srem::<_, _, ()>(&tracking, &keys_to_delete)
            .await
            .map_err(to_cache_error)?;

        Ok(removed)
    }
}

/// Unreachable servers map to `ConnectionFailed`; anything else the server
/// rejected is an `OperationFailed`.
fn to_cache_error(err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}
