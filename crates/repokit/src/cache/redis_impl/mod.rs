//! Redis cache backend implementation.
//!
//! Provides a shared cache for multi-instance deployments, with TTLs and
//! prefix deletion backed by per-namespace tracking sets.

mod cache;

pub use cache::RedisCache;
