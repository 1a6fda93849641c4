//! Cache backend implementations.
//!
//! This module provides concrete implementations of the
//! `repokit_core::cache::Cache` trait.
//!
//! - [`MemoryCache`]: LRU-bounded in-process cache, always available.
//! - `RedisCache`: shared cache over Redis, behind the `redis` feature.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
