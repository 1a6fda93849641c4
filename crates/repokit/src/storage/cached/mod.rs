//! Cached repository layer.
//!
//! [`CachedRepository`] wraps any `Repository<T>` and implements the
//! cache-aside pattern for its read methods:
//!
//! - **Hit**: the decoded value is returned without touching the inner repository
//! - **Miss**: the inner repository is called and its result stored with the method's TTL
//! - **Backend failure**: logged at warn level, the read goes to the inner repository
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let base = GenericRepository::<User, _>::new("UserRepository", store.collection("users"));
//! let cache = Arc::new(MemoryCache::new(10_000));
//!
//! let cached = CachedRepository::new(base, cache, CachePolicy::default());
//! ```

mod repository;
mod single_flight;

pub use repository::CachedRepository;
pub use single_flight::SingleFlight;
