//! Repository framework shell.
//!
//! Pure types and traits live in `repokit_core`; this crate provides the
//! I/O side: the generic repository, the caching, invalidation and tracing
//! layers, cache backends, an in-memory document store and example entity
//! repositories.

pub mod cache;
pub mod config;
pub mod entities;
pub mod registry;
pub mod reporting;
pub mod storage;

pub use config::Config;
pub use registry::{create_cache, Repositories};
pub use reporting::TracingReporter;
