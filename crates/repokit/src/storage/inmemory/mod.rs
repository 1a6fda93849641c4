//! In-memory document store for testing and development.
//!
//! This module provides an implementation of `DocumentStore` that keeps each
//! collection in a `Vec` wrapped in `Arc<RwLock<_>>`, and evaluates the
//! native filter, sort, update and pipeline documents itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use repokit::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let users = store.collection("users");
//! ```

mod matcher;
mod pipeline;
mod store;

pub use store::{InMemoryCollection, InMemoryStore};
