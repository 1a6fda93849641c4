//! Repository implementations and the layers wrapped around them.
//!
//! - [`GenericRepository`]: CRUD, pagination and aggregates against a
//!   [`DocumentStore`](repokit_core::storage::DocumentStore) collection
//! - [`CachedRepository`]: TTL read-through cache for read methods
//! - [`Invalidating`]: prefix purge of cached reads after successful writes
//! - [`Traced`]: structured logging and exception reporting for every call
//! - [`Layers`]: builds `Traced(CachedRepository(Invalidating(base)))`
//!
//! [`inmemory`] provides a document store for tests and the demo binary.

mod base;
mod cached;
pub mod inmemory;
mod invalidating;
mod stack;
mod traced;

pub use base::{GenericRepository, MAX_PAGE_LIMIT};
pub use cached::{CachedRepository, SingleFlight};
pub use inmemory::{InMemoryCollection, InMemoryStore};
pub use invalidating::{Invalidating, InvalidationCoordinator};
pub use stack::{Layered, Layers};
pub use traced::Traced;
