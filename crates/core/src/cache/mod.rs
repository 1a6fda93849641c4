mod error;
mod invalidation;
mod keys;
mod policy;
mod serialization;
mod stats;
mod traits;

pub use error::{CacheError, Result};
pub use invalidation::{InvalidationPattern, WriteMethod};
pub use keys::{canonicalize, derive_key, namespace_of, repository_prefix, tracking_key};
pub use policy::{CachePolicy, ReadMethod, AGGREGATE_TTL, DEFAULT_TTL};
pub use serialization::{decode, encode, SerializationError};
pub use stats::{CacheCounters, CacheStats};
pub use traits::Cache;
