use std::collections::HashMap;
use std::time::Duration;

/// Default TTL for cached reads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default TTL for aggregate statistics.
pub const AGGREGATE_TTL: Duration = Duration::from_secs(600);

/// Repository read methods the cache layer can wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMethod {
    FindById,
    FindOne,
    FindAll,
    FindWithPagination,
    Count,
    Exists,
    FindMany,
    Aggregate,
}

impl ReadMethod {
    /// Method name as used in cache keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadMethod::FindById => "findById",
            ReadMethod::FindOne => "findOne",
            ReadMethod::FindAll => "findAll",
            ReadMethod::FindWithPagination => "findWithPagination",
            ReadMethod::Count => "count",
            ReadMethod::Exists => "exists",
            ReadMethod::FindMany => "findMany",
            ReadMethod::Aggregate => "aggregate",
        }
    }
}

/// Which reads are cached, for how long, and whether concurrent misses are
/// coalesced.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    default_ttl: Option<Duration>,
    overrides: HashMap<ReadMethod, Option<Duration>>,
    single_flight: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TTL).with_ttl(ReadMethod::Aggregate, AGGREGATE_TTL)
    }
}

impl CachePolicy {
    /// Caches every read method for `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl: Some(default_ttl),
            overrides: HashMap::new(),
            single_flight: true,
        }
    }

    /// Caches nothing.
    pub fn none() -> Self {
        Self {
            default_ttl: None,
            overrides: HashMap::new(),
            single_flight: false,
        }
    }

    pub fn with_ttl(mut self, method: ReadMethod, ttl: Duration) -> Self {
        self.overrides.insert(method, Some(ttl));
        self
    }

    /// Leaves `method` uncached.
    pub fn without(mut self, method: ReadMethod) -> Self {
        self.overrides.insert(method, None);
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// TTL for `method`, or `None` when it is not cached.
    pub fn ttl_for(&self, method: ReadMethod) -> Option<Duration> {
        let ttl = match self.overrides.get(&method) {
            Some(ttl) => *ttl,
            None => self.default_ttl,
        };
        ttl.filter(|ttl| !ttl.is_zero())
    }

    pub fn single_flight(&self) -> bool {
        self.single_flight
    }
}
