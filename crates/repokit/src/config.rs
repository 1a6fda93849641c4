use std::{env, str::FromStr, time::Duration};

use repokit_core::cache::{CachePolicy, ReadMethod};
use repokit_core::trace::Redactor;

/// Framework configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TTL for cached reads in seconds (default: 300)
    pub cache_default_ttl_seconds: u64,
    /// TTL for cached aggregates in seconds (default: 600)
    pub cache_aggregate_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Coalesce concurrent misses on the same key (default: true)
    pub cache_single_flight: bool,
    /// Largest page a repository serves (default: 1,000)
    pub max_page_limit: u64,
    /// Extra argument names to redact in traces
    pub trace_redact_fields: Vec<String>,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_DEFAULT_TTL_SECONDS` - Read TTL in seconds (default: 300)
    /// - `CACHE_AGGREGATE_TTL_SECONDS` - Aggregate TTL in seconds (default: 600)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `CACHE_SINGLE_FLIGHT` - `true`/`false` (default: true)
    /// - `MAX_PAGE_LIMIT` - Largest page size (default: 1,000)
    /// - `TRACE_REDACT_FIELDS` - Comma-separated extra fields to redact
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source; unparsable values fall back
    /// to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cache_default_ttl_seconds: parse_var(&lookup, "CACHE_DEFAULT_TTL_SECONDS")
                .unwrap_or(300),
            cache_aggregate_ttl_seconds: parse_var(&lookup, "CACHE_AGGREGATE_TTL_SECONDS")
                .unwrap_or(600),
            cache_max_entries: parse_var(&lookup, "CACHE_MAX_ENTRIES").unwrap_or(10_000),
            cache_single_flight: parse_var(&lookup, "CACHE_SINGLE_FLIGHT").unwrap_or(true),
            max_page_limit: parse_var(&lookup, "MAX_PAGE_LIMIT").unwrap_or(1_000),
            trace_redact_fields: lookup("TRACE_REDACT_FIELDS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_seconds)
    }

    pub fn aggregate_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_aggregate_ttl_seconds)
    }

    /// The cache policy repositories start from.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(self.default_ttl())
            .with_ttl(ReadMethod::Aggregate, self.aggregate_ttl())
            .with_single_flight(self.cache_single_flight)
    }

    pub fn redactor(&self) -> Redactor {
        Redactor::default().with_fields(&self.trace_redact_fields)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.cache_default_ttl_seconds, 300);
        assert_eq!(config.cache_aggregate_ttl_seconds, 600);
        assert_eq!(config.cache_max_entries, 10_000);
        assert!(config.cache_single_flight);
        assert_eq!(config.max_page_limit, 1_000);
        assert!(config.trace_redact_fields.is_empty());
        assert_eq!(config.redis_url, "redis://localhost:6379");
    }

    #[test]
    fn test_values_from_lookup() {
        let config = config_from(&[
            ("CACHE_DEFAULT_TTL_SECONDS", "60"),
            ("CACHE_SINGLE_FLIGHT", "false"),
            ("TRACE_REDACT_FIELDS", "ssn, iban,,"),
        ]);

        assert_eq!(config.default_ttl(), Duration::from_secs(60));
        assert!(!config.cache_single_flight);
        assert_eq!(config.trace_redact_fields, vec!["ssn", "iban"]);
        assert!(config.redactor().is_sensitive("customerSsn"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("CACHE_MAX_ENTRIES", "lots")]);
        assert_eq!(config.cache_max_entries, 10_000);
    }

    #[test]
    fn test_cache_policy_ttls() {
        let config = config_from(&[("CACHE_AGGREGATE_TTL_SECONDS", "900")]);
        let policy = config.cache_policy();

        assert_eq!(
            policy.ttl_for(ReadMethod::FindById),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            policy.ttl_for(ReadMethod::Aggregate),
            Some(Duration::from_secs(900))
        );
    }
}
