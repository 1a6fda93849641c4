//! Cache key derivation.
//!
//! Keys have the shape `"{repository}:{method}:{digest}"` where the digest is
//! the SHA-256 of the canonical form of the call arguments. The canonical
//! form sorts object keys and prints integral numbers without a fraction,
//! so structurally equal arguments always produce the same key, in any
//! process.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical, order-independent text form of a JSON value.
///
/// ```
/// use repokit_core::cache::canonicalize;
/// use serde_json::json;
///
/// assert_eq!(
///     canonicalize(&json!({ "b": 2, "a": 1.0 })),
///     canonicalize(&json!({ "a": 1, "b": 2 })),
/// );
/// ```
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                out.push_str(&format!("{}", f as i64));
            }
            _ => out.push_str(&n.to_string()),
        },
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

/// Returns the cache key for one call of a repository read method.
pub fn derive_key(repository: &str, method: &str, args: &Value) -> String {
    let digest = Sha256::digest(canonicalize(args).as_bytes());
    format!("{}{}:{}", repository_prefix(repository), method, hex::encode(digest))
}

/// Returns the prefix shared by every key of a repository (`"Name:"`).
pub fn repository_prefix(repository: &str) -> String {
    format!("{repository}:")
}

/// Extracts the repository namespace from a cache key, if present.
///
/// ```
/// use repokit_core::cache::namespace_of;
///
/// assert_eq!(namespace_of("UserRepository:findById:ab12"), Some("UserRepository"));
/// assert_eq!(namespace_of("orphan"), None);
/// ```
pub fn namespace_of(key: &str) -> Option<&str> {
    key.split_once(':')
        .map(|(namespace, _)| namespace)
        .filter(|namespace| !namespace.is_empty())
}

/// Returns the key of the set tracking every cache key of a namespace.
///
/// Backends without native prefix deletion keep this set so that
/// invalidation does not need to scan the key space. It sits outside the
/// namespace's own prefix so a purge never matches it.
pub fn tracking_key(namespace: &str) -> String {
    format!("_keys:{namespace}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_sorts_keys_recursively() {
        let a = json!({ "filters": { "status": "A", "amount": 5 }, "limit": 10 });
        let b = json!({ "limit": 10, "filters": { "amount": 5, "status": "A" } });

        assert_eq!(canonicalize(&a), canonicalize(&b));
        assert_eq!(
            canonicalize(&a),
            r#"{"filters":{"amount":5,"status":"A"},"limit":10}"#
        );
    }

    #[test]
    fn test_canonicalize_keeps_array_order() {
        assert_ne!(canonicalize(&json!([1, 2])), canonicalize(&json!([2, 1])));
    }

    #[test]
    fn test_canonicalize_normalizes_integral_floats() {
        assert_eq!(canonicalize(&json!(2.0)), "2");
        assert_eq!(canonicalize(&json!(2.5)), "2.5");
    }

    #[test]
    fn test_canonicalize_escapes_strings() {
        assert_eq!(canonicalize(&json!("a\"b")), r#""a\"b""#);
        assert_ne!(
            canonicalize(&json!({ "a": "1,\"b\":2" })),
            canonicalize(&json!({ "a": "1", "b": 2 }))
        );
    }

    #[test]
    fn test_derive_key_is_order_independent() {
        let a = derive_key("UserRepository", "findAll", &json!({ "a": 1, "b": 2 }));
        let b = derive_key("UserRepository", "findAll", &json!({ "b": 2, "a": 1 }));

        assert_eq!(a, b);
        assert!(a.starts_with("UserRepository:findAll:"));
        assert_eq!(a.len(), "UserRepository:findAll:".len() + 64);
    }

    #[test]
    fn test_derive_key_separates_repositories_and_methods() {
        let args = json!({ "id": "1" });
        let user = derive_key("UserRepository", "findById", &args);
        let booking = derive_key("BookingRepository", "findById", &args);
        let exists = derive_key("UserRepository", "exists", &args);

        assert_ne!(user, booking);
        assert_ne!(user, exists);
    }

    #[test]
    fn test_derive_key_is_stable() {
        let key = derive_key("R", "m", &json!(null));
        let digest = hex::encode(Sha256::digest(b"null"));
        assert_eq!(key, format!("R:m:{digest}"));
    }

    #[test]
    fn test_tracking_key_is_outside_namespace() {
        let tracking = tracking_key("UserRepository");
        assert!(!tracking.starts_with(&repository_prefix("UserRepository")));
    }
}
