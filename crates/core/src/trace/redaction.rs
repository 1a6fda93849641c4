//! Argument redaction for logs and exception reports.

use serde_json::Value;

/// Replacement written over sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Field-name fragments that are always redacted.
pub const DEFAULT_SENSITIVE_FIELDS: [&str; 3] = ["password", "secret", "token"];

/// Masks values whose key looks sensitive, at any depth.
///
/// A key is sensitive when it contains one of the configured fragments,
/// ignoring case (`apiToken`, `PASSWORD_HASH`, `clientSecret`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    fragments: Vec<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            fragments: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Redactor {
    /// Adds fragments on top of the defaults. Blank entries are ignored.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            let field = field.as_ref().trim().to_lowercase();
            if !field.is_empty() && !self.fragments.contains(&field) {
                self.fragments.push(field);
            }
        }
        self
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.fragments.iter().any(|fragment| key.contains(fragment))
    }

    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| {
                        let item = if self.is_sensitive(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact(item)
                        };
                        (key.clone(), item)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact(item)).collect()),
            other => other.clone(),
        }
    }
}
