use std::fmt;

use super::repository_prefix;

/// Repository write methods that trigger invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMethod {
    Create,
    Update,
    Delete,
    CreateMany,
    UpdateMany,
    DeleteMany,
}

impl WriteMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMethod::Create => "create",
            WriteMethod::Update => "update",
            WriteMethod::Delete => "delete",
            WriteMethod::CreateMany => "createMany",
            WriteMethod::UpdateMany => "updateMany",
            WriteMethod::DeleteMany => "deleteMany",
        }
    }
}

/// A key prefix. Purging a pattern removes every key it matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvalidationPattern(String);

impl InvalidationPattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// Every cached read of a repository (`"UserRepository:"`).
    pub fn for_repository(repository: &str) -> Self {
        Self(repository_prefix(repository))
    }

    /// Only the cached reads of one method of a repository.
    pub fn for_method(repository: &str, method: &str) -> Self {
        Self(format!("{}{}:", repository_prefix(repository), method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.0)
    }
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::derive_key;
    use serde_json::json;

    #[test]
    fn test_repository_pattern_matches_all_methods() {
        let pattern = InvalidationPattern::for_repository("UserRepository");

        assert_eq!(pattern.as_str(), "UserRepository:");
        assert!(pattern.matches(&derive_key("UserRepository", "findById", &json!("1"))));
        assert!(pattern.matches(&derive_key("UserRepository", "count", &json!({}))));
    }

    #[test]
    fn test_repository_pattern_does_not_match_similar_names() {
        let pattern = InvalidationPattern::for_repository("User");
        assert!(!pattern.matches(&derive_key("UserRepository", "findById", &json!("1"))));
    }

    #[test]
    fn test_method_pattern() {
        let pattern = InvalidationPattern::for_method("TransactionRepository", "aggregate");

        assert!(pattern.matches(&derive_key("TransactionRepository", "aggregate", &json!([]))));
        assert!(!pattern.matches(&derive_key("TransactionRepository", "count", &json!({}))));
    }
}
