//! Run-time checks applied before any store call.

use regex::RegexBuilder;

use crate::entity::Entity;
use crate::query::{FilterCriteria, Pipeline, Predicate, SortKey};

use super::ValidationError;

fn check_field<T: Entity>(field: &str) -> Result<(), ValidationError> {
    if T::is_known_field(field) {
        Ok(())
    } else {
        Err(ValidationError::UnknownField {
            entity: T::COLLECTION,
            field: field.to_string(),
        })
    }
}

/// Every referenced field must exist on `T` and every regex must compile.
pub fn validate_criteria<T: Entity>(criteria: &FilterCriteria) -> Result<(), ValidationError> {
    for clause in criteria.all_clauses() {
        check_field::<T>(&clause.field)?;
        if let Predicate::Regex {
            pattern,
            case_insensitive,
        } = &clause.predicate
        {
            RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map_err(|e| ValidationError::InvalidRegex {
                    field: clause.field.clone(),
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

pub fn validate_sort<T: Entity>(keys: &[SortKey]) -> Result<(), ValidationError> {
    keys.iter().try_for_each(|key| check_field::<T>(&key.field))
}

pub fn validate_pipeline<T: Entity>(pipeline: &Pipeline) -> Result<(), ValidationError> {
    for field in pipeline.entity_fields() {
        check_field::<T>(field)?;
    }
    pipeline
        .entity_criteria()
        .try_for_each(validate_criteria::<T>)
}

pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::InvalidInput("id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Field;
    use crate::query::Accumulator;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum AccountField {
        Owner,
        Balance,
    }

    impl Field for AccountField {
        fn name(self) -> &'static str {
            match self {
                AccountField::Owner => "owner",
                AccountField::Balance => "balance",
            }
        }

        fn all() -> &'static [Self] {
            &[AccountField::Owner, AccountField::Balance]
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Account {
        id: String,
        owner: String,
        balance: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl Entity for Account {
        const COLLECTION: &'static str = "accounts";
        type Field = AccountField;
        type Draft = serde_json::Value;
        type Patch = serde_json::Value;

        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
    }

    #[test]
    fn test_known_and_base_fields_pass() {
        let criteria = FilterCriteria::from_pairs([
            ("owner", json!("alice")),
            ("id", json!("1")),
            ("createdAt", json!("2024-01-01T00:00:00Z")),
        ]);
        assert!(validate_criteria::<Account>(&criteria).is_ok());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let criteria = FilterCriteria::from_pairs([("nickname", json!("al"))]);

        assert_eq!(
            validate_criteria::<Account>(&criteria),
            Err(ValidationError::UnknownField {
                entity: "accounts",
                field: "nickname".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let mut criteria = FilterCriteria::new();
        criteria.set(
            "owner",
            Predicate::Regex {
                pattern: "(unclosed".to_string(),
                case_insensitive: false,
            },
        );

        let result = validate_criteria::<Account>(&criteria);
        assert!(matches!(result, Err(ValidationError::InvalidRegex { field, .. }) if field == "owner"));
    }

    #[test]
    fn test_unknown_sort_field_is_rejected() {
        assert!(validate_sort::<Account>(&[SortKey::asc("balance")]).is_ok());
        assert!(validate_sort::<Account>(&[SortKey::asc("rank")]).is_err());
    }

    #[test]
    fn test_pipeline_outputs_are_not_entity_fields() {
        let pipeline = Pipeline::new()
            .group(
                Some("owner"),
                [("total", Accumulator::Sum("balance".to_string()))],
            )
            .sort(vec![SortKey::desc("total")]);
        assert!(validate_pipeline::<Account>(&pipeline).is_ok());

        let pipeline = Pipeline::new().group(Some("region"), [("n", Accumulator::Count)]);
        assert!(validate_pipeline::<Account>(&pipeline).is_err());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        assert!(validate_id("abc").is_ok());
        assert!(validate_id("  ").is_err());
    }
}
