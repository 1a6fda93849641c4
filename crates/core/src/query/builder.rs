//! Fluent, field-typed query builder.
//!
//! Every predicate method takes the entity's `Field` enum, so a query can
//! only reference fields the entity declares. `build()` freezes the
//! accumulated filters and pagination into a [`Query`].
//!
//! ```
//! use repokit_core::entity::Field;
//! use repokit_core::query::{QueryBuilder, SortDirection};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum OrderField {
//!     Status,
//!     Total,
//! }
//!
//! impl Field for OrderField {
//!     fn name(self) -> &'static str {
//!         match self {
//!             OrderField::Status => "status",
//!             OrderField::Total => "total",
//!         }
//!     }
//!
//!     fn all() -> &'static [Self] {
//!         &[OrderField::Status, OrderField::Total]
//!     }
//! }
//!
//! let query = QueryBuilder::<OrderField>::new()
//!     .by_field(OrderField::Status, "open")
//!     .where_greater_than_or_equal(OrderField::Total, 100)
//!     .order_by(OrderField::Total, SortDirection::Desc)
//!     .limit(25)
//!     .build();
//!
//! assert_eq!(query.pagination.limit, 25);
//! assert_eq!(query.filters.clauses().len(), 2);
//! ```

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::criteria::{Clause, FilterCriteria, Predicate, Range};
use super::pagination::{PaginationRequest, SortDirection, SortKey};
use crate::entity::{format_timestamp, Field};

/// Immutable result of [`QueryBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filters: FilterCriteria,
    pub pagination: PaginationRequest,
}

/// Accumulates predicates and pagination for entities whose fields are `F`.
#[derive(Debug, Clone)]
pub struct QueryBuilder<F: Field> {
    filters: FilterCriteria,
    pagination: PaginationRequest,
    _field: PhantomData<F>,
}

impl<F: Field> Default for QueryBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Field> QueryBuilder<F> {
    pub fn new() -> Self {
        Self {
            filters: FilterCriteria::new(),
            pagination: PaginationRequest::default(),
            _field: PhantomData,
        }
    }

    /// Equality. A second call on the same field replaces the first.
    pub fn by_field(mut self, field: F, value: impl Into<Value>) -> Self {
        self.filters.set(field.name(), Predicate::Eq(value.into()));
        self
    }

    pub fn not_equal(mut self, field: F, value: impl Into<Value>) -> Self {
        self.filters.set(field.name(), Predicate::Ne(value.into()));
        self
    }

    pub fn where_greater_than(self, field: F, value: impl Into<Value>) -> Self {
        self.bound(
            field,
            Range {
                gt: Some(value.into()),
                ..Range::default()
            },
        )
    }

    pub fn where_greater_than_or_equal(self, field: F, value: impl Into<Value>) -> Self {
        self.bound(
            field,
            Range {
                gte: Some(value.into()),
                ..Range::default()
            },
        )
    }

    pub fn where_less_than(self, field: F, value: impl Into<Value>) -> Self {
        self.bound(
            field,
            Range {
                lt: Some(value.into()),
                ..Range::default()
            },
        )
    }

    pub fn where_less_than_or_equal(self, field: F, value: impl Into<Value>) -> Self {
        self.bound(
            field,
            Range {
                lte: Some(value.into()),
                ..Range::default()
            },
        )
    }

    pub fn where_in<I, V>(mut self, field: F, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.set(field.name(), Predicate::In(values));
        self
    }

    pub fn where_not_in<I, V>(mut self, field: F, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.set(field.name(), Predicate::NotIn(values));
        self
    }

    /// Regex-style match. The pattern is validated before the store call.
    pub fn matches(mut self, field: F, pattern: impl Into<String>, case_insensitive: bool) -> Self {
        self.filters.set(
            field.name(),
            Predicate::Regex {
                pattern: pattern.into(),
                case_insensitive,
            },
        );
        self
    }

    pub fn exists(mut self, field: F, exists: bool) -> Self {
        self.filters.set(field.name(), Predicate::Exists(exists));
        self
    }

    /// Inclusive date range as one predicate, replacing any earlier range on
    /// the field as a whole.
    pub fn between_dates(mut self, field: F, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let range = Range::between(
            Value::String(format_timestamp(from)),
            Value::String(format_timestamp(to)),
        );
        self.filters.set(field.name(), Predicate::Range(range));
        self
    }

    /// Case-insensitive substring search across several fields (OR-group).
    pub fn search(mut self, fields: &[F], text: &str) -> Self {
        let pattern = regex::escape(text.trim());
        if pattern.is_empty() {
            return self;
        }
        let group = fields
            .iter()
            .map(|field| Clause {
                field: field.name().to_string(),
                predicate: Predicate::Regex {
                    pattern: pattern.clone(),
                    case_insensitive: true,
                },
            })
            .collect();
        self.filters.set_any_of(group);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.pagination.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.pagination.page = Some(page);
        self
    }

    /// Appends a sort key. Calls accumulate in order; ordering the same field
    /// again only changes its direction.
    pub fn order_by(mut self, field: F, direction: SortDirection) -> Self {
        let name = field.name();
        match self.pagination.sort.iter_mut().find(|key| key.field == name) {
            Some(key) => key.direction = direction,
            None => self.pagination.sort.push(SortKey::new(name, direction)),
        }
        self
    }

    pub fn build(self) -> Query {
        Query {
            filters: self.filters,
            pagination: self.pagination,
        }
    }

    fn bound(mut self, field: F, range: Range) -> Self {
        self.filters.merge_range(field.name(), range);
        self
    }
}
