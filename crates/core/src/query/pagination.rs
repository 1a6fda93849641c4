use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Document, CREATED_AT_FIELD};
use crate::storage::ValidationError;

/// Sort direction for a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The store's native direction marker (`1` / `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One key of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

/// Compiles sort keys to the store's native sort document, preserving order.
pub fn sort_document(keys: &[SortKey]) -> Document {
    keys.iter()
        .map(|key| (key.field.clone(), Value::from(key.direction.as_i32())))
        .collect()
}

/// Sort keys with the implicit `createdAt desc` tie-break appended.
pub fn with_default_tie_break(keys: &[SortKey]) -> Vec<SortKey> {
    let mut keys = keys.to_vec();
    if !keys.iter().any(|key| key.field == CREATED_AT_FIELD) {
        keys.push(SortKey::desc(CREATED_AT_FIELD));
    }
    keys
}

/// Requested page window.
///
/// `offset` wins when both `offset` and `page` are given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
}

/// Default page size when a builder never sets one.
pub const DEFAULT_LIMIT: u64 = 20;

impl Default for PaginationRequest {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl PaginationRequest {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            offset: None,
            page: None,
            sort: Vec::new(),
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Validates the request and settles `offset` and `page`.
    pub fn resolve(&self) -> Result<ResolvedPagination, ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidLimit);
        }

        let offset = match (self.offset, self.page) {
            (Some(offset), _) => offset,
            (None, Some(0)) => return Err(ValidationError::InvalidPage),
            (None, Some(page)) => (page - 1).saturating_mul(self.limit),
            (None, None) => 0,
        };

        Ok(ResolvedPagination {
            limit: self.limit,
            offset,
            page: offset / self.limit + 1,
        })
    }
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPagination {
    pub limit: u64,
    pub offset: u64,
    pub page: u64,
}

impl ResolvedPagination {
    /// Caps the limit, recomputing the page for the capped size.
    pub fn clamp_limit(self, max_limit: u64) -> Self {
        if self.limit <= max_limit || max_limit == 0 {
            return self;
        }
        Self {
            limit: max_limit,
            offset: self.offset,
            page: self.offset / max_limit + 1,
        }
    }
}

/// One page of results plus the numbers needed to fetch the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

impl<T> PaginatedResult<T> {
    /// Builds a page, truncating `data` to the limit.
    pub fn new(mut data: Vec<T>, total: u64, window: ResolvedPagination) -> Self {
        data.truncate(usize::try_from(window.limit).unwrap_or(usize::MAX));
        Self {
            data,
            total,
            page: window.page,
            limit: window.limit,
            offset: window.offset,
            has_more: window.offset.saturating_add(window.limit) < total,
        }
    }

    /// Maps every item, keeping the page numbers.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            offset: self.offset,
            has_more: self.has_more,
        }
    }
}
