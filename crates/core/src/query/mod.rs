mod aggregate;
mod builder;
mod criteria;
mod pagination;

pub use aggregate::{Accumulator, Pipeline, Stage};
pub use builder::{Query, QueryBuilder};
pub use criteria::{Clause, FilterCriteria, Predicate, PredicateKind, Range};
pub use pagination::{
    sort_document, with_default_tie_break, PaginatedResult, PaginationRequest,
    ResolvedPagination, SortDirection, SortKey, DEFAULT_LIMIT,
};
