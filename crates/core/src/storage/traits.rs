use async_trait::async_trait;

use crate::entity::{Document, Entity};
use crate::query::{FilterCriteria, PaginatedResult, PaginationRequest, Pipeline, Query};

use super::{Result, StoreResult};

/// Options for [`DocumentStore::find_one_and_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Return the document as it is after the update rather than before.
    pub return_after: bool,
}

impl UpdateOptions {
    pub fn returning_after() -> Self {
        Self { return_after: true }
    }
}

/// One collection of a document store.
///
/// Filters, sorts, updates and pipelines use the store's native document
/// shape (`{"field": {"$gte": ..}}`, `{"field": -1}`, `{"$set": {..}}`).
/// Single-document operations are atomic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the collection this handle operates on.
    fn collection(&self) -> &str;

    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>>;

    async fn find(
        &self,
        filter: &Document,
        sort: &Document,
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Document>>;

    async fn count_documents(&self, filter: &Document) -> StoreResult<u64>;

    async fn insert_one(&self, document: Document) -> StoreResult<()>;

    /// Applies `update` to the first match. `Ok(None)` when nothing matched.
    async fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>>;

    /// Returns true if a document was deleted.
    async fn delete_one(&self, filter: &Document) -> StoreResult<bool>;

    /// Returns the number of deleted documents.
    async fn delete_many(&self, filter: &Document) -> StoreResult<u64>;

    async fn aggregate(&self, pipeline: &[Document]) -> StoreResult<Vec<Document>>;
}

/// The uniform CRUD contract every entity repository exposes.
///
/// Layers (caching, invalidation, tracing) implement this same trait around
/// an inner repository, so they compose in any order.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Repository name, also the cache namespace (`"UserRepository"`).
    fn name(&self) -> &str;

    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    async fn find_one(&self, filters: &FilterCriteria) -> Result<Option<T>>;

    async fn find_all(&self, filters: &FilterCriteria) -> Result<Vec<T>>;

    async fn find_with_pagination(
        &self,
        filters: &FilterCriteria,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResult<T>>;

    /// Inserts a new record, assigning `id`, `createdAt` and `updatedAt`
    /// when the draft does not carry them.
    async fn create(&self, draft: T::Draft) -> Result<T>;

    /// Applies a patch and refreshes `updatedAt`. `Ok(None)` if `id` does not
    /// exist.
    async fn update(&self, id: &str, patch: T::Patch) -> Result<Option<T>>;

    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self, filters: &FilterCriteria) -> Result<u64>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Records whose id is in `ids`. Missing ids are skipped.
    async fn find_many(&self, ids: &[String]) -> Result<Vec<T>>;

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<Vec<T>>;

    /// Applies `patch` to every match. Returns the number of updated records.
    async fn update_many(&self, filters: &FilterCriteria, patch: T::Patch) -> Result<u64>;

    async fn delete_many(&self, filters: &FilterCriteria) -> Result<u64>;

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>>;

    /// Runs a built query.
    async fn find(&self, query: &Query) -> Result<PaginatedResult<T>> {
        self.find_with_pagination(&query.filters, &query.pagination)
            .await
    }
}
