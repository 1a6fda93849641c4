//! Generic repository over a [`DocumentStore`] collection.

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use repokit_core::entity::{Document, Entity, ID_FIELD};
use repokit_core::query::{
    sort_document, with_default_tie_break, FilterCriteria, PaginatedResult, PaginationRequest,
    Pipeline,
};
use repokit_core::storage::{
    from_document, id_filter, ids_filter, prepare_insert, prepare_update, unknown_fields,
    validate_criteria, validate_id, validate_pipeline, validate_sort, DocumentStore, Repository,
    Result, UpdateOptions,
};

/// Largest page a repository serves unless configured otherwise.
pub const MAX_PAGE_LIMIT: u64 = 1_000;

/// CRUD for one entity type against one store collection.
///
/// Every argument is validated before the store is touched; store failures
/// are returned unchanged.
pub struct GenericRepository<T, S> {
    name: String,
    store: S,
    max_limit: u64,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: DocumentStore> GenericRepository<T, S> {
    /// Creates a repository named `name` (also its cache namespace).
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store,
            max_limit: MAX_PAGE_LIMIT,
            _entity: PhantomData,
        }
    }

    /// Caps the page size served by `find_with_pagination`.
    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn compile_filter(&self, filters: &FilterCriteria) -> Result<Document> {
        validate_criteria::<T>(filters)?;
        Ok(filters.to_document())
    }

    fn map_document(&self, document: Document) -> Result<T> {
        let dropped = unknown_fields::<T>(&document);
        if !dropped.is_empty() {
            tracing::trace!(
                repository = %self.name,
                fields = ?dropped,
                "Dropping fields the entity does not declare"
            );
        }
        Ok(from_document::<T>(document)?)
    }

    fn map_documents(&self, documents: Vec<Document>) -> Result<Vec<T>> {
        documents
            .into_iter()
            .map(|document| self.map_document(document))
            .collect()
    }

    fn default_sort() -> Document {
        sort_document(&with_default_tie_break(&[]))
    }
}

#[async_trait]
impl<T: Entity, S: DocumentStore> Repository<T> for GenericRepository<T, S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        validate_id(id)?;
        self.store
            .find_one(&id_filter(id))
            .await?
            .map(|document| self.map_document(document))
            .transpose()
    }

    async fn find_one(&self, filters: &FilterCriteria) -> Result<Option<T>> {
        let filter = self.compile_filter(filters)?;
        self.store
            .find_one(&filter)
            .await?
            .map(|document| self.map_document(document))
            .transpose()
    }

    async fn find_all(&self, filters: &FilterCriteria) -> Result<Vec<T>> {
        let filter = self.compile_filter(filters)?;
        let documents = self
            .store
            .find(&filter, &Self::default_sort(), 0, None)
            .await?;
        self.map_documents(documents)
    }

    async fn find_with_pagination(
        &self,
        filters: &FilterCriteria,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResult<T>> {
        let filter = self.compile_filter(filters)?;
        validate_sort::<T>(&pagination.sort)?;
        let window = pagination.resolve()?.clamp_limit(self.max_limit);
        let sort = sort_document(&with_default_tie_break(&pagination.sort));

        let total = self.store.count_documents(&filter).await?;
        let documents = self
            .store
            .find(&filter, &sort, window.offset, Some(window.limit))
            .await?;

        Ok(PaginatedResult::new(
            self.map_documents(documents)?,
            total,
            window,
        ))
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        let document = prepare_insert::<T>(&draft)?;
        self.store.insert_one(document.clone()).await?;
        self.map_document(document)
    }

    async fn update(&self, id: &str, patch: T::Patch) -> Result<Option<T>> {
        validate_id(id)?;
        let update = prepare_update::<T>(&patch)?;
        self.store
            .find_one_and_update(&id_filter(id), &update, UpdateOptions::returning_after())
            .await?
            .map(|document| self.map_document(document))
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(self.store.delete_one(&id_filter(id)).await?)
    }

    async fn count(&self, filters: &FilterCriteria) -> Result<u64> {
        let filter = self.compile_filter(filters)?;
        Ok(self.store.count_documents(&filter).await?)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(self.store.count_documents(&id_filter(id)).await? > 0)
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        for id in ids {
            validate_id(id)?;
        }

        let documents = self
            .store
            .find(&ids_filter(ids), &Document::new(), 0, None)
            .await?;
        let mut found = self.map_documents(documents)?;

        // Results follow the order of `ids`.
        let position: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .rev()
            .map(|(index, id)| (id.as_str(), index))
            .collect();
        found.sort_by_key(|entity| position.get(entity.id()).copied().unwrap_or(usize::MAX));
        Ok(found)
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<Vec<T>> {
        let documents = drafts
            .iter()
            .map(prepare_insert::<T>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut created = Vec::with_capacity(documents.len());
        for document in documents {
            self.store.insert_one(document.clone()).await?;
            created.push(self.map_document(document)?);
        }
        Ok(created)
    }

    async fn update_many(&self, filters: &FilterCriteria, patch: T::Patch) -> Result<u64> {
        let filter = self.compile_filter(filters)?;
        let update = prepare_update::<T>(&patch)?;

        let targets = self
            .store
            .find(&filter, &Document::new(), 0, None)
            .await?;

        let mut updated = 0;
        for target in targets {
            let Some(id) = target.get(ID_FIELD).and_then(Value::as_str) else {
                continue;
            };
            if self
                .store
                .find_one_and_update(&id_filter(id), &update, UpdateOptions::default())
                .await?
                .is_some()
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_many(&self, filters: &FilterCriteria) -> Result<u64> {
        let filter = self.compile_filter(filters)?;
        Ok(self.store.delete_many(&filter).await?)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        validate_pipeline::<T>(pipeline)?;
        Ok(self.store.aggregate(&pipeline.to_documents()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repokit_core::query::{Accumulator, QueryBuilder, SortDirection, SortKey};
    use repokit_core::storage::{RepositoryError, ValidationError};
    use serde_json::json;

    use crate::entities::user::{User, UserDraft, UserField, UserPatch, UserStatus};
    use crate::storage::inmemory::{InMemoryCollection, InMemoryStore};

    fn repository() -> GenericRepository<User, InMemoryCollection> {
        GenericRepository::new("UserRepository", InMemoryStore::new().collection("users"))
    }

    fn draft(name: &str, age: u32) -> UserDraft {
        UserDraft::new(name, format!("{}@example.com", name.to_lowercase())).with_age(age)
    }

    #[tokio::test]
    async fn test_create_update_delete_lifecycle() {
        let repo = repository();

        let alice = repo.create(draft("Alice", 30)).await.unwrap();
        assert!(!alice.id.is_empty());
        assert_eq!(alice.created_at, alice.updated_at);

        let bob = repo
            .update(&alice.id, UserPatch::default().name("Bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.name, "Bob");
        assert_eq!(bob.email, "alice@example.com");
        assert_eq!(bob.created_at, alice.created_at);
        assert!(bob.updated_at > alice.updated_at);

        assert!(repo.delete(&alice.id).await.unwrap());
        assert!(repo.find_by_id(&alice.id).await.unwrap().is_none());
        assert!(!repo.delete(&alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_password_hash_read_back() {
        let repo = repository();

        let alice = repo
            .create(draft("Alice", 30).with_password_hash("h"))
            .await
            .unwrap();
        assert_eq!(alice.password_hash.as_deref(), Some("h"));

        let found = repo.find_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash.as_deref(), Some("h"));

        let renamed = repo
            .update(&alice.id, UserPatch::default().name("Al"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.password_hash.as_deref(), Some("h"));
    }

    #[tokio::test]
    async fn test_private_field_not_queryable() {
        let repo = repository();
        let filters = FilterCriteria::from_pairs([("passwordHash", json!("h"))]);

        let err = repo.find_one(&filters).await.unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::Validation(ValidationError::UnknownField { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let repo = repository();
        let result = repo
            .update("missing", UserPatch::default().name("Bob"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let repo = repository();
        for i in 0..25 {
            repo.create(draft(&format!("User{i}"), 20 + i)).await.unwrap();
        }

        let page = repo
            .find_with_pagination(
                &FilterCriteria::new(),
                &PaginationRequest::new(10).with_offset(20),
            )
            .await
            .unwrap();

        assert_eq!(page.data.len(), 5);
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 3);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_default_sort_is_newest_first() {
        let repo = repository();
        let first = repo.create(draft("First", 20)).await.unwrap();
        let second = repo.create(draft("Second", 21)).await.unwrap();

        let all = repo.find_all(&FilterCriteria::new()).await.unwrap();

        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[tokio::test]
    async fn test_explicit_sort_and_limit_clamp() {
        let repo = repository().with_max_limit(2);
        for (name, age) in [("A", 40), ("B", 20), ("C", 30)] {
            repo.create(draft(name, age)).await.unwrap();
        }

        let page = repo
            .find_with_pagination(
                &FilterCriteria::new(),
                &PaginationRequest::new(50).with_sort(SortKey::asc("age")),
            )
            .await
            .unwrap();

        assert_eq!(page.limit, 2);
        assert!(page.has_more);
        let names: Vec<_> = page.data.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
    }

    #[tokio::test]
    async fn test_query_builder_filters() {
        let repo = repository();
        for (name, age) in [("Ann", 17), ("Ben", 25), ("Cid", 41)] {
            repo.create(draft(name, age)).await.unwrap();
        }

        let query = QueryBuilder::new()
            .where_greater_than_or_equal(UserField::Age, 18)
            .where_less_than(UserField::Age, 40)
            .order_by(UserField::Name, SortDirection::Asc)
            .build();
        let page = repo.find(&query).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Ben");
    }

    #[tokio::test]
    async fn test_unknown_field_rejected_before_store() {
        let repo = repository();
        let filters = FilterCriteria::from_pairs([("nickname", json!("al"))]);

        let err = repo.find_all(&filters).await.unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::Validation(ValidationError::UnknownField { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_limit_rejected() {
        let repo = repository();
        let err = repo
            .find_with_pagination(&FilterCriteria::new(), &PaginationRequest::new(0))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_count_and_exists() {
        let repo = repository();
        let alice = repo.create(draft("Alice", 30)).await.unwrap();
        repo.create(draft("Bob", 30)).await.unwrap();

        let filters = FilterCriteria::from_pairs([("age", json!(30))]);
        assert_eq!(repo.count(&filters).await.unwrap(), 2);
        assert!(repo.exists(&alice.id).await.unwrap());
        assert!(!repo.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_many_keeps_requested_order() {
        let repo = repository();
        let a = repo.create(draft("A", 1)).await.unwrap();
        let b = repo.create(draft("B", 2)).await.unwrap();

        let found = repo
            .find_many(&[b.id.clone(), "missing".to_string(), a.id.clone()])
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|u| u.id.clone()).collect();
        assert_eq!(ids, [b.id, a.id]);
        assert!(repo.find_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_writes() {
        let repo = repository();
        let created = repo
            .create_many(vec![draft("A", 10), draft("B", 20), draft("C", 30)])
            .await
            .unwrap();
        assert_eq!(created.len(), 3);

        let query = QueryBuilder::new()
            .where_less_than(UserField::Age, 25)
            .build();

        let updated = repo
            .update_many(&query.filters, UserPatch::default().status(UserStatus::Suspended))
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let suspended = QueryBuilder::new()
            .by_field(UserField::Status, "suspended")
            .build();
        assert_eq!(repo.count(&suspended.filters).await.unwrap(), 2);

        assert_eq!(repo.delete_many(&query.filters).await.unwrap(), 2);
        assert_eq!(repo.count(&query.filters).await.unwrap(), 0);
        assert_eq!(repo.count(&FilterCriteria::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_group() {
        let repo = repository();
        repo.create_many(vec![draft("A", 10), draft("B", 20)])
            .await
            .unwrap();

        let pipeline = Pipeline::new().group(
            None,
            [
                ("users", Accumulator::Count),
                ("totalAge", Accumulator::Sum("age".to_string())),
            ],
        );
        let result = repo.aggregate(&pipeline).await.unwrap();

        assert_eq!(result[0]["users"], json!(2));
        assert_eq!(result[0]["totalAge"], json!(30));
    }

    #[tokio::test]
    async fn test_unknown_stored_fields_dropped() {
        let store = InMemoryStore::new();
        let repo: GenericRepository<User, _> =
            GenericRepository::new("UserRepository", store.collection("users"));
        store
            .collection("users")
            .insert_one(
                json!({
                    "id": "legacy",
                    "name": "Old",
                    "email": "old@example.com",
                    "legacyFlag": true,
                    "createdAt": "2024-01-01T00:00:00.000000Z",
                    "updatedAt": "2024-01-01T00:00:00.000000Z"
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .await
            .unwrap();

        let user = repo.find_by_id("legacy").await.unwrap().unwrap();
        assert_eq!(user.name, "Old");
    }
}
