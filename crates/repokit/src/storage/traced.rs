//! Execution tracing layer.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use repokit_core::entity::{Document, Entity};
use repokit_core::query::{FilterCriteria, PaginatedResult, PaginationRequest, Pipeline};
use repokit_core::storage::{Repository, Result};
use repokit_core::trace::{ExceptionReporter, Redactor, ReportContext, TraceContext};

/// Logs every call of the inner repository and reports its failures.
///
/// Arguments are redacted before they are logged or reported. Errors are
/// returned to the caller unchanged after reporting.
pub struct Traced<R, E: ?Sized> {
    inner: R,
    reporter: Arc<E>,
    redactor: Redactor,
}

impl<R, E: ExceptionReporter + ?Sized> Traced<R, E> {
    pub fn new(inner: R, reporter: Arc<E>) -> Self {
        Self {
            inner,
            reporter,
            redactor: Redactor::default(),
        }
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn run<V, Fut>(
        &self,
        component: &str,
        method: &'static str,
        args: Value,
        call: Fut,
    ) -> Result<V>
    where
        Fut: Future<Output = Result<V>>,
    {
        let context = TraceContext::start(component, method, &args, &self.redactor);
        tracing::debug!(
            component = %context.component,
            method,
            args = %context.args,
            "Repository call started"
        );

        match call.await {
            Ok(value) => {
                tracing::debug!(
                    component = %context.component,
                    method,
                    duration_ms = context.elapsed_ms(),
                    "Repository call succeeded"
                );
                Ok(value)
            }
            Err(error) => {
                tracing::error!(
                    component = %context.component,
                    method,
                    args = %context.args,
                    duration_ms = context.elapsed_ms(),
                    error = %error,
                    "Repository call failed"
                );

                let mut report = ReportContext::new()
                    .with_tag("component", context.component.as_str())
                    .with_tag("action", method)
                    .with_extra(context.args.clone());
                if let Some(id) = context.target_id() {
                    report = report.with_tag("id", id);
                }
                self.reporter.capture_exception(&error, &report);

                Err(error)
            }
        }
    }
}

fn value_of<V: Serialize + ?Sized>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Criteria in their field-keyed store shape, so the redactor sees field names
/// as keys.
fn filters_of(filters: &FilterCriteria) -> Value {
    Value::Object(filters.to_document())
}

#[async_trait]
impl<T, R, E> Repository<T> for Traced<R, E>
where
    T: Entity,
    R: Repository<T>,
    E: ExceptionReporter + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.run(
            self.inner.name(),
            "findById",
            json!({ "id": id }),
            self.inner.find_by_id(id),
        )
        .await
    }

    async fn find_one(&self, filters: &FilterCriteria) -> Result<Option<T>> {
        self.run(
            self.inner.name(),
            "findOne",
            json!({ "filters": filters_of(filters) }),
            self.inner.find_one(filters),
        )
        .await
    }

    async fn find_all(&self, filters: &FilterCriteria) -> Result<Vec<T>> {
        self.run(
            self.inner.name(),
            "findAll",
            json!({ "filters": filters_of(filters) }),
            self.inner.find_all(filters),
        )
        .await
    }

    async fn find_with_pagination(
        &self,
        filters: &FilterCriteria,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResult<T>> {
        let args = json!({
            "filters": filters_of(filters),
            "pagination": pagination,
        });
        self.run(
            self.inner.name(),
            "findWithPagination",
            args,
            self.inner.find_with_pagination(filters, pagination),
        )
        .await
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        let args = json!({ "draft": value_of(&draft) });
        self.run(self.inner.name(), "create", args, self.inner.create(draft))
            .await
    }

    async fn update(&self, id: &str, patch: T::Patch) -> Result<Option<T>> {
        let args = json!({ "id": id, "patch": value_of(&patch) });
        self.run(
            self.inner.name(),
            "update",
            args,
            self.inner.update(id, patch),
        )
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.run(
            self.inner.name(),
            "delete",
            json!({ "id": id }),
            self.inner.delete(id),
        )
        .await
    }

    async fn count(&self, filters: &FilterCriteria) -> Result<u64> {
        self.run(
            self.inner.name(),
            "count",
            json!({ "filters": filters_of(filters) }),
            self.inner.count(filters),
        )
        .await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.run(
            self.inner.name(),
            "exists",
            json!({ "id": id }),
            self.inner.exists(id),
        )
        .await
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<T>> {
        self.run(
            self.inner.name(),
            "findMany",
            json!({ "ids": ids }),
            self.inner.find_many(ids),
        )
        .await
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<Vec<T>> {
        let args = json!({ "drafts": value_of(&drafts) });
        self.run(
            self.inner.name(),
            "createMany",
            args,
            self.inner.create_many(drafts),
        )
        .await
    }

    async fn update_many(&self, filters: &FilterCriteria, patch: T::Patch) -> Result<u64> {
        let args = json!({
            "filters": filters_of(filters),
            "patch": value_of(&patch),
        });
        self.run(
            self.inner.name(),
            "updateMany",
            args,
            self.inner.update_many(filters, patch),
        )
        .await
    }

    async fn delete_many(&self, filters: &FilterCriteria) -> Result<u64> {
        self.run(
            self.inner.name(),
            "deleteMany",
            json!({ "filters": filters_of(filters) }),
            self.inner.delete_many(filters),
        )
        .await
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        self.run(
            self.inner.name(),
            "aggregate",
            json!({ "pipeline": pipeline.to_documents() }),
            self.inner.aggregate(pipeline),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::Mutex;

    use repokit_core::query::{Predicate, QueryBuilder};
    use repokit_core::storage::{RepositoryError, StoreError};

    use crate::entities::user::{User, UserDraft, UserField, UserPatch};
    use crate::storage::inmemory::{InMemoryCollection, InMemoryStore};
    use crate::storage::GenericRepository;

    // Reporter that records every captured exception
    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<(String, ReportContext)>>,
    }

    impl ExceptionReporter for RecordingReporter {
        fn capture_exception(&self, error: &(dyn Error + 'static), context: &ReportContext) {
            self.reports
                .lock()
                .unwrap()
                .push((error.to_string(), context.clone()));
        }
    }

    fn traced() -> (
        Traced<GenericRepository<User, InMemoryCollection>, RecordingReporter>,
        Arc<RecordingReporter>,
        InMemoryCollection,
    ) {
        let collection = InMemoryStore::new().collection("users");
        let reporter = Arc::new(RecordingReporter::default());
        let base = GenericRepository::new("UserRepository", collection.clone());
        (Traced::new(base, reporter.clone()), reporter, collection)
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let (repo, reporter, _) = traced();

        let alice = repo
            .create(UserDraft::new("Alice", "alice@example.com"))
            .await
            .unwrap();
        let found = repo.find_by_id(&alice.id).await.unwrap();

        assert_eq!(found, Some(alice));
        assert!(reporter.reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_reported_and_returned() {
        let (repo, reporter, collection) = traced();
        let alice = repo
            .create(UserDraft::new("Alice", "alice@example.com").with_id("u1"))
            .await
            .unwrap();
        assert_eq!(alice.id, "u1");

        let err = repo
            .create(
                UserDraft::new("Again", "again@example.com")
                    .with_id("u1")
                    .with_password_hash("hunter2"),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RepositoryError::Store(StoreError::DuplicateKey {
                collection: "users".to_string(),
                id: "u1".to_string()
            })
        );
        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        let (message, context) = &reports[0];
        assert!(message.contains("u1"));
        assert_eq!(context.tags["component"], "UserRepository");
        assert_eq!(context.tags["action"], "create");
        assert_eq!(context.extra["draft"]["passwordHash"], json!("[REDACTED]"));
        assert_eq!(context.extra["draft"]["name"], json!("Again"));
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn test_validation_error_reported_with_id_tag() {
        let (repo, reporter, _) = traced();

        let err = repo
            .update("", UserPatch::default().name("x"))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports[0].1.tags["action"], "update");
        assert_eq!(reports[0].1.tags["id"], "");
    }

    #[tokio::test]
    async fn test_custom_redactor() {
        let (repo, reporter, _) = traced();
        let repo = repo.with_redactor(Redactor::default().with_fields(["email"]));

        repo.create(UserDraft::new("A", "a@example.com").with_id("dup"))
            .await
            .unwrap();
        repo.create(UserDraft::new("B", "b@example.com").with_id("dup"))
            .await
            .unwrap_err();

        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports[0].1.extra["draft"]["email"], json!("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_filter_on_sensitive_field_redacted() {
        let (repo, reporter, _) = traced();
        let filters = FilterCriteria::from_pairs([("passwordHash", json!("hunter2"))]);

        repo.find_one(&filters).await.unwrap_err();

        let reports = reporter.reports.lock().unwrap();
        let extra = &reports[0].1.extra;
        assert_eq!(extra["filters"]["passwordHash"], json!("[REDACTED]"));
        assert!(!extra.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_search_group_redacted_per_field() {
        let (repo, reporter, _) = traced();
        let repo = repo.with_redactor(Redactor::default().with_fields(["email"]));
        let mut filters = QueryBuilder::new()
            .search(&[UserField::Name, UserField::Email], "alice")
            .build()
            .filters;
        filters.set("nickname", Predicate::Eq(json!("al")));

        repo.count(&filters).await.unwrap_err();

        let reports = reporter.reports.lock().unwrap();
        let alternatives = &reports[0].1.extra["filters"]["$or"];
        assert_eq!(alternatives[0]["name"]["$regex"], json!("alice"));
        assert_eq!(alternatives[1]["email"], json!("[REDACTED]"));
    }
}
