use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use repokit_core::entity::{Document, Entity, Field};
use repokit_core::query::{
    Accumulator, PaginatedResult, PaginationRequest, Pipeline, QueryBuilder, SortDirection,
};
use repokit_core::storage::{Repository, Result, StoreError};

/// Name of the transaction repository and its cache namespace.
pub const TRANSACTION_REPOSITORY: &str = "TransactionRepository";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

/// A payment made by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionField {
    UserId,
    Amount,
    Currency,
    Status,
    Description,
    CreatedAt,
}

impl Field for TransactionField {
    fn name(self) -> &'static str {
        match self {
            TransactionField::UserId => "userId",
            TransactionField::Amount => "amount",
            TransactionField::Currency => "currency",
            TransactionField::Status => "status",
            TransactionField::Description => "description",
            TransactionField::CreatedAt => "createdAt",
        }
    }

    fn all() -> &'static [Self] {
        &[
            TransactionField::UserId,
            TransactionField::Amount,
            TransactionField::Currency,
            TransactionField::Status,
            TransactionField::Description,
            TransactionField::CreatedAt,
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransactionDraft {
    pub fn new(user_id: impl Into<String>, amount: f64, currency: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            status: TransactionStatus::Pending,
            description: None,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransactionPatch {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Entity for Transaction {
    const COLLECTION: &'static str = "transactions";

    type Field = TransactionField;
    type Draft = TransactionDraft;
    type Patch = TransactionPatch;

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

/// Count and amount of the transactions in one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTotal {
    pub status: TransactionStatus,
    pub count: u64,
    pub amount: f64,
}

/// Per-status totals, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionStats {
    pub by_status: Vec<StatusTotal>,
}

impl TransactionStats {
    fn from_documents(documents: Vec<Document>) -> Result<Self> {
        let mut by_status = Vec::with_capacity(documents.len());
        for document in documents {
            let status = serde_json::from_value(document.get("_id").cloned().unwrap_or(Value::Null))
                .map_err(|e| StoreError::InvalidDocument {
                    collection: Transaction::COLLECTION.to_string(),
                    reason: e.to_string(),
                })?;
            by_status.push(StatusTotal {
                status,
                count: document.get("count").and_then(Value::as_u64).unwrap_or(0),
                amount: document.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
            });
        }
        Ok(Self { by_status })
    }

    pub fn get(&self, status: TransactionStatus) -> Option<&StatusTotal> {
        self.by_status.iter().find(|total| total.status == status)
    }
}

/// Transaction repository with per-user queries and status transitions.
#[derive(Clone)]
pub struct TransactionRepository {
    repository: Arc<dyn Repository<Transaction>>,
}

impl TransactionRepository {
    pub fn new(repository: Arc<dyn Repository<Transaction>>) -> Self {
        Self { repository }
    }

    pub fn query() -> QueryBuilder<TransactionField> {
        QueryBuilder::new()
    }

    /// A user's transactions, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        page: u64,
    ) -> Result<PaginatedResult<Transaction>> {
        let query = Self::query()
            .by_field(TransactionField::UserId, user_id)
            .order_by(TransactionField::CreatedAt, SortDirection::Desc)
            .limit(limit)
            .page(page)
            .build();
        self.repository.find(&query).await
    }

    /// Transactions created in `[from, to]`.
    pub async fn find_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        pagination: PaginationRequest,
    ) -> Result<PaginatedResult<Transaction>> {
        let query = Self::query()
            .between_dates(TransactionField::CreatedAt, from, to)
            .build();
        self.repository
            .find_with_pagination(&query.filters, &pagination)
            .await
    }

    pub async fn mark_completed(&self, id: &str) -> Result<Option<Transaction>> {
        self.repository
            .update(id, TransactionPatch::status(TransactionStatus::Completed))
            .await
    }

    pub async fn mark_failed(&self, id: &str) -> Result<Option<Transaction>> {
        self.repository
            .update(id, TransactionPatch::status(TransactionStatus::Failed))
            .await
    }

    /// Refunds every completed transaction of a user. Returns how many
    /// changed.
    pub async fn refund_user(&self, user_id: &str) -> Result<u64> {
        let query = Self::query()
            .by_field(TransactionField::UserId, user_id)
            .by_field(TransactionField::Status, TransactionStatus::Completed.as_str())
            .build();
        self.repository
            .update_many(
                &query.filters,
                TransactionPatch::status(TransactionStatus::Refunded),
            )
            .await
    }

    /// Per-status counts and amounts, optionally for one user.
    pub async fn stats(&self, user_id: Option<&str>) -> Result<TransactionStats> {
        let mut pipeline = Pipeline::new();
        if let Some(user_id) = user_id {
            let query = Self::query()
                .by_field(TransactionField::UserId, user_id)
                .build();
            pipeline = pipeline.filter(query.filters);
        }
        let pipeline = pipeline.group(
            Some(TransactionField::Status.name()),
            [
                ("count", Accumulator::Count),
                ("amount", Accumulator::Sum("amount".to_string())),
            ],
        );

        let documents = self.repository.aggregate(&pipeline).await?;
        TransactionStats::from_documents(documents)
    }
}

impl Deref for TransactionRepository {
    type Target = dyn Repository<Transaction>;

    fn deref(&self) -> &Self::Target {
        self.repository.as_ref()
    }
}
