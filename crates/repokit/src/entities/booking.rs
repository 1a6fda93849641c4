use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repokit_core::entity::{Entity, Field};
use repokit_core::query::{QueryBuilder, SortDirection};
use repokit_core::storage::{Repository, Result};

/// Name of the booking repository and its cache namespace.
pub const BOOKING_REPOSITORY: &str = "BookingRepository";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A reservation of a resource for a time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub resource: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingField {
    UserId,
    Resource,
    StartsAt,
    EndsAt,
    Status,
    Notes,
}

impl Field for BookingField {
    fn name(self) -> &'static str {
        match self {
            BookingField::UserId => "userId",
            BookingField::Resource => "resource",
            BookingField::StartsAt => "startsAt",
            BookingField::EndsAt => "endsAt",
            BookingField::Status => "status",
            BookingField::Notes => "notes",
        }
    }

    fn all() -> &'static [Self] {
        &[
            BookingField::UserId,
            BookingField::Resource,
            BookingField::StartsAt,
            BookingField::EndsAt,
            BookingField::Status,
            BookingField::Notes,
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub user_id: String,
    pub resource: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BookingDraft {
    pub fn new(
        user_id: impl Into<String>,
        resource: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            resource: resource.into(),
            starts_at,
            ends_at,
            status: BookingStatus::Pending,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Booking {
    const COLLECTION: &'static str = "bookings";

    type Field = BookingField;
    type Draft = BookingDraft;
    type Patch = BookingPatch;

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

/// Booking repository with schedule queries.
#[derive(Clone)]
pub struct BookingRepository {
    repository: Arc<dyn Repository<Booking>>,
}

impl BookingRepository {
    pub fn new(repository: Arc<dyn Repository<Booking>>) -> Self {
        Self { repository }
    }

    pub fn query() -> QueryBuilder<BookingField> {
        QueryBuilder::new()
    }

    /// Non-cancelled bookings of `resource` starting in `[from, to]`, in
    /// start order.
    pub async fn schedule(
        &self,
        resource: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let query = Self::query()
            .by_field(BookingField::Resource, resource)
            .not_equal(BookingField::Status, BookingStatus::Cancelled.as_str())
            .between_dates(BookingField::StartsAt, from, to)
            .order_by(BookingField::StartsAt, SortDirection::Asc)
            .limit(crate::storage::MAX_PAGE_LIMIT)
            .build();
        Ok(self.repository.find(&query).await?.data)
    }

    pub async fn confirm(&self, id: &str) -> Result<Option<Booking>> {
        self.set_status(id, BookingStatus::Confirmed).await
    }

    pub async fn cancel(&self, id: &str) -> Result<Option<Booking>> {
        self.set_status(id, BookingStatus::Cancelled).await
    }

    async fn set_status(&self, id: &str, status: BookingStatus) -> Result<Option<Booking>> {
        let patch = BookingPatch {
            status: Some(status),
            ..BookingPatch::default()
        };
        self.repository.update(id, patch).await
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let query = Self::query()
            .by_field(BookingField::UserId, user_id)
            .build();
        self.repository.count(&query.filters).await
    }
}

impl Deref for BookingRepository {
    type Target = dyn Repository<Booking>;

    fn deref(&self) -> &Self::Target {
        self.repository.as_ref()
    }
}
