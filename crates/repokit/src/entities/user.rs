use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repokit_core::entity::{Entity, Field};
use repokit_core::query::{PaginatedResult, PaginationRequest, QueryBuilder};
use repokit_core::storage::{Repository, Result};

/// Name of the user repository and its cache namespace.
pub const USER_REPOSITORY: &str = "UserRepository";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Closed,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::Closed => "closed",
        }
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    Email,
    Status,
    Age,
    CreatedAt,
}

impl Field for UserField {
    fn name(self) -> &'static str {
        match self {
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::Status => "status",
            UserField::Age => "age",
            UserField::CreatedAt => "createdAt",
        }
    }

    fn all() -> &'static [Self] {
        &[
            UserField::Name,
            UserField::Email,
            UserField::Status,
            UserField::Age,
            UserField::CreatedAt,
        ]
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl UserDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            status: UserStatus::Active,
            age: None,
            password_hash: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }
}

/// Partial update of a user. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const PRIVATE_FIELDS: &'static [&'static str] = &["passwordHash"];

    type Field = UserField;
    type Draft = UserDraft;
    type Patch = UserPatch;

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

/// User repository with account-specific queries on top of the generic
/// contract.
#[derive(Clone)]
pub struct UserRepository {
    repository: Arc<dyn Repository<User>>,
}

impl UserRepository {
    pub fn new(repository: Arc<dyn Repository<User>>) -> Self {
        Self { repository }
    }

    pub fn query() -> QueryBuilder<UserField> {
        QueryBuilder::new()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = Self::query().by_field(UserField::Email, email).build();
        self.repository.find_one(&query.filters).await
    }

    /// Users whose name or email contains `text`, case-insensitively.
    pub async fn search(
        &self,
        text: &str,
        pagination: PaginationRequest,
    ) -> Result<PaginatedResult<User>> {
        let query = Self::query()
            .search(&[UserField::Name, UserField::Email], text)
            .build();
        self.repository
            .find_with_pagination(&query.filters, &pagination)
            .await
    }

    pub async fn set_status(&self, id: &str, status: UserStatus) -> Result<Option<User>> {
        self.repository
            .update(id, UserPatch::default().status(status))
            .await
    }

    pub async fn suspend(&self, id: &str) -> Result<Option<User>> {
        self.set_status(id, UserStatus::Suspended).await
    }

    pub async fn count_by_status(&self, status: UserStatus) -> Result<u64> {
        let query = Self::query()
            .by_field(UserField::Status, status.as_str())
            .build();
        self.repository.count(&query.filters).await
    }
}

impl Deref for UserRepository {
    type Target = dyn Repository<User>;

    fn deref(&self) -> &Self::Target {
        self.repository.as_ref()
    }
}
