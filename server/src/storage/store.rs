use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consult_core::ConversationTurn;
use consult_protocol::{Plan, PlanCreate, PlanUpdate};
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug)]
pub enum StoreError {
    /// Record not found
    NotFound(String),
    /// A unique key is already taken
    Conflict(String),
    /// Error occurred during a store operation
    StorageError(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::Conflict(what) => write!(f, "Already exists: {}", what),
            StoreError::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for StoreError {}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// One completed analysis turn, stored exactly once and never updated
#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionRecord {
    pub id: String,
    /// History as the client sent it
    pub messages: Vec<ConversationTurn>,
    pub input: String,
    pub response: String,
    /// `messages` plus the model's turn
    pub full_history: Vec<ConversationTurn>,
    pub template: String,
    pub created_at: DateTime<Utc>,
}

impl DiscussionRecord {
    pub fn new(
        messages: Vec<ConversationTurn>,
        input: String,
        response: String,
        full_history: Vec<ConversationTurn>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            messages,
            input,
            response,
            full_history,
            template: template.into(),
            created_at: Utc::now(),
        }
    }
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    /// Lowercased email, unique across users
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: new_id(),
            email: crate::auth::normalize_email(email),
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Append-only store of analysis turns
#[async_trait]
pub trait DiscussionStore: Send + Sync + Debug {
    /// Insert a completed turn and return its id
    async fn insert(&self, record: DiscussionRecord) -> Result<String, StoreError>;

    /// The most recently inserted turn, if any
    async fn latest(&self) -> Result<Option<DiscussionRecord>, StoreError>;

    async fn get(&self, id: &str) -> Result<DiscussionRecord, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Insert a new user; fails with `Conflict` when the email is taken
    async fn insert_user(&self, user: UserRecord) -> Result<String, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync + Debug {
    async fn create_plan(&self, plan: PlanCreate) -> Result<Plan, StoreError>;

    /// All plans, newest first
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;

    async fn get_plan(&self, id: &str) -> Result<Plan, StoreError>;

    /// Apply the fields present in `update` and bump `updated_at`
    async fn update_plan(&self, id: &str, update: PlanUpdate) -> Result<Plan, StoreError>;

    async fn delete_plan(&self, id: &str) -> Result<(), StoreError>;
}

pub type DiscussionStoreRef = Arc<dyn DiscussionStore>;
pub type UserStoreRef = Arc<dyn UserStore>;
pub type PlanStoreRef = Arc<dyn PlanStore>;
