use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use consult_protocol::{Plan, PlanCreate, PlanUpdate};
use tracing::debug;

use crate::storage::store::{
    new_id, DiscussionRecord, DiscussionStore, PlanStore, StoreError, UserRecord, UserStore,
};

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|e| StoreError::StorageError(format!("Failed to acquire read lock: {}", e)))
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|e| StoreError::StorageError(format!("Failed to acquire write lock: {}", e)))
}

/// Process-local implementation of every store.
///
/// Discussions and plans are kept in insertion order; users are keyed by their
/// normalized email.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    discussions: Arc<RwLock<Vec<DiscussionRecord>>>,
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    plans: Arc<RwLock<Vec<Plan>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscussionStore for InMemoryStore {
    async fn insert(&self, record: DiscussionRecord) -> Result<String, StoreError> {
        let id = record.id.clone();
        write_lock(&self.discussions)?.push(record);
        debug!("Stored discussion: {}", id);
        Ok(id)
    }

    async fn latest(&self) -> Result<Option<DiscussionRecord>, StoreError> {
        Ok(read_lock(&self.discussions)?.last().cloned())
    }

    async fn get(&self, id: &str) -> Result<DiscussionRecord, StoreError> {
        read_lock(&self.discussions)?
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("discussion {}", id)))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<String, StoreError> {
        let mut users = write_lock(&self.users)?;
        if users.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("user {}", user.email)));
        }

        let id = user.id.clone();
        debug!("Registered user: {}", id);
        users.insert(user.email.clone(), user);
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let key = crate::auth::normalize_email(email);
        Ok(read_lock(&self.users)?.get(&key).cloned())
    }
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn create_plan(&self, plan: PlanCreate) -> Result<Plan, StoreError> {
        let now = Utc::now();
        let plan = Plan {
            id: new_id(),
            title: plan.title,
            description: plan.description,
            status: plan.status,
            created_at: now,
            updated_at: now,
        };

        write_lock(&self.plans)?.push(plan.clone());
        debug!("Created plan: {}", plan.id);
        Ok(plan)
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let plans = read_lock(&self.plans)?;
        let mut listed: Vec<Plan> = plans.iter().rev().cloned().collect();
        // stable, so equal timestamps keep newest-inserted first
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn get_plan(&self, id: &str) -> Result<Plan, StoreError> {
        read_lock(&self.plans)?
            .iter()
            .find(|plan| plan.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", id)))
    }

    async fn update_plan(&self, id: &str, update: PlanUpdate) -> Result<Plan, StoreError> {
        let mut plans = write_lock(&self.plans)?;
        let plan = plans
            .iter_mut()
            .find(|plan| plan.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", id)))?;

        if let Some(title) = update.title {
            plan.title = title;
        }
        if let Some(description) = update.description {
            plan.description = description;
        }
        if let Some(status) = update.status {
            plan.status = status;
        }
        plan.updated_at = Utc::now();

        debug!("Updated plan: {}", id);
        Ok(plan.clone())
    }

    async fn delete_plan(&self, id: &str) -> Result<(), StoreError> {
        let mut plans = write_lock(&self.plans)?;
        let before = plans.len();
        plans.retain(|plan| plan.id != id);
        if plans.len() == before {
            return Err(StoreError::NotFound(format!("plan {}", id)));
        }

        debug!("Deleted plan: {}", id);
        Ok(())
    }
}
