//! Store interface consumed by the data context and the session layer.
//!
//! Every call is scoped by account id and returns a typed [`CrmError`].
//! Callers decide when to reload; nothing here caches.

use async_trait::async_trait;
use fera_common::{Lead, LeadDraft, LeadPatch, LeadStatus, Task, TaskDraft, TaskPatch};

use super::db::{DbHandle, NewActivity, ProfileRecord};
use crate::errors::CrmError;

/// A lead insert together with the values the context derives for it.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub draft: LeadDraft,
    pub owner: String,
    pub last_interaction: String,
    pub initial_activity: Option<NewActivity>,
}

/// Profile columns supplied on registration.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub name: Option<String>,
    /// `None` lets the store decide; the first profile becomes admin.
    pub role: Option<String>,
    pub password_hash: String,
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Newest first, each lead with its full history.
    async fn list_leads(&self, account_id: &str) -> Result<Vec<Lead>, CrmError>;
    async fn create_lead(&self, account_id: &str, new: NewLead) -> Result<Lead, CrmError>;
    async fn update_lead(
        &self,
        account_id: &str,
        id: &str,
        patch: LeadPatch,
    ) -> Result<Lead, CrmError>;
    async fn move_lead(
        &self,
        account_id: &str,
        id: &str,
        status: LeadStatus,
        last_interaction: String,
        activity: Option<NewActivity>,
    ) -> Result<Lead, CrmError>;
    async fn add_activity(
        &self,
        account_id: &str,
        lead_id: &str,
        activity: NewActivity,
        last_interaction: String,
    ) -> Result<Lead, CrmError>;
    /// Returns the ids actually removed. Unknown ids are skipped.
    async fn delete_leads(
        &self,
        account_id: &str,
        ids: Vec<String>,
    ) -> Result<Vec<String>, CrmError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list_tasks(&self, account_id: &str) -> Result<Vec<Task>, CrmError>;
    async fn create_task(&self, account_id: &str, draft: TaskDraft) -> Result<Task, CrmError>;
    async fn update_task(
        &self,
        account_id: &str,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Task, CrmError>;
    async fn delete_task(&self, account_id: &str, id: &str) -> Result<(), CrmError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRecord>, CrmError>;
    async fn find_profile_by_email(&self, email: &str)
    -> Result<Option<ProfileRecord>, CrmError>;
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, CrmError>;
    /// Fails with [`CrmError::EmailTaken`] when the email is already registered.
    async fn create_profile(&self, new: NewProfile) -> Result<ProfileRecord, CrmError>;
    async fn update_profile(
        &self,
        id: &str,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ProfileRecord, CrmError>;
    async fn delete_profile(&self, id: &str) -> Result<(), CrmError>;
}

/// Everything the context needs from a backing store.
pub trait CrmStore: LeadRepository + TaskRepository + ProfileRepository {}

impl<T: LeadRepository + TaskRepository + ProfileRepository> CrmStore for T {}

/// SQLite-backed store running every query on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeadRepository for SqliteStore {
    async fn list_leads(&self, account_id: &str) -> Result<Vec<Lead>, CrmError> {
        let account_id = account_id.to_string();
        Ok(self.db.call(move |db| db.list_leads(&account_id)).await?)
    }

    async fn create_lead(&self, account_id: &str, new: NewLead) -> Result<Lead, CrmError> {
        let account_id = account_id.to_string();
        Ok(self
            .db
            .call(move |db| {
                db.create_lead(
                    &account_id,
                    &new.draft,
                    &new.owner,
                    &new.last_interaction,
                    new.initial_activity.as_ref(),
                )
            })
            .await?)
    }

    async fn update_lead(
        &self,
        account_id: &str,
        id: &str,
        patch: LeadPatch,
    ) -> Result<Lead, CrmError> {
        let account_id = account_id.to_string();
        let id = id.to_string();
        Ok(self
            .db
            .call(move |db| db.update_lead(&account_id, &id, &patch))
            .await?)
    }

    async fn move_lead(
        &self,
        account_id: &str,
        id: &str,
        status: LeadStatus,
        last_interaction: String,
        activity: Option<NewActivity>,
    ) -> Result<Lead, CrmError> {
        let account_id = account_id.to_string();
        let id = id.to_string();
        Ok(self
            .db
            .call(move |db| {
                db.move_lead(
                    &account_id,
                    &id,
                    status,
                    &last_interaction,
                    activity.as_ref(),
                )
            })
            .await?)
    }

    async fn add_activity(
        &self,
        account_id: &str,
        lead_id: &str,
        activity: NewActivity,
        last_interaction: String,
    ) -> Result<Lead, CrmError> {
        let account_id = account_id.to_string();
        let lead_id = lead_id.to_string();
        Ok(self
            .db
            .call(move |db| db.add_activity(&account_id, &lead_id, &activity, &last_interaction))
            .await?)
    }

    async fn delete_leads(
        &self,
        account_id: &str,
        ids: Vec<String>,
    ) -> Result<Vec<String>, CrmError> {
        let account_id = account_id.to_string();
        Ok(self
            .db
            .call(move |db| db.delete_leads(&account_id, &ids))
            .await?)
    }
}

#[async_trait]
impl TaskRepository for SqliteStore {
    async fn list_tasks(&self, account_id: &str) -> Result<Vec<Task>, CrmError> {
        let account_id = account_id.to_string();
        Ok(self.db.call(move |db| db.list_tasks(&account_id)).await?)
    }

    async fn create_task(&self, account_id: &str, draft: TaskDraft) -> Result<Task, CrmError> {
        let account_id = account_id.to_string();
        Ok(self
            .db
            .call(move |db| db.create_task(&account_id, &draft))
            .await?)
    }

    async fn update_task(
        &self,
        account_id: &str,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Task, CrmError> {
        let account_id = account_id.to_string();
        let id = id.to_string();
        Ok(self
            .db
            .call(move |db| db.update_task(&account_id, &id, &patch))
            .await?)
    }

    async fn delete_task(&self, account_id: &str, id: &str) -> Result<(), CrmError> {
        let account_id = account_id.to_string();
        let task_id = id.to_string();
        let removed = self
            .db
            .call(move |db| db.delete_task(&account_id, &task_id))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(CrmError::TaskNotFound { id: id.to_string() })
        }
    }
}

#[async_trait]
impl ProfileRepository for SqliteStore {
    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRecord>, CrmError> {
        let id = id.to_string();
        Ok(self.db.call(move |db| db.get_profile(&id)).await?)
    }

    async fn find_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProfileRecord>, CrmError> {
        let email = email.to_string();
        Ok(self
            .db
            .call(move |db| db.find_profile_by_email(&email))
            .await?)
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, CrmError> {
        Ok(self.db.call(|db| db.list_profiles()).await?)
    }

    async fn create_profile(&self, new: NewProfile) -> Result<ProfileRecord, CrmError> {
        Ok(self
            .db
            .call(move |db| {
                db.create_profile(
                    &new.email,
                    new.name.as_deref(),
                    new.role.as_deref(),
                    &new.password_hash,
                )
            })
            .await?)
    }

    async fn update_profile(
        &self,
        id: &str,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<ProfileRecord, CrmError> {
        let id = id.to_string();
        Ok(self
            .db
            .call(move |db| db.update_profile(&id, name.as_deref(), avatar_url.as_deref()))
            .await?)
    }

    async fn delete_profile(&self, id: &str) -> Result<(), CrmError> {
        let profile_id = id.to_string();
        let removed = self
            .db
            .call(move |db| db.delete_profile(&profile_id))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(CrmError::ProfileNotFound { id: id.to_string() })
        }
    }
}
