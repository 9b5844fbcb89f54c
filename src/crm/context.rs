//! Per-account data context.
//!
//! Holds the cached collections a signed-in account works with and routes
//! every mutation through the repository. A successful write is followed by
//! one full reload; a failed write pushes exactly one error toast and leaves
//! the cache as it was.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fera_common::kanban::{self, KanbanColumn, TaskColumn};
use fera_common::metrics::{self, DashboardStats, MemberPerformance};
use fera_common::{
    ActivityKind, Lead, LeadDraft, LeadFilter, LeadPatch, LeadStatus, LeadView, Notification,
    Role, ScoredLead, StatusFilter, Task, TaskDraft, TaskPatch, TeamMember, ToastKind, User,
    UNNAMED_MEMBER, default_avatar,
};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use super::auth::{Session, SessionEvent};
use super::db::{NewActivity, ProfileRecord};
use super::repository::{CrmStore, NewLead};
use super::seed::demo_notifications;
use super::toast::{Toast, ToastQueue};
use crate::errors::CrmError;

pub const APP_TOAST_TITLE: &str = "FERA CRM";
const FALLBACK_DISPLAY_NAME: &str = "FERA user";
const JUST_NOW: &str = "Just now";
const UPDATED_JUST_NOW: &str = "Updated just now";

pub struct CrmContext {
    store: Arc<dyn CrmStore>,
    session: Option<Session>,
    user: Option<User>,
    leads: Vec<ScoredLead>,
    tasks: Vec<Task>,
    team: Vec<TeamMember>,
    notifications: Vec<Notification>,
    toasts: ToastQueue,
    search_query: String,
}

impl CrmContext {
    pub fn new(store: Arc<dyn CrmStore>, toast_ttl: Duration) -> Self {
        Self {
            store,
            session: None,
            user: None,
            leads: Vec::new(),
            tasks: Vec::new(),
            team: Vec::new(),
            notifications: Vec::new(),
            toasts: ToastQueue::new(toast_ttl),
            search_query: String::new(),
        }
    }

    // ── Session ───────────────────────────────────────────────────────

    /// Adopt a session (load the profile, then everything else) or clear
    /// the context when signed out.
    pub async fn sync_session(&mut self, session: Option<Session>) {
        let Some(session) = session else {
            self.session = None;
            self.user = None;
            self.leads.clear();
            self.tasks.clear();
            self.team.clear();
            self.notifications.clear();
            self.search_query.clear();
            return;
        };

        let profile = match self.store.get_profile(&session.account_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(account_id = %session.account_id, error = %e, "Failed to load profile");
                None
            }
        };
        let switched = self
            .session
            .as_ref()
            .is_none_or(|s| s.account_id != session.account_id);

        self.user = Some(user_from_profile(&session, profile.as_ref()));
        self.session = Some(session);
        if switched {
            self.notifications = demo_notifications();
        }
        self.refresh().await;
    }

    /// Reload leads, tasks and the roster. Each collection keeps its previous
    /// contents when its reload fails.
    pub async fn refresh(&mut self) {
        let Some(account_id) = self.session.as_ref().map(|s| s.account_id.clone()) else {
            return;
        };

        match self.store.list_leads(&account_id).await {
            Ok(leads) => self.leads = leads.into_iter().map(Lead::scored).collect(),
            Err(e) => warn!(account_id = %account_id, error = %e, "Lead reload failed"),
        }
        match self.store.list_tasks(&account_id).await {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => warn!(account_id = %account_id, error = %e, "Task reload failed"),
        }
        match self.store.list_profiles().await {
            Ok(profiles) => self.team = profiles.iter().map(member_from_profile).collect(),
            Err(e) => warn!(account_id = %account_id, error = %e, "Roster reload failed"),
        }
        debug!(
            account_id = %account_id,
            leads = self.leads.len(),
            tasks = self.tasks.len(),
            "Context refreshed"
        );
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.account_id.as_str())
    }

    pub fn leads(&self) -> &[ScoredLead] {
        &self.leads
    }

    pub fn lead(&self, id: &str) -> Option<&ScoredLead> {
        self.leads.iter().find(|l| l.lead.id == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn team(&self) -> &[TeamMember] {
        &self.team
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.active()
    }

    pub fn push_toast(&mut self, title: &str, message: &str, kind: ToastKind) -> String {
        self.toasts.add(title, message, kind)
    }

    pub fn sweep_toasts(&mut self) -> usize {
        self.toasts.sweep()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    /// Filtered lead list. Without explicit query text the global search
    /// query applies.
    pub fn filtered_leads(
        &self,
        query: Option<&str>,
        status: StatusFilter,
        view: LeadView,
    ) -> Vec<ScoredLead> {
        let filter = LeadFilter::new(query.unwrap_or(&self.search_query), status, view);
        filter.apply_owned(&self.leads)
    }

    pub fn board(&self) -> Vec<KanbanColumn<ScoredLead>> {
        kanban::build_board(&self.leads)
    }

    pub fn task_board(&self) -> Vec<TaskColumn> {
        kanban::build_task_board(&self.tasks)
    }

    pub fn dashboard(&self, monthly_goal: f64) -> DashboardStats {
        metrics::dashboard(&self.leads, monthly_goal)
    }

    pub fn team_performance(&self) -> Vec<MemberPerformance> {
        metrics::team_performance(&self.leads, &self.team)
    }

    // ── Lead mutations ────────────────────────────────────────────────

    pub async fn add_lead(&mut self, draft: LeadDraft) -> Result<ScoredLead, CrmError> {
        let (account_id, actor) = self.actor().map_err(|e| self.fail(e))?;
        if draft.name.trim().is_empty() {
            return Err(self.fail(CrmError::Validation("Lead name is required".into())));
        }

        let owner = draft
            .owner
            .clone()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| actor.clone());
        let new = NewLead {
            draft,
            owner,
            last_interaction: JUST_NOW.to_string(),
            initial_activity: Some(activity(ActivityKind::StatusChange, "Lead created", &actor)),
        };
        let result = self.store.create_lead(&account_id, new).await;
        let lead = self.settle(result, Some("New lead registered.")).await?;
        info!(account_id = %account_id, lead_id = %lead.id, "Lead created");
        Ok(lead.scored())
    }

    pub async fn update_lead(&mut self, id: &str, patch: LeadPatch) -> Result<ScoredLead, CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(self.fail(CrmError::Validation("Lead name is required".into())));
        }
        let result = self.store.update_lead(&account_id, id, patch).await;
        let lead = self.settle(result, Some("Changes saved.")).await?;
        Ok(lead.scored())
    }

    /// Kanban move. Silent on success; value and history are untouched
    /// unless `record_activity` asks for a status-change entry.
    pub async fn update_lead_status(
        &mut self,
        id: &str,
        status: LeadStatus,
        record_activity: bool,
    ) -> Result<ScoredLead, CrmError> {
        let (account_id, actor) = self.actor().map_err(|e| self.fail(e))?;
        let entry = record_activity.then(|| {
            activity(
                ActivityKind::StatusChange,
                &format!("Status changed to {}", status.label()),
                &actor,
            )
        });
        let result = self
            .store
            .move_lead(&account_id, id, status, UPDATED_JUST_NOW.to_string(), entry)
            .await;
        let lead = self.settle(result, None).await?;
        debug!(account_id = %account_id, lead_id = %id, status = %status, "Lead moved");
        Ok(lead.scored())
    }

    pub async fn add_activity(
        &mut self,
        lead_id: &str,
        kind: ActivityKind,
        content: &str,
    ) -> Result<ScoredLead, CrmError> {
        let (account_id, actor) = self.actor().map_err(|e| self.fail(e))?;
        if content.trim().is_empty() {
            return Err(self.fail(CrmError::Validation("Activity content is required".into())));
        }
        let result = self
            .store
            .add_activity(
                &account_id,
                lead_id,
                activity(kind, content.trim(), &actor),
                JUST_NOW.to_string(),
            )
            .await;
        let lead = self.settle(result, Some("Activity recorded.")).await?;
        Ok(lead.scored())
    }

    pub async fn delete_lead(&mut self, id: &str) -> Result<(), CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        let result = match self.store.delete_leads(&account_id, vec![id.to_string()]).await {
            Ok(removed) if removed.is_empty() => Err(CrmError::LeadNotFound { id: id.to_string() }),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        self.settle(result, Some("Lead removed.")).await?;
        info!(account_id = %account_id, lead_id = %id, "Lead deleted");
        Ok(())
    }

    /// Remove a selection. Ids the account does not own are skipped; the
    /// ids actually removed are returned. Nothing removed means no toast.
    pub async fn delete_leads(&mut self, ids: Vec<String>) -> Result<Vec<String>, CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        let removed = match self.store.delete_leads(&account_id, ids).await {
            Ok(removed) if removed.is_empty() => return Ok(removed),
            result => self.settle(result, Some("Selection deleted.")).await?,
        };
        info!(account_id = %account_id, removed = removed.len(), "Leads deleted");
        Ok(removed)
    }

    // ── Task mutations ────────────────────────────────────────────────

    pub async fn add_task(&mut self, draft: TaskDraft) -> Result<Task, CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        if draft.title.trim().is_empty() {
            return Err(self.fail(CrmError::Validation("Task title is required".into())));
        }
        let result = self.store.create_task(&account_id, draft).await;
        let task = self.settle(result, Some("Task created.")).await?;
        info!(account_id = %account_id, task_id = %task.id, "Task created");
        Ok(task)
    }

    pub async fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(self.fail(CrmError::Validation("Task title is required".into())));
        }
        let result = self.store.update_task(&account_id, id, patch).await;
        self.settle(result, Some("Task updated.")).await
    }

    /// Flip completion: completed reopens as pending, anything else completes.
    pub async fn toggle_task(&mut self, id: &str) -> Result<Task, CrmError> {
        let current = match self.tasks.iter().find(|t| t.id == id) {
            Some(task) => task.status,
            None => {
                return Err(self.fail(CrmError::TaskNotFound { id: id.to_string() }));
            }
        };
        let patch = TaskPatch {
            status: Some(current.toggled()),
            ..Default::default()
        };
        self.update_task(id, patch).await
    }

    pub async fn delete_task(&mut self, id: &str) -> Result<(), CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        let result = self.store.delete_task(&account_id, id).await;
        self.settle(result, Some("Task removed.")).await?;
        info!(account_id = %account_id, task_id = %id, "Task deleted");
        Ok(())
    }

    // ── Team & profile ────────────────────────────────────────────────

    /// Members join by registering; this only tells the caller so.
    pub fn add_team_member(&mut self) {
        self.toasts.add(
            "Team",
            "Invitations are handled through user registration.",
            ToastKind::Info,
        );
    }

    pub async fn delete_team_member(&mut self, id: &str) -> Result<(), CrmError> {
        let role = self.user.as_ref().map(|u| u.role);
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        if role != Some(Role::Admin) {
            return Err(self.fail(CrmError::Forbidden(
                "Only admins can remove team members".into(),
            )));
        }
        if id == account_id {
            return Err(self.fail(CrmError::Validation(
                "Admins cannot remove their own profile".into(),
            )));
        }
        let result = self.store.delete_profile(id).await;
        self.settle(result, Some("Member removed.")).await?;
        info!(account_id = %account_id, member_id = %id, "Team member removed");
        Ok(())
    }

    pub async fn update_profile(
        &mut self,
        name: Option<String>,
        avatar: Option<String>,
    ) -> Result<User, CrmError> {
        let (account_id, _) = self.actor().map_err(|e| self.fail(e))?;
        if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(self.fail(CrmError::Validation("Name cannot be empty".into())));
        }
        let profile = match self.store.update_profile(&account_id, name, avatar).await {
            Ok(profile) => profile,
            Err(e) => return Err(self.fail(e)),
        };
        if let Some(session) = self.session.clone() {
            self.user = Some(user_from_profile(&session, Some(&profile)));
        }
        self.toasts
            .add("Profile", "Profile updated.", ToastKind::Success);
        self.refresh().await;
        self.user.clone().ok_or(CrmError::Unauthorized)
    }

    /// Returns false when no notification has that id.
    pub fn mark_notification_read(&mut self, id: &str) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────

    /// Account id and display name of the signed-in user.
    fn actor(&self) -> Result<(String, String), CrmError> {
        match (&self.session, &self.user) {
            (Some(session), Some(user)) => Ok((session.account_id.clone(), user.name.clone())),
            _ => Err(CrmError::Unauthorized),
        }
    }

    fn fail(&mut self, err: CrmError) -> CrmError {
        warn!(
            account_id = self.account_id().unwrap_or("-"),
            error = %err,
            "Mutation failed"
        );
        self.toasts
            .add(err.toast_title(), &err.to_string(), ToastKind::Error);
        err
    }

    async fn settle<T>(
        &mut self,
        result: Result<T, CrmError>,
        success: Option<&str>,
    ) -> Result<T, CrmError> {
        match result {
            Ok(value) => {
                if let Some(message) = success {
                    self.toasts.add(APP_TOAST_TITLE, message, ToastKind::Success);
                }
                self.refresh().await;
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

fn activity(kind: ActivityKind, content: &str, user: &str) -> NewActivity {
    NewActivity {
        kind,
        content: content.to_string(),
        date: chrono::Local::now().format("%d/%m/%Y %H:%M").to_string(),
        user: user.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Profile name, then the email local part, then a generic label.
pub fn display_name(profile_name: Option<&str>, email: &str) -> String {
    if let Some(name) = non_empty(profile_name) {
        return name.to_string();
    }
    match email.split('@').next().map(str::trim) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => FALLBACK_DISPLAY_NAME.to_string(),
    }
}

fn parse_role(role: Option<&str>) -> Role {
    non_empty(role)
        .and_then(|r| r.parse().ok())
        .unwrap_or_default()
}

fn user_from_profile(session: &Session, profile: Option<&ProfileRecord>) -> User {
    let email = profile
        .map(|p| p.email.clone())
        .unwrap_or_else(|| session.email.clone());
    User {
        id: session.account_id.clone(),
        name: display_name(profile.and_then(|p| p.name.as_deref()), &email),
        role: parse_role(profile.and_then(|p| p.role.as_deref())),
        avatar: non_empty(profile.and_then(|p| p.avatar_url.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| default_avatar(&session.account_id)),
        email,
    }
}

fn member_from_profile(profile: &ProfileRecord) -> TeamMember {
    TeamMember {
        id: profile.id.clone(),
        name: non_empty(profile.name.as_deref())
            .unwrap_or(UNNAMED_MEMBER)
            .to_string(),
        email: profile.email.clone(),
        role: parse_role(profile.role.as_deref()),
        avatar: non_empty(profile.avatar_url.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| default_avatar(&profile.id)),
    }
}

// ── Registry ──────────────────────────────────────────────────────────

pub type SharedContext = Arc<Mutex<CrmContext>>;

/// Lazily created contexts, one per signed-in account. Each context sits
/// behind its own mutex, so writes for one account are serialised.
pub struct ContextRegistry {
    store: Arc<dyn CrmStore>,
    toast_ttl: Duration,
    contexts: RwLock<HashMap<String, SharedContext>>,
}

impl ContextRegistry {
    pub fn new(store: Arc<dyn CrmStore>, toast_ttl: Duration) -> Self {
        Self {
            store,
            toast_ttl,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn context_for(&self, session: &Session) -> SharedContext {
        if let Some(ctx) = self.contexts.read().await.get(&session.account_id) {
            return ctx.clone();
        }

        let ctx = {
            let mut contexts = self.contexts.write().await;
            contexts
                .entry(session.account_id.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(CrmContext::new(
                        self.store.clone(),
                        self.toast_ttl,
                    )))
                })
                .clone()
        };

        let mut guard = ctx.lock().await;
        if guard.account_id() != Some(session.account_id.as_str()) {
            guard.sync_session(Some(session.clone())).await;
        }
        drop(guard);
        ctx
    }

    pub async fn get(&self, account_id: &str) -> Option<SharedContext> {
        self.contexts.read().await.get(account_id).cloned()
    }

    pub async fn drop_account(&self, account_id: &str) -> bool {
        let removed = self.contexts.write().await.remove(account_id);
        match removed {
            Some(ctx) => {
                ctx.lock().await.sync_session(None).await;
                true
            }
            None => false,
        }
    }

    /// Refresh every cached context, e.g. after the shared roster changed.
    pub async fn refresh_all(&self) {
        let contexts: Vec<SharedContext> = self.contexts.read().await.values().cloned().collect();
        for ctx in contexts {
            ctx.lock().await.refresh().await;
        }
    }

    /// Drop expired toasts in every context.
    pub async fn sweep_toasts(&self) -> usize {
        let contexts: Vec<SharedContext> = self.contexts.read().await.values().cloned().collect();
        let mut removed = 0;
        for ctx in contexts {
            removed += ctx.lock().await.sweep_toasts();
        }
        removed
    }

    /// Follow session events until the channel closes. An account loses its
    /// cached context once its last token has signed out.
    pub async fn follow_sessions(self: Arc<Self>, mut rx: broadcast::Receiver<SessionEvent>) {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::SignedOut {
                    account_id,
                    last_session: true,
                    ..
                }) => {
                    if self.drop_account(&account_id).await {
                        debug!(account_id = %account_id, "Context dropped after sign-out");
                    }
                }
                Ok(SessionEvent::SignedOut { account_id, .. }) => {
                    debug!(account_id = %account_id, "Session closed; other sessions remain");
                }
                Ok(SessionEvent::SignedIn(session)) => {
                    debug!(account_id = %session.account_id, "Session opened");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
