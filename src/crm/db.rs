use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use fera_common::{
    Activity, ActivityKind, Lead, LeadDraft, LeadPatch, LeadStatus, Priority, Task, TaskDraft,
    TaskPatch, TaskStatus,
};
use rusqlite::{Connection, params, params_from_iter};

use crate::errors::CrmError;

/// Async-safe handle to the CRM database.
///
/// Wraps `CrmDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<CrmDb>>,
}

impl DbHandle {
    pub fn new(db: CrmDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CrmDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| CrmError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// A stored profile row, credentials included. Never serialized to clients.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
    /// Argon2 PHC string; empty for roster entries that cannot sign in.
    pub password_hash: String,
    pub created_at: String,
}

/// Activity fields supplied by the caller; id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub content: String,
    pub date: String,
    pub user: String,
}

pub struct CrmDb {
    conn: Connection,
}

const LEAD_COLUMNS: &str = "id, name, company, email, phone, status, value, last_interaction, priority, owner, tags, created_at";
const TASK_COLUMNS: &str =
    "id, title, description, due_date, status, priority, assigned_to, created_at";
const PROFILE_COLUMNS: &str =
    "id, email, name, role, avatar_url, password_hash, created_at";

impl CrmDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    name TEXT,
                    role TEXT,
                    avatar_url TEXT,
                    password_hash TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS leads (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    company TEXT NOT NULL DEFAULT '',
                    email TEXT NOT NULL DEFAULT '',
                    phone TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'new',
                    value REAL NOT NULL DEFAULT 0,
                    last_interaction TEXT NOT NULL DEFAULT '',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    owner TEXT NOT NULL DEFAULT '',
                    tags TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS activities (
                    id TEXT PRIMARY KEY,
                    lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
                    kind TEXT NOT NULL,
                    content TEXT NOT NULL DEFAULT '',
                    date TEXT NOT NULL DEFAULT '',
                    user_name TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    due_date TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'pending',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    assigned_to TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_leads_user ON leads(user_id);
                CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(user_id, status);
                CREATE INDEX IF NOT EXISTS idx_activities_lead ON activities(lead_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Profiles ──────────────────────────────────────────────────────

    /// Insert a profile. Without an explicit role the very first profile
    /// becomes admin; the check and the insert are one statement.
    pub fn create_profile(
        &self,
        email: &str,
        name: Option<&str>,
        role: Option<&str>,
        password_hash: &str,
    ) -> Result<ProfileRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = self.conn.execute(
            "INSERT INTO profiles (id, email, name, role, password_hash)
             VALUES (?1, ?2, ?3,
                     COALESCE(?4, CASE WHEN NOT EXISTS (SELECT 1 FROM profiles) THEN 'admin' END),
                     ?5)",
            params![id, email, name, role, password_hash],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(CrmError::EmailTaken {
                    email: email.to_string(),
                }
                .into());
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to insert profile")),
        }
        self.get_profile(&id)?
            .context("Profile not found after insert")
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRecord>> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
        self.query_profile(&sql, id)
    }

    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileRecord>> {
        let sql = format!(
            "SELECT {} FROM profiles WHERE email = ?1 COLLATE NOCASE",
            PROFILE_COLUMNS
        );
        self.query_profile(&sql, email)
    }

    fn query_profile(&self, sql: &str, key: &str) -> Result<Option<ProfileRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare profile query")?;
        let mut rows = stmt
            .query_map(params![key], profile_from_row)
            .context("Failed to query profile")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read profile row")?)),
            None => Ok(None),
        }
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileRecord>> {
        let sql = format!(
            "SELECT {} FROM profiles ORDER BY created_at, rowid",
            PROFILE_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_profiles")?;
        let rows = stmt
            .query_map([], profile_from_row)
            .context("Failed to query profiles")?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row.context("Failed to read profile row")?);
        }
        Ok(profiles)
    }

    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<ProfileRecord> {
        if self.get_profile(id)?.is_none() {
            return Err(CrmError::ProfileNotFound { id: id.to_string() }.into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(n) = name {
            tx.execute("UPDATE profiles SET name = ?1 WHERE id = ?2", params![n, id])
                .context("Failed to update profile name")?;
        }
        if let Some(a) = avatar_url {
            tx.execute(
                "UPDATE profiles SET avatar_url = ?1 WHERE id = ?2",
                params![a, id],
            )
            .context("Failed to update profile avatar")?;
        }
        tx.commit().context("Failed to commit profile update")?;
        self.get_profile(id)?
            .context("Profile not found after update")
    }

    pub fn delete_profile(&self, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM profiles WHERE id = ?1", params![id])
            .context("Failed to delete profile")?;
        Ok(count > 0)
    }

    // ── Leads ─────────────────────────────────────────────────────────

    pub fn create_lead(
        &self,
        account_id: &str,
        draft: &LeadDraft,
        owner: &str,
        last_interaction: &str,
        initial_activity: Option<&NewActivity>,
    ) -> Result<Lead> {
        let id = uuid::Uuid::new_v4().to_string();
        let tags = serde_json::to_string(&draft.tags).context("Failed to encode lead tags")?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO leads (id, user_id, name, company, email, phone, status, value, last_interaction, priority, owner, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                account_id,
                draft.name,
                draft.company,
                draft.email,
                draft.phone,
                draft.status.as_str(),
                draft.value,
                last_interaction,
                draft.priority.as_str(),
                owner,
                tags,
            ],
        )
        .context("Failed to insert lead")?;
        if let Some(activity) = initial_activity {
            insert_activity(&tx, &id, activity)?;
        }
        tx.commit().context("Failed to commit lead insert")?;
        self.get_lead(account_id, &id)?
            .context("Lead not found after insert")
    }

    /// All leads of an account, newest first, each with its history.
    pub fn list_leads(&self, account_id: &str) -> Result<Vec<Lead>> {
        let sql = format!(
            "SELECT {} FROM leads WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            LEAD_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_leads")?;
        let rows = stmt
            .query_map(params![account_id], lead_row_from_row)
            .context("Failed to query leads")?;
        let mut lead_rows = Vec::new();
        for row in rows {
            lead_rows.push(row.context("Failed to read lead row")?);
        }

        let mut histories = self.account_histories(account_id)?;
        lead_rows
            .into_iter()
            .map(|r| {
                let history = histories.remove(&r.id).unwrap_or_default();
                r.into_lead(history)
            })
            .collect()
    }

    pub fn get_lead(&self, account_id: &str, id: &str) -> Result<Option<Lead>> {
        let sql = format!(
            "SELECT {} FROM leads WHERE id = ?1 AND user_id = ?2",
            LEAD_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare get_lead")?;
        let mut rows = stmt
            .query_map(params![id, account_id], lead_row_from_row)
            .context("Failed to query lead")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read lead row")?;
                let history = self.lead_history(&r.id)?;
                Ok(Some(r.into_lead(history)?))
            }
            None => Ok(None),
        }
    }

    fn lead_exists(&self, account_id: &str, id: &str) -> Result<bool> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM leads WHERE id = ?1 AND user_id = ?2",
                params![id, account_id],
                |row| row.get(0),
            )
            .context("Failed to check lead existence")?;
        Ok(exists)
    }

    pub fn update_lead(&self, account_id: &str, id: &str, patch: &LeadPatch) -> Result<Lead> {
        if !self.lead_exists(account_id, id)? {
            return Err(CrmError::LeadNotFound { id: id.to_string() }.into());
        }

        // Use unchecked_transaction so all updates are atomic.
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let text_fields: [(&str, Option<&String>); 6] = [
            ("name", patch.name.as_ref()),
            ("company", patch.company.as_ref()),
            ("email", patch.email.as_ref()),
            ("phone", patch.phone.as_ref()),
            ("owner", patch.owner.as_ref()),
            ("last_interaction", patch.last_interaction.as_ref()),
        ];
        for (column, value) in text_fields {
            if let Some(v) = value {
                let sql = format!(
                    "UPDATE leads SET {} = ?1, updated_at = datetime('now') WHERE id = ?2",
                    column
                );
                tx.execute(&sql, params![v, id])
                    .with_context(|| format!("Failed to update lead {}", column))?;
            }
        }
        if let Some(status) = patch.status {
            tx.execute(
                "UPDATE leads SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update lead status")?;
        }
        if let Some(value) = patch.value {
            tx.execute(
                "UPDATE leads SET value = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![value, id],
            )
            .context("Failed to update lead value")?;
        }
        if let Some(priority) = patch.priority {
            tx.execute(
                "UPDATE leads SET priority = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![priority.as_str(), id],
            )
            .context("Failed to update lead priority")?;
        }
        if let Some(tags) = &patch.tags {
            let encoded = serde_json::to_string(tags).context("Failed to encode lead tags")?;
            tx.execute(
                "UPDATE leads SET tags = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![encoded, id],
            )
            .context("Failed to update lead tags")?;
        }

        tx.commit().context("Failed to commit lead update")?;
        self.get_lead(account_id, id)?
            .context("Lead not found after update")
    }

    /// Kanban move: status and interaction label only, value and history untouched.
    pub fn move_lead(
        &self,
        account_id: &str,
        id: &str,
        status: LeadStatus,
        last_interaction: &str,
        activity: Option<&NewActivity>,
    ) -> Result<Lead> {
        if !self.lead_exists(account_id, id)? {
            return Err(CrmError::LeadNotFound { id: id.to_string() }.into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE leads SET status = ?1, last_interaction = ?2, updated_at = datetime('now') WHERE id = ?3",
            params![status.as_str(), last_interaction, id],
        )
        .context("Failed to move lead")?;
        if let Some(a) = activity {
            insert_activity(&tx, id, a)?;
        }
        tx.commit().context("Failed to commit lead move")?;
        self.get_lead(account_id, id)?
            .context("Lead not found after move")
    }

    pub fn add_activity(
        &self,
        account_id: &str,
        lead_id: &str,
        activity: &NewActivity,
        last_interaction: &str,
    ) -> Result<Lead> {
        if !self.lead_exists(account_id, lead_id)? {
            return Err(CrmError::LeadNotFound {
                id: lead_id.to_string(),
            }
            .into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        insert_activity(&tx, lead_id, activity)?;
        tx.execute(
            "UPDATE leads SET last_interaction = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![last_interaction, lead_id],
        )
        .context("Failed to touch lead")?;
        tx.commit().context("Failed to commit activity")?;
        self.get_lead(account_id, lead_id)?
            .context("Lead not found after activity insert")
    }

    /// Delete the given leads of an account and return the ids actually
    /// removed. Unknown ids and ids of other accounts are ignored.
    pub fn delete_leads(&self, account_id: &str, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM leads WHERE user_id = ? AND id IN ({}) RETURNING id",
            placeholders
        );
        let values = std::iter::once(account_id.to_string()).chain(ids.iter().cloned());
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare delete_leads")?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
            .context("Failed to delete leads")?;
        let mut removed = Vec::new();
        for row in rows {
            removed.push(row.context("Failed to read deleted lead id")?);
        }
        // Report in request order.
        removed.sort_by_key(|id| ids.iter().position(|r| r == id));
        Ok(removed)
    }

    fn lead_history(&self, lead_id: &str) -> Result<Vec<Activity>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, lead_id, kind, content, date, user_name
                 FROM activities WHERE lead_id = ?1 ORDER BY rowid DESC",
            )
            .context("Failed to prepare lead_history")?;
        let rows = stmt
            .query_map(params![lead_id], activity_row_from_row)
            .context("Failed to query activities")?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row.context("Failed to read activity row")?.into_activity()?);
        }
        Ok(history)
    }

    fn account_histories(&self, account_id: &str) -> Result<HashMap<String, Vec<Activity>>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.lead_id, a.kind, a.content, a.date, a.user_name
                 FROM activities a JOIN leads l ON l.id = a.lead_id
                 WHERE l.user_id = ?1 ORDER BY a.rowid DESC",
            )
            .context("Failed to prepare account_histories")?;
        let rows = stmt
            .query_map(params![account_id], activity_row_from_row)
            .context("Failed to query activities")?;
        let mut by_lead: HashMap<String, Vec<Activity>> = HashMap::new();
        for row in rows {
            let r = row.context("Failed to read activity row")?;
            let lead_id = r.lead_id.clone();
            by_lead.entry(lead_id).or_default().push(r.into_activity()?);
        }
        Ok(by_lead)
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub fn create_task(&self, account_id: &str, draft: &TaskDraft) -> Result<Task> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO tasks (id, user_id, title, description, due_date, status, priority, assigned_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    account_id,
                    draft.title,
                    draft.description,
                    draft.due_date,
                    draft.status.as_str(),
                    draft.priority.as_str(),
                    draft.assigned_to,
                ],
            )
            .context("Failed to insert task")?;
        self.get_task(account_id, &id)?
            .context("Task not found after insert")
    }

    pub fn list_tasks(&self, account_id: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            TASK_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map(params![account_id], task_row_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?.into_task()?);
        }
        Ok(tasks)
    }

    pub fn get_task(&self, account_id: &str, id: &str) -> Result<Option<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2",
            TASK_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare get_task")?;
        let mut rows = stmt
            .query_map(params![id, account_id], task_row_from_row)
            .context("Failed to query task")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read task row")?.into_task()?)),
            None => Ok(None),
        }
    }

    pub fn update_task(&self, account_id: &str, id: &str, patch: &TaskPatch) -> Result<Task> {
        if self.get_task(account_id, id)?.is_none() {
            return Err(CrmError::TaskNotFound { id: id.to_string() }.into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let text_fields: [(&str, Option<&String>); 4] = [
            ("title", patch.title.as_ref()),
            ("description", patch.description.as_ref()),
            ("due_date", patch.due_date.as_ref()),
            ("assigned_to", patch.assigned_to.as_ref()),
        ];
        for (column, value) in text_fields {
            if let Some(v) = value {
                let sql = format!(
                    "UPDATE tasks SET {} = ?1, updated_at = datetime('now') WHERE id = ?2",
                    column
                );
                tx.execute(&sql, params![v, id])
                    .with_context(|| format!("Failed to update task {}", column))?;
            }
        }
        if let Some(status) = patch.status {
            tx.execute(
                "UPDATE tasks SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update task status")?;
        }
        if let Some(priority) = patch.priority {
            tx.execute(
                "UPDATE tasks SET priority = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![priority.as_str(), id],
            )
            .context("Failed to update task priority")?;
        }
        tx.commit().context("Failed to commit task update")?;
        self.get_task(account_id, id)?
            .context("Task not found after update")
    }

    pub fn delete_task(&self, account_id: &str, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![id, account_id],
            )
            .context("Failed to delete task")?;
        Ok(count > 0)
    }
}

fn insert_activity(conn: &Connection, lead_id: &str, activity: &NewActivity) -> Result<()> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO activities (id, lead_id, kind, content, date, user_name) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            lead_id,
            activity.kind.as_str(),
            activity.content,
            activity.date,
            activity.user,
        ],
    )
    .context("Failed to insert activity")?;
    Ok(())
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        avatar_url: row.get(4)?,
        password_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// ── Row types ─────────────────────────────────────────────────────────

struct LeadRow {
    id: String,
    name: String,
    company: String,
    email: String,
    phone: String,
    status: String,
    value: f64,
    last_interaction: String,
    priority: String,
    owner: String,
    tags: String,
    created_at: String,
}

fn lead_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeadRow> {
    Ok(LeadRow {
        id: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        status: row.get(5)?,
        value: row.get(6)?,
        last_interaction: row.get(7)?,
        priority: row.get(8)?,
        owner: row.get(9)?,
        tags: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl LeadRow {
    fn into_lead(self, history: Vec<Activity>) -> Result<Lead> {
        let status = LeadStatus::from_str(&self.status).context("Failed to parse lead status")?;
        let priority =
            Priority::from_str(&self.priority).context("Failed to parse lead priority")?;
        let tags: Vec<String> =
            serde_json::from_str(&self.tags).context("Failed to parse lead tags JSON")?;

        Ok(Lead {
            id: self.id,
            name: self.name,
            company: self.company,
            email: self.email,
            phone: self.phone,
            status,
            value: self.value,
            last_interaction: self.last_interaction,
            priority,
            owner: self.owner,
            tags,
            history,
            created_at: self.created_at,
        })
    }
}

struct ActivityRow {
    id: String,
    lead_id: String,
    kind: String,
    content: String,
    date: String,
    user_name: String,
}

fn activity_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        kind: row.get(2)?,
        content: row.get(3)?,
        date: row.get(4)?,
        user_name: row.get(5)?,
    })
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity> {
        let kind = ActivityKind::from_str(&self.kind).context("Failed to parse activity kind")?;
        Ok(Activity {
            id: self.id,
            kind,
            content: self.content,
            date: self.date,
            user: self.user_name,
        })
    }
}

struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    due_date: String,
    status: String,
    priority: String,
    assigned_to: String,
    created_at: String,
}

fn task_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        due_date: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        assigned_to: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let status = TaskStatus::from_str(&self.status).context("Failed to parse task status")?;
        let priority =
            Priority::from_str(&self.priority).context("Failed to parse task priority")?;
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status,
            priority,
            assigned_to: self.assigned_to,
            created_at: self.created_at,
        })
    }
}
