//! Typed error hierarchy for the CRM service.
//!
//! `CrmError` is what the repository and data context hand back to callers.
//! Store internals stay on `anyhow::Result` and are wrapped into
//! `CrmError::Database` at the repository boundary.

use fera_common::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Lead {id} not found")]
    LeadNotFound { id: String },

    #[error("Task {id} not found")]
    TaskNotFound { id: String },

    #[error("Profile {id} not found")]
    ProfileNotFound { id: String },

    #[error("Not signed in")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for {email}")]
    EmailTaken { email: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl CrmError {
    /// Title used for the toast raised when a mutation fails with this error.
    pub fn toast_title(&self) -> &'static str {
        match self {
            CrmError::Unauthorized | CrmError::InvalidCredentials => "Authentication error",
            CrmError::Forbidden(_) => "Permission denied",
            CrmError::Validation(_) | CrmError::Parse(_) => "Invalid data",
            _ => "Database error",
        }
    }
}

impl From<anyhow::Error> for CrmError {
    fn from(err: anyhow::Error) -> Self {
        // Preserve typed errors that were raised inside a DbHandle closure.
        match err.downcast::<CrmError>() {
            Ok(crm) => crm,
            Err(other) => CrmError::Database(other),
        }
    }
}
