//! Project initialization: `fera init`.
//!
//! ```text
//! .fera/
//! ├── fera.toml    # Configuration (defaults written on first init)
//! ├── crm.db       # SQLite store
//! └── logs/        # Optional file logging target
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, FeraConfig, FeraToml, get_fera_dir};
use crate::crm::db::CrmDb;

/// Result of initializing a FERA project.
#[derive(Debug)]
pub struct InitResult {
    pub fera_dir: PathBuf,
    /// False when `.fera/` already existed.
    pub created: bool,
    /// True when a default `fera.toml` was written.
    pub config_written: bool,
    pub db_path: PathBuf,
}

/// Initialize a FERA project in the given directory.
///
/// Existing files are never overwritten; a second run only fills in what
/// is missing.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let fera_dir = get_fera_dir(project_dir);
    let created = !fera_dir.exists();

    std::fs::create_dir_all(fera_dir.join("logs"))
        .with_context(|| format!("Failed to create directory: {}", fera_dir.display()))?;

    let config_path = fera_dir.join(CONFIG_FILE);
    let config_written = if config_path.exists() {
        false
    } else {
        FeraToml::default().save(&config_path)?;
        true
    };

    let config = FeraConfig::new(project_dir.to_path_buf())?;
    let db_path = config.db_path();
    init_database(&db_path)?;

    Ok(InitResult {
        fera_dir,
        created,
        config_written,
        db_path,
    })
}

/// Create the database file and run migrations.
pub fn init_database(db_path: &Path) -> Result<CrmDb> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    CrmDb::new(db_path)
        .with_context(|| format!("Failed to initialize database at {}", db_path.display()))
}

/// Check if a project is already initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    get_fera_dir(project_dir).exists()
}
