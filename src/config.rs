//! Configuration for FERA CRM.
//!
//! Settings are layered: `.fera/fera.toml`, then environment variables
//! (`FERA_PORT`, `FERA_DB_PATH`, `FERA_LOG`, with `.env` loaded by the
//! binary), then command-line flags.
//!
//! Example `.fera/fera.toml`:
//!
//! ```toml
//! [server]
//! port = 3141
//! host = "127.0.0.1"
//! db_path = ".fera/crm.db"
//!
//! [toasts]
//! ttl_ms = 4000
//! sweep_interval_ms = 500
//!
//! [reports]
//! monthly_goal = 100000.0
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::crm::server::ServerConfig;

/// Directory holding the config file, database and logs.
pub const FERA_DIR: &str = ".fera";

/// Name of the config file inside [`FERA_DIR`].
pub const CONFIG_FILE: &str = "fera.toml";

/// Get the `.fera` directory for a project.
pub fn get_fera_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(FERA_DIR)
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3141
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".fera/crm.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

/// `[toasts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToastsSection {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_ttl_ms() -> u64 {
    4000
}

fn default_sweep_interval_ms() -> u64 {
    500
}

impl Default for ToastsSection {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// `[reports]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsSection {
    #[serde(default = "default_monthly_goal")]
    pub monthly_goal: f64,
}

fn default_monthly_goal() -> f64 {
    fera_common::metrics::DEFAULT_MONTHLY_GOAL
}

impl Default for ReportsSection {
    fn default() -> Self {
        Self {
            monthly_goal: default_monthly_goal(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// `[logging]` section.
///
/// `format` stays a string here so that a typo surfaces as a validation
/// warning instead of a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    LogFormat::Pretty.to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            file: None,
        }
    }
}

impl LoggingSection {
    /// Parsed format, falling back to pretty for unknown values.
    pub fn log_format(&self) -> LogFormat {
        self.format.parse().unwrap_or_default()
    }
}

/// The complete fera.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeraToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub toasts: ToastsSection,
    #[serde(default)]
    pub reports: ReportsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl FeraToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fera.toml")
    }

    /// Load `fera.toml` from the given `.fera` directory.
    /// Returns default configuration if file doesn't exist.
    pub fn load_or_default(fera_dir: &Path) -> Result<Self> {
        let config_path = fera_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize fera.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.toasts.ttl_ms == 0 {
            warnings.push("toasts.ttl_ms is 0: toasts will expire immediately".to_string());
        } else if self.toasts.sweep_interval_ms > self.toasts.ttl_ms {
            warnings.push(format!(
                "toasts.sweep_interval_ms ({}) is longer than toasts.ttl_ms ({}): expired toasts will linger",
                self.toasts.sweep_interval_ms, self.toasts.ttl_ms
            ));
        }

        if let Err(e) = self.logging.format.parse::<LogFormat>() {
            warnings.push(format!("logging.format: {} (expected 'pretty' or 'json')", e));
        }

        let goal = self.reports.monthly_goal;
        if goal.is_nan() || goal <= 0.0 {
            warnings.push(format!(
                "reports.monthly_goal must be positive, got {}",
                self.reports.monthly_goal
            ));
        }

        warnings
    }
}

/// Environment overrides, read once so tests can supply them directly.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub port: Option<String>,
    pub db_path: Option<String>,
    pub log: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("FERA_PORT").ok(),
            db_path: std::env::var("FERA_DB_PATH").ok(),
            log: std::env::var("FERA_LOG").ok(),
        }
    }
}

/// Resolved configuration for a FERA project.
///
/// Merges settings from:
/// 1. fera.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct FeraConfig {
    pub project_dir: PathBuf,
    pub fera_dir: PathBuf,
    pub toml: FeraToml,
    pub verbose: bool,
}

impl FeraConfig {
    /// Load configuration for a project directory, applying the process
    /// environment.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        Self::with_env(project_dir, EnvOverrides::from_env())
    }

    pub fn with_env(project_dir: PathBuf, env: EnvOverrides) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let fera_dir = get_fera_dir(&project_dir);
        let mut toml = FeraToml::load_or_default(&fera_dir)?;

        if let Some(port) = env.port.filter(|p| !p.trim().is_empty()) {
            toml.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("FERA_PORT is not a valid port: {}", port))?;
        }
        if let Some(db_path) = env.db_path.filter(|p| !p.trim().is_empty()) {
            toml.server.db_path = PathBuf::from(db_path);
        }
        if let Some(level) = env.log.filter(|l| !l.trim().is_empty()) {
            toml.logging.level = level;
        }

        Ok(Self {
            project_dir,
            fera_dir,
            toml,
            verbose: false,
        })
    }

    /// Apply command-line overrides for the server.
    pub fn apply_cli(&mut self, port: Option<u16>, db_path: Option<PathBuf>, dev: bool) {
        if let Some(port) = port {
            self.toml.server.port = port;
        }
        if let Some(db_path) = db_path {
            self.toml.server.db_path = db_path;
        }
        if dev {
            self.toml.server.dev_mode = true;
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.fera_dir.join(CONFIG_FILE)
    }

    /// Database path, resolved against the project directory.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.toml.server.db_path)
    }

    /// Log file path, if file logging is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.toml.logging.file.as_deref().map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        let server = &self.toml.server;
        ServerConfig {
            port: server.port,
            host: server.host.clone(),
            db_path: self.db_path(),
            dev_mode: server.dev_mode,
            toast_ttl: Duration::from_millis(self.toml.toasts.ttl_ms),
            sweep_interval: Duration::from_millis(self.toml.toasts.sweep_interval_ms),
            monthly_goal: self.toml.reports.monthly_goal,
        }
    }
}
