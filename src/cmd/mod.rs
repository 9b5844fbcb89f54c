//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `init`   | `Init`           |
//! | `seed`   | `Seed`           |
//! | `score`  | `Score`          |
//! | `config` | `Config`         |

pub mod config;
pub mod init;
pub mod score;
pub mod seed;
pub mod serve;

pub use config::cmd_config;
pub use init::cmd_init;
pub use score::cmd_score;
pub use seed::cmd_seed;
pub use serve::cmd_serve;

use anyhow::Result;
use fera::config::FeraConfig;
use tracing_appender::non_blocking::WorkerGuard;

/// Load layered configuration and install the tracing subscriber.
fn load_config(
    project_dir: &std::path::Path,
    verbose: bool,
) -> Result<(FeraConfig, Option<WorkerGuard>)> {
    let mut config = FeraConfig::new(project_dir.to_path_buf())?;
    config.verbose = verbose;
    let guard = fera::logging::init(
        &config.toml.logging,
        config.log_file().as_deref(),
        verbose,
    )?;
    Ok((config, guard))
}
