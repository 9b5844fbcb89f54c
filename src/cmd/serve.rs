//! CRM server command: `fera serve`.

use anyhow::Result;
use std::path::{Path, PathBuf};

pub async fn cmd_serve(
    project_dir: &Path,
    verbose: bool,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let (mut config, _guard) = super::load_config(project_dir, verbose)?;
    config.apply_cli(port, db_path, dev);

    for warning in config.toml.validate() {
        tracing::warn!("{}", warning);
    }

    fera::crm::server::start_server(config.server_config()).await
}
