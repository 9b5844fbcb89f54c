//! Project initialization command: `fera init`.

use anyhow::Result;
use std::path::Path;

pub fn cmd_init(project_dir: &Path, verbose: bool) -> Result<()> {
    use fera::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir)?;

    if result.created {
        println!("Initialized FERA project at {}", result.fera_dir.display());
        println!();
        println!("Created directory structure:");
        println!("  .fera/");
        println!("  ├── fera.toml   # Configuration (see `fera config show`)");
        println!("  ├── crm.db      # Lead, task and profile store");
        println!("  └── logs/       # Optional log output");
        println!();
        println!("Next steps:");
        println!("  1. Run `fera seed` to load the demo data");
        println!("  2. Run `fera serve` to start the server");
    } else if was_initialized {
        println!(
            "FERA project already initialized at {}",
            result.fera_dir.display()
        );
        if result.config_written {
            println!("Wrote missing fera.toml.");
        }
        println!("Database ready at {}", result.db_path.display());
    }

    if verbose {
        println!("Database: {}", result.db_path.display());
    }

    Ok(())
}
