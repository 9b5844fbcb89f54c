//! Demo data command: `fera seed`.

use anyhow::Result;
use console::style;
use std::path::Path;

pub fn cmd_seed(project_dir: &Path, verbose: bool, password: Option<&str>) -> Result<()> {
    use fera::crm::seed::{DEMO_PASSWORD, seed_demo};
    use fera::init::init_database;

    let (config, _guard) = super::load_config(project_dir, verbose)?;
    let db_path = config.db_path();
    let db = init_database(&db_path)?;

    let report = seed_demo(&db, password.unwrap_or(DEMO_PASSWORD))?;
    tracing::info!(
        account_id = %report.account_id,
        leads = report.leads,
        tasks = report.tasks,
        skipped = report.skipped,
        account_existed = report.account_existed,
        "Demo seed finished"
    );

    if report.account_existed && password.is_some() {
        println!(
            "{} --password was not applied; {} already exists and keeps its password.",
            style("Note:").yellow(),
            report.email
        );
    }

    if report.skipped {
        println!(
            "{} {} already has data; nothing written.",
            style("Skipped:").yellow(),
            report.email
        );
        return Ok(());
    }

    println!("Seeded demo data into {}", db_path.display());
    println!("  account  {}", report.email);
    println!("  leads    {}", report.leads);
    println!("  tasks    {}", report.tasks);
    println!("  members  {}", report.members);
    println!();
    if report.account_existed {
        println!("Sign in with the existing password for {}", report.email);
    } else {
        println!(
            "Sign in with {} / {}",
            report.email,
            password.unwrap_or(DEMO_PASSWORD)
        );
    }

    Ok(())
}
