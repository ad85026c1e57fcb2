//! Migrate command. Opening the store applies any pending migrations.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Path to the SQLite database (created if missing)
    #[arg(long, env = "HEARTH_DB")]
    pub db: PathBuf,
}

pub fn run(args: MigrateArgs) -> Result<()> {
    let store = hearth_store::Store::open(&args.db)
        .with_context(|| format!("opening database at {}", args.db.display()))?;
    let version = store.schema_version()?;
    println!("✓ Schema at version {} ({})", version, args.db.display());
    Ok(())
}
