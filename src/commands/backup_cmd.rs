use clap::Args;

use crate::backup::backup_database;
use crate::config::Config;

#[derive(Args)]
pub struct BackupCommand {}

impl BackupCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        if !config.database_path.exists() {
            return Err(format!(
                "No database at '{}'. Nothing to back up.",
                config.database_path.display()
            )
            .into());
        }

        let dest = backup_database(&config.database_path)?;
        println!("Backed up database to {}", dest.display());
        Ok(())
    }
}
