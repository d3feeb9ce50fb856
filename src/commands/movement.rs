use clap::{Args, Subcommand, ValueEnum};

use super::food::confirm;
use super::{parse_date_arg, parse_range_arg};
use crate::db::MovementLogRepository;
use crate::models::{MovementLog, StoolType};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct MovementCommand {
    #[command(subcommand)]
    pub command: MovementSubcommand,
}

#[derive(Subcommand)]
pub enum MovementSubcommand {
    /// Log a bowel movement
    Log {
        /// Classification, e.g. "normal" or "mild-diarrhea"
        #[arg(long = "type", value_name = "STOOL_TYPE")]
        stool_type: String,

        /// When (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List movement logs
    List {
        /// Start of the date range (inclusive)
        #[arg(long)]
        from: Option<String>,

        /// End of the date range (inclusive)
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Keep watching and reprint whenever the logs change
        #[arg(long)]
        follow: bool,
    },

    /// Delete a movement log
    Delete {
        /// Log id
        id: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl MovementCommand {
    pub async fn run(
        &self,
        repo: &MovementLogRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MovementSubcommand::Log { stool_type, date } => {
                let stool_type: StoolType = stool_type.parse()?;
                let date = parse_date_arg(date.as_deref())?;

                let created = repo.insert(&MovementLog::new(date, stool_type)).await?;
                println!("Logged movement:");
                print!("{}", created);
                Ok(())
            }

            MovementSubcommand::List {
                from,
                to,
                format,
                follow,
            } => {
                if *follow {
                    let mut watch = if from.is_none() && to.is_none() {
                        repo.watch_all().await
                    } else {
                        let (from, to) = parse_range_arg(from.as_deref(), to.as_deref())?;
                        repo.watch_between(from, to).await
                    };
                    while let Some(snapshot) = watch.next().await {
                        let logs = snapshot?;
                        println!("--- {} movement log(s) ---", logs.len());
                        for log in &logs {
                            print!("{}", log);
                        }
                    }
                    return Ok(());
                }

                let logs = if from.is_none() && to.is_none() {
                    repo.list().await?
                } else {
                    let (from, to) = parse_range_arg(from.as_deref(), to.as_deref())?;
                    repo.list_between(from, to).await?
                };

                if logs.is_empty() {
                    println!("No movement logs found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&logs)?);
                    }
                    OutputFormat::Text => {
                        for log in &logs {
                            print!("{}", log);
                        }
                        println!("Total: {} log(s)", logs.len());
                    }
                }
                Ok(())
            }

            MovementSubcommand::Delete { id, force } => {
                let log = match repo.get_by_id(*id).await? {
                    Some(log) => log,
                    None => return Err(format!("Movement log not found: {}", id).into()),
                };

                if !force && !confirm(&format!("Delete movement log #{}?", log.id))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.delete(log.id).await?;
                println!("Deleted movement log #{}", log.id);
                Ok(())
            }
        }
    }
}
