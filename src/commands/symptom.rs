use clap::{Args, Subcommand, ValueEnum};

use super::food::confirm;
use super::{parse_date_arg, parse_range_arg};
use crate::db::SymptomLogRepository;
use crate::models::{LoggedSymptom, Severity, Symptom, SymptomLog};
use crate::search::rank_matches;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct SymptomCommand {
    #[command(subcommand)]
    pub command: SymptomSubcommand,
}

#[derive(Subcommand)]
pub enum SymptomSubcommand {
    /// Log symptoms felt at a point in time
    Log {
        /// Symptom entries as name:severity, e.g. "bloating:severe"
        #[arg(required = true)]
        symptoms: Vec<String>,

        /// When (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List symptom logs
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

    /// Delete a symptom log
    Delete {
        /// Log id
        id: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List catalog symptoms, optionally filtered
    Items {
        /// Search term (starts-with matches rank first)
        #[arg(long)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Merge one catalog symptom into another
    Merge {
        /// Symptom id to keep
        #[arg(long)]
        keep: i64,

        /// Symptom id to discard
        #[arg(long)]
        discard: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// Parses a "name:severity" argument into a logged symptom.
fn parse_logged_symptom(raw: &str) -> Result<LoggedSymptom, String> {
    let (name, severity) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("Expected name:severity, got '{}'", raw))?;

    if name.trim().is_empty() {
        return Err(format!("Symptom name is empty in '{}'", raw));
    }

    Ok(LoggedSymptom {
        symptom: Symptom::new(name),
        severity: severity.parse::<Severity>()?,
    })
}

impl SymptomCommand {
    pub async fn run(
        &self,
        repo: &SymptomLogRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SymptomSubcommand::Log { symptoms, date } => {
                let date = parse_date_arg(date.as_deref())?;
                let parsed: Result<Vec<LoggedSymptom>, String> =
                    symptoms.iter().map(|s| parse_logged_symptom(s)).collect();

                let log = SymptomLog::new(date).with_symptoms(parsed?);
                let created = repo.insert(&log).await?;
                println!("Logged symptoms:");
                println!("{}", created);
                Ok(())
            }

            SymptomSubcommand::List {
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
                        println!("--- {} symptom log(s) ---", logs.len());
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
                    println!("No symptom logs found");
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

            SymptomSubcommand::Delete { id, force } => {
                let log = match repo.get_by_id(*id).await? {
                    Some(log) => log,
                    None => return Err(format!("Symptom log not found: {}", id).into()),
                };

                if !force && !confirm(&format!("Delete symptom log #{}?", log.id))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.delete(log.id).await?;
                println!("Deleted symptom log #{}", log.id);
                Ok(())
            }

            SymptomSubcommand::Items { search, format } => {
                let symptoms = repo.list_symptoms().await?;
                let symptoms = match search {
                    Some(term) => rank_matches(term, symptoms, |s| s.name.as_str()),
                    None => symptoms,
                };

                if symptoms.is_empty() {
                    println!("No symptoms found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&symptoms)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<6}  NAME", "ID");
                        for symptom in &symptoms {
                            println!("{:<6}  {}", symptom.id, symptom.name);
                        }
                        println!("\nTotal: {} symptom(s)", symptoms.len());
                    }
                }
                Ok(())
            }

            SymptomSubcommand::Merge {
                keep,
                discard,
                force,
            } => {
                let count = repo.count_logs_containing_symptom(*discard).await?;
                if !force
                    && !confirm(&format!(
                        "Merge symptom {} into {}? {} log(s) will be re-pointed.",
                        discard, keep, count
                    ))?
                {
                    println!("Merge cancelled.");
                    return Ok(());
                }

                repo.merge_symptoms(*keep, *discard).await?;
                println!("Merged symptom {} into {}", discard, keep);
                Ok(())
            }
        }
    }
}
