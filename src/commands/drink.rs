use clap::{Args, Subcommand, ValueEnum};

use super::food::confirm;
use super::{parse_date_arg, parse_range_arg};
use crate::db::DrinkLogRepository;
use crate::models::{DrinkItem, DrinkLog};
use crate::search::rank_matches;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct DrinkCommand {
    #[command(subcommand)]
    pub command: DrinkSubcommand,
}

#[derive(Subcommand)]
pub enum DrinkSubcommand {
    /// Log drinks had at a point in time
    Log {
        /// Drink names (at least one)
        #[arg(required = true)]
        items: Vec<String>,

        /// When (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List drink logs
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

    /// Show a single drink log
    Show {
        /// Log id
        id: i64,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Replace a drink log's date and items
    Update {
        /// Log id
        id: i64,

        /// New item list (can be repeated)
        #[arg(long = "item", value_name = "NAME")]
        items: Vec<String>,

        /// New date
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a drink log (catalog items are kept)
    Delete {
        /// Log id
        id: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List catalog items, optionally filtered
    Items {
        /// Search term (starts-with matches rank first)
        #[arg(long)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Merge one catalog item into another
    MergeItems {
        /// Item id to keep
        #[arg(long)]
        keep: i64,

        /// Item id to discard
        #[arg(long)]
        discard: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl DrinkCommand {
    pub async fn run(&self, repo: &DrinkLogRepository) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            DrinkSubcommand::Log { items, date } => {
                let date = parse_date_arg(date.as_deref())?;
                let log = DrinkLog::new(date)
                    .with_items(items.iter().map(DrinkItem::new).collect());

                let created = repo.insert(&log).await?;
                println!("Logged drink:");
                println!("{}", created);
                Ok(())
            }

            DrinkSubcommand::List {
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
                        println!("--- {} drink log(s) ---", logs.len());
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
                    println!("No drink logs found");
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

            DrinkSubcommand::Show { id, format } => match repo.get_by_id(*id).await? {
                Some(log) => {
                    match format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&log)?);
                        }
                        OutputFormat::Text => {
                            print!("{}", log);
                        }
                    }
                    Ok(())
                }
                None => Err(format!("Drink log not found: {}", id).into()),
            },

            DrinkSubcommand::Update { id, items, date } => {
                let mut log = match repo.get_by_id(*id).await? {
                    Some(log) => log,
                    None => return Err(format!("Drink log not found: {}", id).into()),
                };

                if items.is_empty() && date.is_none() {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                if let Some(date) = date {
                    log.date = parse_date_arg(Some(date))?;
                }
                if !items.is_empty() {
                    log.items = items.iter().map(DrinkItem::new).collect();
                }

                let updated = repo.update(&log).await?;
                println!("Updated drink log:");
                println!("{}", updated);
                Ok(())
            }

            DrinkSubcommand::Delete { id, force } => {
                let log = match repo.get_by_id(*id).await? {
                    Some(log) => log,
                    None => return Err(format!("Drink log not found: {}", id).into()),
                };

                if !force && !confirm(&format!("Delete drink log #{}?", log.id))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.delete(log.id).await?;
                println!("Deleted drink log #{}", log.id);
                Ok(())
            }

            DrinkSubcommand::Items { search, format } => {
                let items = repo.list_items().await?;
                let items = match search {
                    Some(term) => rank_matches(term, items, |item| item.name.as_str()),
                    None => items,
                };

                if items.is_empty() {
                    println!("No drink items found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<6}  NAME", "ID");
                        for item in &items {
                            println!("{:<6}  {}", item.id, item.name);
                        }
                        println!("\nTotal: {} item(s)", items.len());
                    }
                }
                Ok(())
            }

            DrinkSubcommand::MergeItems {
                keep,
                discard,
                force,
            } => {
                let count = repo.count_logs_containing_item(*discard).await?;
                if !force
                    && !confirm(&format!(
                        "Merge item {} into {}? {} log(s) will be re-pointed.",
                        discard, keep, count
                    ))?
                {
                    println!("Merge cancelled.");
                    return Ok(());
                }

                repo.merge_items(*keep, *discard).await?;
                println!("Merged item {} into {}", discard, keep);
                Ok(())
            }
        }
    }
}
