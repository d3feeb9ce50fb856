use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gutlog::commands::{
    BackupCommand, ConfigCommand, DrinkCommand, FoodCommand, ImportCommand, MovementCommand,
    SymptomCommand,
};
use gutlog::config::Config;
use gutlog::db::{
    init_db, ChangeHub, DrinkLogRepository, FoodLogRepository, MovementLogRepository,
    SymptomLogRepository,
};

#[derive(Parser)]
#[command(name = "gutlog")]
#[command(version)]
#[command(about = "A food, symptom, and movement diary", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and browse food entries
    Food(FoodCommand),

    /// Log and browse drink entries
    Drink(DrinkCommand),

    /// Log and browse symptom entries
    Symptom(SymptomCommand),

    /// Log and browse movement entries
    Movement(MovementCommand),

    /// Import recipes from the configured recipe service
    Import(ImportCommand),

    /// Copy the database into the downloads directory
    Backup(BackupCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gutlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Food(cmd)) => {
            let pool = init_db(Some(config.database_path.clone())).await?;
            let repo = FoodLogRepository::new(pool, Arc::new(ChangeHub::new()));
            cmd.run(&repo).await?;
        }
        Some(Commands::Drink(cmd)) => {
            let pool = init_db(Some(config.database_path.clone())).await?;
            let repo = DrinkLogRepository::new(pool, Arc::new(ChangeHub::new()));
            cmd.run(&repo).await?;
        }
        Some(Commands::Symptom(cmd)) => {
            let pool = init_db(Some(config.database_path.clone())).await?;
            let repo = SymptomLogRepository::new(pool, Arc::new(ChangeHub::new()));
            cmd.run(&repo).await?;
        }
        Some(Commands::Movement(cmd)) => {
            let pool = init_db(Some(config.database_path.clone())).await?;
            let repo = MovementLogRepository::new(pool, Arc::new(ChangeHub::new()));
            cmd.run(&repo).await?;
        }
        Some(Commands::Import(cmd)) => {
            let pool = init_db(Some(config.database_path.clone())).await?;
            let repo = FoodLogRepository::new(pool, Arc::new(ChangeHub::new()));
            cmd.run(&repo, &config).await?;
        }
        Some(Commands::Backup(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
