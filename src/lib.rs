//! Gutlog core library
//!
//! A local food, drink, symptom, and movement diary: SQLite-backed
//! repositories with change-driven query watchers, a prioritized catalog
//! search, and a Mealie-compatible recipe import client.

pub mod backup;
pub mod commands;
pub mod config;
pub mod db;
pub mod mealie;
pub mod models;
pub mod search;

pub use backup::{backup_database, BackupError};
pub use config::{Config, ConfigError};
pub use db::{
    init_db, ChangeHub, DrinkLogRepository, FoodLogRepository, LogStore, MovementLogRepository,
    SymptomLogRepository, Table, Watch,
};
pub use mealie::{ensure_trailing_slash, MealieClient, MealieError, RecipeImport};
pub use models::{
    normalize_item_name, DrinkItem, DrinkLog, FoodItem, FoodLog, LoggedSymptom, MovementLog,
    Severity, StoolType, Symptom, SymptomLog,
};
pub use search::rank_matches;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
