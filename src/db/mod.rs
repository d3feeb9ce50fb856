mod drink_repo;
mod food_repo;
mod movement_repo;
mod symptom_repo;

pub use drink_repo::DrinkLogRepository;
pub use food_repo::FoodLogRepository;
pub use movement_repo::MovementLogRepository;
pub use symptom_repo::SymptomLogRepository;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::{broadcast, RwLock};

/// Initialize the database connection pool and run migrations
pub async fn init_db(db_path: Option<PathBuf>) -> Result<SqlitePool, sqlx::Error> {
    let path = db_path.expect("database_path must be provided");

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create database directory");
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Tables a watcher can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    FoodItems,
    FoodLogs,
    DrinkItems,
    DrinkLogs,
    Symptoms,
    SymptomLogs,
    MovementLogs,
}

/// Fans write-commit notifications out to query watchers.
///
/// Repositories notify their table after every committed write; watchers
/// subscribe and re-run their query on each tick.
pub struct ChangeHub {
    /// Broadcast channels per table
    channels: RwLock<HashMap<Table, broadcast::Sender<()>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to change notifications for a table.
    pub async fn subscribe(&self, table: Table) -> broadcast::Receiver<()> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&table) {
            sender.subscribe()
        } else {
            // Create new channel with buffer of 16 messages
            let (sender, receiver) = broadcast::channel(16);
            channels.insert(table, sender);
            receiver
        }
    }

    /// Notifies all subscribers that a table changed.
    pub async fn notify(&self, table: Table) {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&table) {
            // Ignore send errors (no subscribers)
            let _ = sender.send(());
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

type Refetch<T> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, sqlx::Error>> + Send>;

/// A push-based snapshot stream over one query.
///
/// The first `next()` yields the current result immediately; every later
/// `next()` waits for a change notification and re-runs the query. Dropping
/// the watcher tears the subscription down.
pub struct Watch<T> {
    rx: broadcast::Receiver<()>,
    refetch: Refetch<T>,
    primed: bool,
}

impl<T> Watch<T> {
    pub(crate) fn new(rx: broadcast::Receiver<()>, refetch: Refetch<T>) -> Self {
        Self {
            rx,
            refetch,
            primed: false,
        }
    }

    /// Returns the next snapshot, or `None` once the hub is gone.
    ///
    /// A lagged receiver re-queries instead of failing: snapshots are
    /// self-contained, so a missed tick loses nothing.
    pub async fn next(&mut self) -> Option<Result<T, sqlx::Error>> {
        if !self.primed {
            self.primed = true;
            return Some((self.refetch)().await);
        }

        match self.rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                Some((self.refetch)().await)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// The log half of a repository, one implementation per storage technology.
/// The SQLite repositories are the production adapters; tests substitute an
/// in-memory fake.
#[allow(async_fn_in_trait)]
pub trait LogStore {
    type Log;

    async fn insert(&self, log: &Self::Log) -> Result<Self::Log, sqlx::Error>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Self::Log>, sqlx::Error>;
    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self::Log>, sqlx::Error>;
    async fn delete(&self, id: i64) -> Result<(), sqlx::Error>;
}

/// Parses a stored RFC 3339 date column back into a UTC timestamp.
pub(crate) fn parse_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovementLog, StoolType};
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(Some(db_path)).await.unwrap();

        // Verify tables exist
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"food_items"));
        assert!(table_names.contains(&"food_logs"));
        assert!(table_names.contains(&"food_log_items"));
        assert!(table_names.contains(&"drink_items"));
        assert!(table_names.contains(&"symptom_log_symptoms"));
        assert!(table_names.contains(&"movement_logs"));
    }

    #[tokio::test]
    async fn test_change_hub_subscribe_and_notify() {
        let hub = ChangeHub::new();

        let mut rx = hub.subscribe(Table::FoodLogs).await;

        hub.notify(Table::FoodLogs).await;

        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_change_hub_isolated_tables() {
        let hub = ChangeHub::new();

        let mut food_rx = hub.subscribe(Table::FoodLogs).await;
        let mut drink_rx = hub.subscribe(Table::DrinkLogs).await;

        hub.notify(Table::FoodLogs).await;

        assert!(food_rx.try_recv().is_ok());
        assert!(drink_rx.try_recv().is_err());
    }

    /// In-memory stand-in proving the trait seam supports substitution.
    struct FakeMovementStore {
        logs: Mutex<Vec<MovementLog>>,
    }

    impl FakeMovementStore {
        fn new() -> Self {
            Self {
                logs: Mutex::new(Vec::new()),
            }
        }
    }

    impl LogStore for FakeMovementStore {
        type Log = MovementLog;

        async fn insert(&self, log: &MovementLog) -> Result<MovementLog, sqlx::Error> {
            let mut logs = self.logs.lock().unwrap();
            let mut stored = log.clone();
            stored.id = logs.len() as i64 + 1;
            logs.push(stored.clone());
            Ok(stored)
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<MovementLog>, sqlx::Error> {
            let logs = self.logs.lock().unwrap();
            Ok(logs.iter().find(|l| l.id == id).cloned())
        }

        async fn list_between(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<MovementLog>, sqlx::Error> {
            let logs = self.logs.lock().unwrap();
            Ok(logs
                .iter()
                .filter(|l| l.date >= from && l.date <= to)
                .cloned()
                .collect())
        }

        async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
            let mut logs = self.logs.lock().unwrap();
            logs.retain(|l| l.id != id);
            Ok(())
        }
    }

    async fn count_in_window<S: LogStore>(
        store: &S,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, sqlx::Error> {
        Ok(store.list_between(from, to).await?.len())
    }

    #[tokio::test]
    async fn test_log_store_fake_substitution() {
        let store = FakeMovementStore::new();
        let date = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();

        let inserted = store
            .insert(&MovementLog::new(date, StoolType::Normal))
            .await
            .unwrap();
        assert_eq!(inserted.id, 1);

        let fetched = store.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(fetched.stool_type, StoolType::Normal);

        let from = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap();
        assert_eq!(count_in_window(&store, from, to).await.unwrap(), 1);

        store.delete(1).await.unwrap();
        assert_eq!(count_in_window(&store, from, to).await.unwrap(), 0);
    }
}
