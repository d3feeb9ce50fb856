use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{parse_date, ChangeHub, LogStore, Table, Watch};
use crate::models::{MovementLog, StoolType};

/// Movement logs have no item associations, so this is the plain half of the
/// repository shape: no catalog, no cross-references.
#[derive(Clone)]
pub struct MovementLogRepository {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    date: String,
    stool_type: String,
}

impl MovementLogRepository {
    pub fn new(pool: SqlitePool, hub: Arc<ChangeHub>) -> Self {
        Self { pool, hub }
    }

    pub async fn insert(&self, log: &MovementLog) -> Result<MovementLog, sqlx::Error> {
        let result = sqlx::query("INSERT INTO movement_logs (date, stool_type) VALUES (?, ?)")
            .bind(log.date.to_rfc3339())
            .bind(log.stool_type.to_string())
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::MovementLogs).await;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<MovementLog>, sqlx::Error> {
        let row: Option<LogRow> =
            sqlx::query_as("SELECT id, date, stool_type FROM movement_logs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(hydrate_log))
    }

    pub async fn list(&self) -> Result<Vec<MovementLog>, sqlx::Error> {
        let rows: Vec<LogRow> =
            sqlx::query_as("SELECT id, date, stool_type FROM movement_logs ORDER BY date")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(hydrate_log).collect())
    }

    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MovementLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, date, stool_type FROM movement_logs \
             WHERE date >= ? AND date <= ? ORDER BY date",
        )
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(hydrate_log).collect())
    }

    pub async fn update(&self, log: &MovementLog) -> Result<MovementLog, sqlx::Error> {
        sqlx::query("UPDATE movement_logs SET date = ?, stool_type = ? WHERE id = ?")
            .bind(log.date.to_rfc3339())
            .bind(log.stool_type.to_string())
            .bind(log.id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::MovementLogs).await;

        self.get_by_id(log.id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM movement_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::MovementLogs).await;
        Ok(())
    }

    pub async fn watch_all(&self) -> Watch<Vec<MovementLog>> {
        let rx = self.hub.subscribe(Table::MovementLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list().await })
            }),
        )
    }

    pub async fn watch_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Watch<Vec<MovementLog>> {
        let rx = self.hub.subscribe(Table::MovementLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_between(from, to).await })
            }),
        )
    }

    pub async fn watch_by_id(&self, id: i64) -> Watch<Option<MovementLog>> {
        let rx = self.hub.subscribe(Table::MovementLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.get_by_id(id).await })
            }),
        )
    }
}

fn hydrate_log(row: LogRow) -> MovementLog {
    MovementLog {
        id: row.id,
        date: parse_date(&row.date),
        stool_type: row.stool_type.parse().unwrap_or(StoolType::Normal),
    }
}

impl LogStore for MovementLogRepository {
    type Log = MovementLog;

    async fn insert(&self, log: &MovementLog) -> Result<MovementLog, sqlx::Error> {
        MovementLogRepository::insert(self, log).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MovementLog>, sqlx::Error> {
        MovementLogRepository::get_by_id(self, id).await
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MovementLog>, sqlx::Error> {
        MovementLogRepository::list_between(self, from, to).await
    }

    async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        MovementLogRepository::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct TestContext {
        repo: MovementLogRepository,
        _temp_dir: TempDir,
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(Some(db_path)).await.unwrap();
        TestContext {
            repo: MovementLogRepository::new(pool, Arc::new(ChangeHub::new())),
            _temp_dir: temp_dir,
        }
    }

    fn date(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&MovementLog::new(date(13, 7), StoolType::MildConstipation))
            .await
            .unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.stool_type, StoolType::MildConstipation);
        assert_eq!(fetched.date, date(13, 7));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let ctx = setup_repo().await;
        assert!(ctx.repo.get_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_changes_classification() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&MovementLog::new(date(14, 8), StoolType::Normal))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.stool_type = StoolType::SevereDiarrhea;

        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.stool_type, StoolType::SevereDiarrhea);
    }

    #[tokio::test]
    async fn test_list_between_ordered_by_date() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        repo.insert(&MovementLog::new(date(15, 20), StoolType::Normal))
            .await
            .unwrap();
        repo.insert(&MovementLog::new(date(15, 6), StoolType::Normal))
            .await
            .unwrap();

        let logs = repo
            .list_between(date(15, 0), date(15, 23))
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].date < logs[1].date);
    }

    #[tokio::test]
    async fn test_watch_all_ticks_on_delete() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&MovementLog::new(date(16, 9), StoolType::Normal))
            .await
            .unwrap();

        let mut watch = repo.watch_all().await;
        assert_eq!(watch.next().await.unwrap().unwrap().len(), 1);

        repo.delete(created.id).await.unwrap();
        assert!(watch.next().await.unwrap().unwrap().is_empty());
    }
}
