use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{parse_date, ChangeHub, LogStore, Table, Watch};
use crate::models::{normalize_item_name, DrinkItem, DrinkLog};

#[derive(Clone)]
pub struct DrinkLogRepository {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    date: String,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    name: String,
}

impl DrinkLogRepository {
    pub fn new(pool: SqlitePool, hub: Arc<ChangeHub>) -> Self {
        Self { pool, hub }
    }

    pub async fn insert_item(&self, name: &str) -> Result<DrinkItem, sqlx::Error> {
        let name = normalize_item_name(name);
        let result = sqlx::query("INSERT INTO drink_items (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::DrinkItems).await;

        Ok(DrinkItem {
            id: result.last_insert_rowid(),
            name,
        })
    }

    /// Case-insensitive lookup, insert if absent. Same accepted race as the
    /// food catalog.
    pub async fn insert_or_get_item(&self, name: &str) -> Result<DrinkItem, sqlx::Error> {
        let name = normalize_item_name(name);
        let existing: Option<ItemRow> =
            sqlx::query_as("SELECT id, name FROM drink_items WHERE LOWER(name) = LOWER(?)")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(row) => Ok(DrinkItem {
                id: row.id,
                name: row.name,
            }),
            None => self.insert_item(&name).await,
        }
    }

    pub async fn list_items(&self) -> Result<Vec<DrinkItem>, sqlx::Error> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT id, name FROM drink_items ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| DrinkItem {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    pub async fn rename_item(&self, id: i64, name: &str) -> Result<(), sqlx::Error> {
        let name = normalize_item_name(name);
        sqlx::query("UPDATE drink_items SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::DrinkItems).await;
        self.hub.notify(Table::DrinkLogs).await;
        Ok(())
    }

    pub async fn delete_item(&self, id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM drink_log_items WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM drink_items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.hub.notify(Table::DrinkItems).await;
        self.hub.notify(Table::DrinkLogs).await;
        Ok(())
    }

    pub async fn merge_items(&self, keep_id: i64, discard_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE OR IGNORE drink_log_items SET item_id = ? WHERE item_id = ?")
            .bind(keep_id)
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM drink_log_items WHERE item_id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM drink_items WHERE id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("merged drink item {} into {}", discard_id, keep_id);
        self.hub.notify(Table::DrinkItems).await;
        self.hub.notify(Table::DrinkLogs).await;
        Ok(())
    }

    pub async fn count_logs_containing_item(&self, item_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM drink_log_items WHERE item_id = ?")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn insert(&self, log: &DrinkLog) -> Result<DrinkLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let date = log.date.to_rfc3339();
        let result = sqlx::query("INSERT INTO drink_logs (date) VALUES (?)")
            .bind(&date)
            .execute(&mut *tx)
            .await?;
        let log_id = result.last_insert_rowid();

        for item in &log.items {
            let item_id = resolve_item(&mut tx, &item.name).await?;
            sqlx::query("INSERT OR IGNORE INTO drink_log_items (log_id, item_id) VALUES (?, ?)")
                .bind(log_id)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::DrinkItems).await;
        self.hub.notify(Table::DrinkLogs).await;

        self.get_by_id(log_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<DrinkLog>, sqlx::Error> {
        let row: Option<LogRow> = sqlx::query_as("SELECT id, date FROM drink_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_log(row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<DrinkLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as("SELECT id, date FROM drink_logs ORDER BY date")
            .fetch_all(&self.pool)
            .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            logs.push(self.hydrate_log(row).await?);
        }
        Ok(logs)
    }

    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DrinkLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, date FROM drink_logs WHERE date >= ? AND date <= ? ORDER BY date",
        )
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            logs.push(self.hydrate_log(row).await?);
        }
        Ok(logs)
    }

    pub async fn update(&self, log: &DrinkLog) -> Result<DrinkLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE drink_logs SET date = ? WHERE id = ?")
            .bind(log.date.to_rfc3339())
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM drink_log_items WHERE log_id = ?")
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        for item in &log.items {
            let item_id = resolve_item(&mut tx, &item.name).await?;
            sqlx::query("INSERT OR IGNORE INTO drink_log_items (log_id, item_id) VALUES (?, ?)")
                .bind(log.id)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::DrinkItems).await;
        self.hub.notify(Table::DrinkLogs).await;

        self.get_by_id(log.id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        // CASCADE handles the cross-reference rows
        sqlx::query("DELETE FROM drink_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::DrinkLogs).await;
        Ok(())
    }

    pub async fn watch_items(&self) -> Watch<Vec<DrinkItem>> {
        let rx = self.hub.subscribe(Table::DrinkItems).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_items().await })
            }),
        )
    }

    pub async fn watch_all(&self) -> Watch<Vec<DrinkLog>> {
        let rx = self.hub.subscribe(Table::DrinkLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list().await })
            }),
        )
    }

    pub async fn watch_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Watch<Vec<DrinkLog>> {
        let rx = self.hub.subscribe(Table::DrinkLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_between(from, to).await })
            }),
        )
    }

    pub async fn watch_by_id(&self, id: i64) -> Watch<Option<DrinkLog>> {
        let rx = self.hub.subscribe(Table::DrinkLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.get_by_id(id).await })
            }),
        )
    }

    async fn hydrate_log(&self, row: LogRow) -> Result<DrinkLog, sqlx::Error> {
        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT drink_items.id, drink_items.name FROM drink_items \
             JOIN drink_log_items ON drink_log_items.item_id = drink_items.id \
             WHERE drink_log_items.log_id = ? ORDER BY drink_log_items.rowid",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(DrinkLog {
            id: row.id,
            date: parse_date(&row.date),
            items: items
                .into_iter()
                .map(|item| DrinkItem {
                    id: item.id,
                    name: item.name,
                })
                .collect(),
        })
    }
}

async fn resolve_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    let name = normalize_item_name(name);
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM drink_items WHERE LOWER(name) = LOWER(?)")
            .bind(&name)
            .fetch_optional(&mut **tx)
            .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO drink_items (name) VALUES (?)")
        .bind(&name)
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}

impl LogStore for DrinkLogRepository {
    type Log = DrinkLog;

    async fn insert(&self, log: &DrinkLog) -> Result<DrinkLog, sqlx::Error> {
        DrinkLogRepository::insert(self, log).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<DrinkLog>, sqlx::Error> {
        DrinkLogRepository::get_by_id(self, id).await
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DrinkLog>, sqlx::Error> {
        DrinkLogRepository::list_between(self, from, to).await
    }

    async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        DrinkLogRepository::delete(self, id).await
    }
}
