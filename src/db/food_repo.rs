use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{parse_date, ChangeHub, LogStore, Table, Watch};
use crate::models::{normalize_item_name, FoodItem, FoodLog};

#[derive(Clone)]
pub struct FoodLogRepository {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

// Row types for database queries
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

impl FoodLogRepository {
    pub fn new(pool: SqlitePool, hub: Arc<ChangeHub>) -> Self {
        Self { pool, hub }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn insert_item(&self, name: &str) -> Result<FoodItem, sqlx::Error> {
        let name = normalize_item_name(name);
        let result = sqlx::query("INSERT INTO food_items (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::FoodItems).await;

        Ok(FoodItem {
            id: result.last_insert_rowid(),
            name,
        })
    }

    /// Looks an item up by name (case-insensitive) and inserts it if absent.
    /// Lookup and insert are two statements; concurrent callers racing on the
    /// same name can still produce duplicates.
    pub async fn insert_or_get_item(&self, name: &str) -> Result<FoodItem, sqlx::Error> {
        let name = normalize_item_name(name);
        let existing: Option<ItemRow> =
            sqlx::query_as("SELECT id, name FROM food_items WHERE LOWER(name) = LOWER(?)")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(row) => Ok(FoodItem {
                id: row.id,
                name: row.name,
            }),
            None => self.insert_item(&name).await,
        }
    }

    pub async fn list_items(&self) -> Result<Vec<FoodItem>, sqlx::Error> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT id, name FROM food_items ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| FoodItem {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    pub async fn rename_item(&self, id: i64, name: &str) -> Result<(), sqlx::Error> {
        let name = normalize_item_name(name);
        sqlx::query("UPDATE food_items SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        // Log snapshots embed item names
        self.hub.notify(Table::FoodItems).await;
        self.hub.notify(Table::FoodLogs).await;
        Ok(())
    }

    /// Removes an item and every cross-reference to it. Callers are expected
    /// to consult `count_logs_containing_item` and confirm with the user
    /// before deleting an item that is still referenced.
    pub async fn delete_item(&self, id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM food_log_items WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM food_items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.hub.notify(Table::FoodItems).await;
        self.hub.notify(Table::FoodLogs).await;
        Ok(())
    }

    /// Re-points every cross-reference from `discard_id` to `keep_id`, then
    /// deletes the discarded item. Runs as a single transaction; `discard_id`
    /// is gone afterward.
    pub async fn merge_items(&self, keep_id: i64, discard_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // A log holding both items must not end up with a duplicate join
        // row, so clashes on (log_id, item_id) are dropped instead.
        sqlx::query("UPDATE OR IGNORE food_log_items SET item_id = ? WHERE item_id = ?")
            .bind(keep_id)
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM food_log_items WHERE item_id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM food_items WHERE id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("merged food item {} into {}", discard_id, keep_id);
        self.hub.notify(Table::FoodItems).await;
        self.hub.notify(Table::FoodLogs).await;
        Ok(())
    }

    pub async fn count_logs_containing_item(&self, item_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM food_log_items WHERE item_id = ?")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Inserts the log row, resolves each item against the catalog, and
    /// writes one cross-reference per item, all in one transaction. Readers
    /// never observe a partial log.
    pub async fn insert(&self, log: &FoodLog) -> Result<FoodLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let date = log.date.to_rfc3339();
        let result = sqlx::query("INSERT INTO food_logs (date) VALUES (?)")
            .bind(&date)
            .execute(&mut *tx)
            .await?;
        let log_id = result.last_insert_rowid();

        for item in &log.items {
            let item_id = resolve_item(&mut tx, &item.name).await?;
            sqlx::query("INSERT OR IGNORE INTO food_log_items (log_id, item_id) VALUES (?, ?)")
                .bind(log_id)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::FoodItems).await;
        self.hub.notify(Table::FoodLogs).await;

        self.get_by_id(log_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<FoodLog>, sqlx::Error> {
        let row: Option<LogRow> = sqlx::query_as("SELECT id, date FROM food_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_log(row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<FoodLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as("SELECT id, date FROM food_logs ORDER BY date")
            .fetch_all(&self.pool)
            .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            logs.push(self.hydrate_log(row).await?);
        }
        Ok(logs)
    }

    /// Inclusive on both bounds.
    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FoodLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, date FROM food_logs WHERE date >= ? AND date <= ? ORDER BY date",
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

    /// Replaces the log row and its full set of cross-references. Existing
    /// associations are cleared and reinserted, not diffed.
    pub async fn update(&self, log: &FoodLog) -> Result<FoodLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE food_logs SET date = ? WHERE id = ?")
            .bind(log.date.to_rfc3339())
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM food_log_items WHERE log_id = ?")
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        for item in &log.items {
            let item_id = resolve_item(&mut tx, &item.name).await?;
            sqlx::query("INSERT OR IGNORE INTO food_log_items (log_id, item_id) VALUES (?, ?)")
                .bind(log.id)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::FoodItems).await;
        self.hub.notify(Table::FoodLogs).await;

        self.get_by_id(log.id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Removes the log and its cross-references; catalog items stay.
    pub async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        // CASCADE handles the cross-reference rows
        sqlx::query("DELETE FROM food_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::FoodLogs).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    pub async fn watch_items(&self) -> Watch<Vec<FoodItem>> {
        let rx = self.hub.subscribe(Table::FoodItems).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_items().await })
            }),
        )
    }

    pub async fn watch_all(&self) -> Watch<Vec<FoodLog>> {
        let rx = self.hub.subscribe(Table::FoodLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list().await })
            }),
        )
    }

    pub async fn watch_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Watch<Vec<FoodLog>> {
        let rx = self.hub.subscribe(Table::FoodLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_between(from, to).await })
            }),
        )
    }

    pub async fn watch_by_id(&self, id: i64) -> Watch<Option<FoodLog>> {
        let rx = self.hub.subscribe(Table::FoodLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.get_by_id(id).await })
            }),
        )
    }

    async fn hydrate_log(&self, row: LogRow) -> Result<FoodLog, sqlx::Error> {
        let items: Vec<ItemRow> = sqlx::query_as(
            "SELECT food_items.id, food_items.name FROM food_items \
             JOIN food_log_items ON food_log_items.item_id = food_items.id \
             WHERE food_log_items.log_id = ? ORDER BY food_log_items.rowid",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FoodLog {
            id: row.id,
            date: parse_date(&row.date),
            items: items
                .into_iter()
                .map(|item| FoodItem {
                    id: item.id,
                    name: item.name,
                })
                .collect(),
        })
    }
}

/// Resolves an item name to its catalog id inside an open transaction,
/// inserting the item if it does not exist yet.
async fn resolve_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    let name = normalize_item_name(name);
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM food_items WHERE LOWER(name) = LOWER(?)")
            .bind(&name)
            .fetch_optional(&mut **tx)
            .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO food_items (name) VALUES (?)")
        .bind(&name)
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}

impl LogStore for FoodLogRepository {
    type Log = FoodLog;

    async fn insert(&self, log: &FoodLog) -> Result<FoodLog, sqlx::Error> {
        FoodLogRepository::insert(self, log).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<FoodLog>, sqlx::Error> {
        FoodLogRepository::get_by_id(self, id).await
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FoodLog>, sqlx::Error> {
        FoodLogRepository::list_between(self, from, to).await
    }

    async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        FoodLogRepository::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct TestContext {
        repo: FoodLogRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(Some(db_path)).await.unwrap();
        TestContext {
            repo: FoodLogRepository::new(pool, Arc::new(ChangeHub::new())),
            _temp_dir: temp_dir,
        }
    }

    fn date(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_item_assigns_id() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let item = repo.insert_item("porridge").await.unwrap();
        assert!(item.id > 0);
        assert_eq!(item.name, "Porridge");
    }

    #[tokio::test]
    async fn test_insert_or_get_item_idempotent() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let first = repo.insert_or_get_item("apple pie").await.unwrap();
        let second = repo.insert_or_get_item("apple pie").await.unwrap();
        assert_eq!(first.id, second.id);

        // Case-varying input resolves to the same row
        let third = repo.insert_or_get_item("APPLE PIE").await.unwrap();
        assert_eq!(first.id, third.id);

        assert_eq!(repo.list_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_items_sorted_by_name() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        repo.insert_item("toast").await.unwrap();
        repo.insert_item("banana").await.unwrap();
        repo.insert_item("oats").await.unwrap();

        let items = repo.list_items().await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Banana", "Oats", "Toast"]);
    }

    #[tokio::test]
    async fn test_rename_item_reflected_in_logs() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let log = repo
            .insert(&FoodLog::new(date(13, 0)).with_items(vec![FoodItem::new("corgette")]))
            .await
            .unwrap();
        let item_id = log.items[0].id;

        repo.rename_item(item_id, "courgette").await.unwrap();

        let fetched = repo.get_by_id(log.id).await.unwrap().unwrap();
        assert_eq!(fetched.items[0].name, "Courgette");
    }

    #[tokio::test]
    async fn test_insert_log_with_items_and_read_back() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let log = FoodLog::new(date(12, 30)).with_items(vec![
            FoodItem::new("rice"),
            FoodItem::new("chicken"),
        ]);

        let created = repo.insert(&log).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.items.len(), 2);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        let names: Vec<&str> = fetched.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Rice", "Chicken"]);
    }

    #[tokio::test]
    async fn test_insert_log_reuses_existing_items() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let existing = repo.insert_item("coffee cake").await.unwrap();

        let log = FoodLog::new(date(15, 0)).with_items(vec![FoodItem::new("Coffee Cake")]);
        let created = repo.insert(&log).await.unwrap();

        assert_eq!(created.items[0].id, existing.id);
        assert_eq!(repo.list_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_between_inclusive_bounds() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let from = date(8, 0);
        let to = date(20, 0);

        repo.insert(&FoodLog::new(date(7, 59))).await.unwrap();
        let at_start = repo.insert(&FoodLog::new(from)).await.unwrap();
        let midday = repo.insert(&FoodLog::new(date(13, 0))).await.unwrap();
        let at_end = repo.insert(&FoodLog::new(to)).await.unwrap();
        repo.insert(&FoodLog::new(date(20, 1))).await.unwrap();

        let logs = repo.list_between(from, to).await.unwrap();
        let ids: Vec<i64> = logs.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![at_start.id, midday.id, at_end.id]);
    }

    #[tokio::test]
    async fn test_update_replaces_items() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&FoodLog::new(date(9, 0)).with_items(vec![FoodItem::new("bagel")]))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.date = date(9, 30);
        changed.items = vec![FoodItem::new("croissant"), FoodItem::new("jam")];

        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.date, date(9, 30));

        let names: Vec<&str> = updated.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Croissant", "Jam"]);

        // The old item stays in the catalog
        let catalog: Vec<String> = repo
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert!(catalog.contains(&"Bagel".to_string()));
    }

    #[tokio::test]
    async fn test_delete_log_keeps_catalog_items() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&FoodLog::new(date(18, 0)).with_items(vec![FoodItem::new("soup")]))
            .await
            .unwrap();
        let item_id = created.items[0].id;

        repo.delete(created.id).await.unwrap();

        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert_eq!(repo.count_logs_containing_item(item_id).await.unwrap(), 0);

        let catalog: Vec<String> = repo
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(catalog, vec!["Soup"]);
    }

    #[tokio::test]
    async fn test_merge_items_repoints_references() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let keep = repo.insert_item("yoghurt").await.unwrap();
        let discard = repo.insert_item("yogurt").await.unwrap();

        let log = repo
            .insert(&FoodLog::new(date(8, 0)).with_items(vec![FoodItem::new("yogurt")]))
            .await
            .unwrap();
        assert_eq!(log.items[0].id, discard.id);

        repo.merge_items(keep.id, discard.id).await.unwrap();

        assert_eq!(repo.count_logs_containing_item(discard.id).await.unwrap(), 0);
        assert_eq!(repo.count_logs_containing_item(keep.id).await.unwrap(), 1);

        let fetched = repo.get_by_id(log.id).await.unwrap().unwrap();
        assert_eq!(fetched.items[0].id, keep.id);
        assert_eq!(fetched.items[0].name, "Yoghurt");

        // The discarded item is gone from the catalog
        let catalog: Vec<i64> = repo
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert!(!catalog.contains(&discard.id));
    }

    #[tokio::test]
    async fn test_merge_items_log_holding_both() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let keep = repo.insert_item("spring onion").await.unwrap();
        let discard = repo.insert_item("scallion").await.unwrap();

        let log = repo
            .insert(&FoodLog::new(date(19, 0)).with_items(vec![
                FoodItem::new("spring onion"),
                FoodItem::new("scallion"),
            ]))
            .await
            .unwrap();
        assert_eq!(log.items.len(), 2);

        repo.merge_items(keep.id, discard.id).await.unwrap();

        let fetched = repo.get_by_id(log.id).await.unwrap().unwrap();
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_item_removes_references() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let log = repo
            .insert(&FoodLog::new(date(12, 0)).with_items(vec![FoodItem::new("chili")]))
            .await
            .unwrap();
        let item_id = log.items[0].id;
        assert_eq!(repo.count_logs_containing_item(item_id).await.unwrap(), 1);

        repo.delete_item(item_id).await.unwrap();

        assert!(repo.list_items().await.unwrap().is_empty());
        let fetched = repo.get_by_id(log.id).await.unwrap().unwrap();
        assert!(fetched.items.is_empty());
    }

    #[tokio::test]
    async fn test_watch_all_emits_snapshots() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let mut watch = repo.watch_all().await;

        // Initial snapshot is empty
        let snapshot = watch.next().await.unwrap().unwrap();
        assert!(snapshot.is_empty());

        repo.insert(&FoodLog::new(date(10, 0)).with_items(vec![FoodItem::new("pear")]))
            .await
            .unwrap();

        let snapshot = watch.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].items[0].name, "Pear");
    }

    #[tokio::test]
    async fn test_watch_by_id_present_then_absent() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo.insert(&FoodLog::new(date(11, 0))).await.unwrap();

        let mut watch = repo.watch_by_id(created.id).await;
        assert!(watch.next().await.unwrap().unwrap().is_some());

        repo.delete(created.id).await.unwrap();
        assert!(watch.next().await.unwrap().unwrap().is_none());
    }
}
