use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{parse_date, ChangeHub, LogStore, Table, Watch};
use crate::models::{normalize_item_name, LoggedSymptom, Severity, Symptom, SymptomLog};

#[derive(Clone)]
pub struct SymptomLogRepository {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    date: String,
}

#[derive(sqlx::FromRow)]
struct SymptomRow {
    id: i64,
    name: String,
}

// Join rows carry the per-association severity
#[derive(sqlx::FromRow)]
struct LoggedSymptomRow {
    id: i64,
    name: String,
    severity: String,
}

impl SymptomLogRepository {
    pub fn new(pool: SqlitePool, hub: Arc<ChangeHub>) -> Self {
        Self { pool, hub }
    }

    pub async fn insert_symptom(&self, name: &str) -> Result<Symptom, sqlx::Error> {
        let name = normalize_item_name(name);
        let result = sqlx::query("INSERT INTO symptoms (name) VALUES (?)")
            .bind(&name)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::Symptoms).await;

        Ok(Symptom {
            id: result.last_insert_rowid(),
            name,
        })
    }

    /// Case-insensitive lookup, insert if absent. Same accepted race as the
    /// food catalog.
    pub async fn insert_or_get_symptom(&self, name: &str) -> Result<Symptom, sqlx::Error> {
        let name = normalize_item_name(name);
        let existing: Option<SymptomRow> =
            sqlx::query_as("SELECT id, name FROM symptoms WHERE LOWER(name) = LOWER(?)")
                .bind(&name)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(row) => Ok(Symptom {
                id: row.id,
                name: row.name,
            }),
            None => self.insert_symptom(&name).await,
        }
    }

    pub async fn list_symptoms(&self) -> Result<Vec<Symptom>, sqlx::Error> {
        let rows: Vec<SymptomRow> =
            sqlx::query_as("SELECT id, name FROM symptoms ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| Symptom {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    pub async fn rename_symptom(&self, id: i64, name: &str) -> Result<(), sqlx::Error> {
        let name = normalize_item_name(name);
        sqlx::query("UPDATE symptoms SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::Symptoms).await;
        self.hub.notify(Table::SymptomLogs).await;
        Ok(())
    }

    pub async fn delete_symptom(&self, id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM symptom_log_symptoms WHERE symptom_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM symptoms WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.hub.notify(Table::Symptoms).await;
        self.hub.notify(Table::SymptomLogs).await;
        Ok(())
    }

    /// Re-points cross-references from `discard_id` to `keep_id`, then
    /// deletes the discarded symptom. When a log holds both, the kept row's
    /// severity wins.
    pub async fn merge_symptoms(&self, keep_id: i64, discard_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE OR IGNORE symptom_log_symptoms SET symptom_id = ? WHERE symptom_id = ?")
            .bind(keep_id)
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM symptom_log_symptoms WHERE symptom_id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM symptoms WHERE id = ?")
            .bind(discard_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("merged symptom {} into {}", discard_id, keep_id);
        self.hub.notify(Table::Symptoms).await;
        self.hub.notify(Table::SymptomLogs).await;
        Ok(())
    }

    pub async fn count_logs_containing_symptom(&self, symptom_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM symptom_log_symptoms WHERE symptom_id = ?")
                .bind(symptom_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn insert(&self, log: &SymptomLog) -> Result<SymptomLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let date = log.date.to_rfc3339();
        let result = sqlx::query("INSERT INTO symptom_logs (date) VALUES (?)")
            .bind(&date)
            .execute(&mut *tx)
            .await?;
        let log_id = result.last_insert_rowid();

        for logged in &log.symptoms {
            let symptom_id = resolve_symptom(&mut tx, &logged.symptom.name).await?;
            sqlx::query(
                "INSERT OR IGNORE INTO symptom_log_symptoms (log_id, symptom_id, severity) \
                 VALUES (?, ?, ?)",
            )
            .bind(log_id)
            .bind(symptom_id)
            .bind(logged.severity.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::Symptoms).await;
        self.hub.notify(Table::SymptomLogs).await;

        self.get_by_id(log_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SymptomLog>, sqlx::Error> {
        let row: Option<LogRow> = sqlx::query_as("SELECT id, date FROM symptom_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_log(row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<SymptomLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as("SELECT id, date FROM symptom_logs ORDER BY date")
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
    ) -> Result<Vec<SymptomLog>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, date FROM symptom_logs WHERE date >= ? AND date <= ? ORDER BY date",
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

    pub async fn update(&self, log: &SymptomLog) -> Result<SymptomLog, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE symptom_logs SET date = ? WHERE id = ?")
            .bind(log.date.to_rfc3339())
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM symptom_log_symptoms WHERE log_id = ?")
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        for logged in &log.symptoms {
            let symptom_id = resolve_symptom(&mut tx, &logged.symptom.name).await?;
            sqlx::query(
                "INSERT OR IGNORE INTO symptom_log_symptoms (log_id, symptom_id, severity) \
                 VALUES (?, ?, ?)",
            )
            .bind(log.id)
            .bind(symptom_id)
            .bind(logged.severity.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.hub.notify(Table::Symptoms).await;
        self.hub.notify(Table::SymptomLogs).await;

        self.get_by_id(log.id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        // CASCADE handles the cross-reference rows
        sqlx::query("DELETE FROM symptom_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.hub.notify(Table::SymptomLogs).await;
        Ok(())
    }

    pub async fn watch_symptoms(&self) -> Watch<Vec<Symptom>> {
        let rx = self.hub.subscribe(Table::Symptoms).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_symptoms().await })
            }),
        )
    }

    pub async fn watch_all(&self) -> Watch<Vec<SymptomLog>> {
        let rx = self.hub.subscribe(Table::SymptomLogs).await;
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
    ) -> Watch<Vec<SymptomLog>> {
        let rx = self.hub.subscribe(Table::SymptomLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.list_between(from, to).await })
            }),
        )
    }

    pub async fn watch_by_id(&self, id: i64) -> Watch<Option<SymptomLog>> {
        let rx = self.hub.subscribe(Table::SymptomLogs).await;
        let repo = self.clone();
        Watch::new(
            rx,
            Box::new(move || {
                let repo = repo.clone();
                Box::pin(async move { repo.get_by_id(id).await })
            }),
        )
    }

    async fn hydrate_log(&self, row: LogRow) -> Result<SymptomLog, sqlx::Error> {
        let logged: Vec<LoggedSymptomRow> = sqlx::query_as(
            "SELECT symptoms.id, symptoms.name, symptom_log_symptoms.severity FROM symptoms \
             JOIN symptom_log_symptoms ON symptom_log_symptoms.symptom_id = symptoms.id \
             WHERE symptom_log_symptoms.log_id = ? ORDER BY symptom_log_symptoms.rowid",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SymptomLog {
            id: row.id,
            date: parse_date(&row.date),
            symptoms: logged
                .into_iter()
                .map(|r| LoggedSymptom {
                    symptom: Symptom {
                        id: r.id,
                        name: r.name,
                    },
                    severity: r.severity.parse().unwrap_or(Severity::Mild),
                })
                .collect(),
        })
    }
}

async fn resolve_symptom(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    let name = normalize_item_name(name);
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM symptoms WHERE LOWER(name) = LOWER(?)")
            .bind(&name)
            .fetch_optional(&mut **tx)
            .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO symptoms (name) VALUES (?)")
        .bind(&name)
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}

impl LogStore for SymptomLogRepository {
    type Log = SymptomLog;

    async fn insert(&self, log: &SymptomLog) -> Result<SymptomLog, sqlx::Error> {
        SymptomLogRepository::insert(self, log).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SymptomLog>, sqlx::Error> {
        SymptomLogRepository::get_by_id(self, id).await
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SymptomLog>, sqlx::Error> {
        SymptomLogRepository::list_between(self, from, to).await
    }

    async fn delete(&self, id: i64) -> Result<(), sqlx::Error> {
        SymptomLogRepository::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct TestContext {
        repo: SymptomLogRepository,
        _temp_dir: TempDir,
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(Some(db_path)).await.unwrap();
        TestContext {
            repo: SymptomLogRepository::new(pool, Arc::new(ChangeHub::new())),
            _temp_dir: temp_dir,
        }
    }

    fn date(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, h, 0, 0).unwrap()
    }

    fn logged(name: &str, severity: Severity) -> LoggedSymptom {
        LoggedSymptom {
            symptom: Symptom::new(name),
            severity,
        }
    }

    #[tokio::test]
    async fn test_insert_log_carries_severity() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let log = SymptomLog::new(date(21)).with_symptoms(vec![
            logged("bloating", Severity::Severe),
            logged("cramps", Severity::Mild),
        ]);

        let created = repo.insert(&log).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(fetched.symptoms.len(), 2);
        assert_eq!(fetched.symptoms[0].symptom.name, "Bloating");
        assert_eq!(fetched.symptoms[0].severity, Severity::Severe);
        assert_eq!(fetched.symptoms[1].severity, Severity::Mild);
    }

    #[tokio::test]
    async fn test_insert_or_get_symptom_idempotent() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let first = repo.insert_or_get_symptom("nausea").await.unwrap();
        let second = repo.insert_or_get_symptom("Nausea").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_update_replaces_severity() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .insert(&SymptomLog::new(date(7)).with_symptoms(vec![logged(
                "headache",
                Severity::Mild,
            )]))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.symptoms = vec![logged("headache", Severity::Severe)];

        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.symptoms.len(), 1);
        assert_eq!(updated.symptoms[0].severity, Severity::Severe);

        // No duplicate catalog entry was created by the rewrite
        assert_eq!(repo.list_symptoms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_symptoms_repoints_references() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let keep = repo.insert_symptom("stomach ache").await.unwrap();
        let discard = repo.insert_symptom("tummy ache").await.unwrap();

        let log = repo
            .insert(&SymptomLog::new(date(23)).with_symptoms(vec![logged(
                "tummy ache",
                Severity::Moderate,
            )]))
            .await
            .unwrap();
        assert_eq!(log.symptoms[0].symptom.id, discard.id);

        repo.merge_symptoms(keep.id, discard.id).await.unwrap();

        let fetched = repo.get_by_id(log.id).await.unwrap().unwrap();
        assert_eq!(fetched.symptoms[0].symptom.id, keep.id);
        assert_eq!(fetched.symptoms[0].severity, Severity::Moderate);
        assert_eq!(
            repo.count_logs_containing_symptom(discard.id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_watch_symptoms_sees_new_entries() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let mut watch = repo.watch_symptoms().await;
        assert!(watch.next().await.unwrap().unwrap().is_empty());

        repo.insert_symptom("fatigue").await.unwrap();

        let snapshot = watch.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Fatigue");
    }
}
