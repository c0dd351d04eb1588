use std::{fs, path::PathBuf};

use dochub_core::{RunRecord, RunStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Rows a history query returns at most, newest first.
const HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
    #[error("invalid run status: {0}")]
    InvalidStatus(String),
    #[error("invalid log payload: {0}")]
    Logs(#[from] serde_json::Error),
    #[error("timestamp format error: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// History query filters; everything off means the full (capped) history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFilter {
    pub only_errors: bool,
    pub only_with_created: bool,
    pub since_days: Option<u32>,
}

/// Drive root remembered per project after the first successful
/// resolution, so later runs skip the lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRoot {
    pub root_id: String,
    pub root_name: String,
    pub root_web_url: Option<String>,
    pub resolved_at: String,
}

pub struct RunStore {
    pool: SqlitePool,
}

impl RunStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn new_default() -> Result<Self, StoreError> {
        Self::new_at(default_db_path()?).await
    }

    pub async fn new_at(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Claims the per-project run slot with a conditional insert. Returns
    /// false when another run already holds it.
    pub async fn begin_run(
        &self,
        project_id: &str,
        run_id: &str,
        started_at: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO active_runs (project_id, run_id, started_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(project_id) DO NOTHING",
        )
        .bind(project_id)
        .bind(run_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Releases the run slot regardless of outcome.
    pub async fn end_run(&self, project_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM active_runs WHERE project_id = ?1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Appends a terminal record to history. Running records never land
    /// here; history only sees finished runs.
    pub async fn insert_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO runs (
                id,
                project_id,
                status,
                step,
                progress_percent,
                completed_actions,
                total_actions,
                logs,
                error,
                started_at,
                finished_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(record.status.as_str())
        .bind(&record.step)
        .bind(i64::from(record.progress_percent))
        .bind(i64::from(record.completed_actions))
        .bind(record.total_actions.map(i64::from))
        .bind(serde_json::to_string(&record.logs)?)
        .bind(&record.error)
        .bind(&record.started_at)
        .bind(&record.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_runs(
        &self,
        project_id: &str,
        filter: &RunFilter,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let cutoff = match filter.since_days {
            Some(days) => Some(cutoff_rfc3339(days)?),
            None => None,
        };
        let mut sql = String::from(
            "SELECT id, project_id, status, step, progress_percent, completed_actions,
                    total_actions, logs, error, started_at, finished_at
             FROM runs
             WHERE project_id = ?1",
        );
        if filter.only_errors {
            sql.push_str(" AND status = 'error'");
        }
        if cutoff.is_some() {
            sql.push_str(" AND started_at >= ?2");
        }
        sql.push_str(" ORDER BY started_at DESC LIMIT ");
        sql.push_str(&HISTORY_LIMIT.to_string());

        let mut query = sqlx::query(&sql).bind(project_id);
        if let Some(cutoff) = &cutoff {
            query = query.bind(cutoff);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let record = record_from_row(&row)?;
            // created-folder presence is derived from the log lines, the
            // same way the history view counts them
            if filter.only_with_created && record.created_count() == 0 {
                continue;
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Deletes history older than the threshold; returns the removed count.
    pub async fn prune_runs(
        &self,
        project_id: &str,
        older_than_days: u32,
    ) -> Result<u64, StoreError> {
        let cutoff = cutoff_rfc3339(older_than_days)?;
        let result = sqlx::query("DELETE FROM runs WHERE project_id = ?1 AND started_at < ?2")
            .bind(project_id)
            .bind(&cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_project_root(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectRoot>, StoreError> {
        let row = sqlx::query(
            "SELECT root_id, root_name, root_web_url, resolved_at
             FROM project_roots
             WHERE project_id = ?1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ProjectRoot {
            root_id: row.try_get("root_id")?,
            root_name: row.try_get("root_name")?,
            root_web_url: row.try_get("root_web_url")?,
            resolved_at: row.try_get("resolved_at")?,
        }))
    }

    pub async fn set_project_root(
        &self,
        project_id: &str,
        root: &ProjectRoot,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO project_roots (project_id, root_id, root_name, root_web_url, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id) DO UPDATE SET
                root_id = excluded.root_id,
                root_name = excluded.root_name,
                root_web_url = excluded.root_web_url,
                resolved_at = excluded.resolved_at",
        )
        .bind(project_id)
        .bind(&root.root_id)
        .bind(&root.root_name)
        .bind(&root.root_web_url)
        .bind(&root.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<RunRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let logs: String = row.try_get("logs")?;
    let progress: i64 = row.try_get("progress_percent")?;
    let completed: i64 = row.try_get("completed_actions")?;
    let total: Option<i64> = row.try_get("total_actions")?;
    Ok(RunRecord {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        status: RunStatus::parse(&status).ok_or_else(|| StoreError::InvalidStatus(status.clone()))?,
        step: row.try_get("step")?,
        progress_percent: progress.clamp(0, 100) as u8,
        completed_actions: completed.max(0) as u32,
        total_actions: total.map(|value| value.max(0) as u32),
        logs: serde_json::from_str(&logs)?,
        error: row.try_get("error")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn cutoff_rfc3339(days: u32) -> Result<String, StoreError> {
    let cutoff = OffsetDateTime::now_utc() - time::Duration::days(i64::from(days));
    Ok(cutoff.format(&Rfc3339)?)
}

fn default_db_path() -> Result<PathBuf, StoreError> {
    let mut path = dirs::data_dir().ok_or(StoreError::MissingDataDir)?;
    path.push("dochubd");
    path.push("runs.db");
    Ok(path)
}
