//! SQLite-backed job database: connection setup and schema migration.
//!
//! Job CRUD lives in [`super::jobs`]; mirror/failover bookkeeping lives here
//! alongside the schema since it has no other natural home yet.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::{FailoverEventRow, JobId, MirrorRow};

/// Handle to the SQLite-backed job database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/ddm/jobs.db` on Debian.
#[derive(Clone)]
pub struct ResumeDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl ResumeDb {
    /// Open (or create) the default job database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("ddm")?;
        let state_dir = xdg_dirs.get_state_home();
        let db_path = state_dir.join("jobs.db");

        // Ensure parent directory exists.
        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = format!("sqlite://{}", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let db = ResumeDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `completed_bitmap` is a compact bitmap of finished segments, the
        // crash-safe resume record; `settings_json` holds per-job settings
        // (custom headers, download dir override, mirror URLs) as JSON.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                final_filename TEXT,
                temp_filename TEXT,
                total_size INTEGER,
                etag TEXT,
                last_modified TEXT,
                segment_count INTEGER NOT NULL DEFAULT 0,
                completed_bitmap BLOB NOT NULL DEFAULT x'',
                state TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                settings_json TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirrors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                url TEXT NOT NULL,
                priority INTEGER NOT NULL,
                healthy INTEGER NOT NULL DEFAULT 1,
                response_time_ms INTEGER,
                last_error TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS failover_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                seg_index INTEGER NOT NULL,
                old_mirror_url TEXT,
                new_mirror_url TEXT,
                reason TEXT NOT NULL,
                occurred_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the stored mirror set for `job_id` with `mirrors` (health snapshot
    /// from the most recent probe/failover round).
    pub async fn replace_mirrors(&self, job_id: JobId, mirrors: &[crate::mirrors::Mirror]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM mirrors WHERE job_id = ?1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        for m in mirrors {
            sqlx::query(
                r#"
                INSERT INTO mirrors (job_id, url, priority, healthy, response_time_ms, last_error)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(job_id)
            .bind(&m.url)
            .bind(m.priority as i64)
            .bind(m.healthy as i64)
            .bind(m.response_time_ms.map(|n| n as i64))
            .bind(&m.last_error)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Mirror rows for `job_id`, ordered by priority (most preferred first).
    pub async fn list_mirrors(&self, job_id: JobId) -> Result<Vec<MirrorRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, url, priority, healthy, response_time_ms, last_error
            FROM mirrors
            WHERE job_id = ?1
            ORDER BY priority ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| MirrorRow {
                id: row.get("id"),
                job_id: row.get("job_id"),
                url: row.get("url"),
                priority: row.get("priority"),
                healthy: row.get::<i64, _>("healthy") != 0,
                response_time_ms: row.get("response_time_ms"),
                last_error: row.get("last_error"),
            })
            .collect())
    }

    /// Appends a failover event for `job_id`.
    pub async fn append_failover_event(
        &self,
        job_id: JobId,
        event: &crate::mirrors::FailoverEvent,
    ) -> Result<()> {
        let occurred_at = event
            .occurred_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        sqlx::query(
            r#"
            INSERT INTO failover_events (job_id, seg_index, old_mirror_url, new_mirror_url, reason, occurred_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(job_id)
        .bind(event.segment_index as i64)
        .bind(&event.old_mirror_url)
        .bind(&event.new_mirror_url)
        .bind(&event.reason)
        .bind(occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Failover history for `job_id`, oldest first.
    pub async fn list_failover_events(&self, job_id: JobId) -> Result<Vec<FailoverEventRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, seg_index, old_mirror_url, new_mirror_url, reason, occurred_at
            FROM failover_events
            WHERE job_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| FailoverEventRow {
                id: row.get("id"),
                job_id: row.get("job_id"),
                segment_index: row.get("seg_index"),
                old_mirror_url: row.get("old_mirror_url"),
                new_mirror_url: row.get("new_mirror_url"),
                reason: row.get("reason"),
                occurred_at: row.get("occurred_at"),
            })
            .collect())
    }

    /// Final filenames already claimed by other jobs, used to avoid collisions when
    /// naming a new download. `_dir` is accepted for future per-directory scoping but
    /// not yet used to filter (every job's settings would need to be parsed to know
    /// its effective directory); `exclude_job_id` omits the job being (re)named so a
    /// restart doesn't see its own prior name as a collision.
    pub async fn list_final_filenames_in_dir(
        &self,
        _dir: Option<&str>,
        exclude_job_id: Option<JobId>,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT id, final_filename FROM jobs
            WHERE final_filename IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter(|row| match exclude_job_id {
                Some(ex) => row.get::<i64, _>("id") != ex,
                None => true,
            })
            .filter_map(|row| row.get::<Option<String>, _>("final_filename"))
            .collect())
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
pub(crate) async fn open_memory() -> Result<ResumeDb> {
    // Single connection to avoid in-memory pool handing back a different empty DB.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = ResumeDb { pool };
    db.migrate().await?;
    Ok(db)
}
