//! SQLite-backed [`ImageStore`].
//!
//! Rows live in the `employee_ai_ads_images` table, which is created on
//! open if missing. Connections come from an r2d2 pool and every query runs
//! on the blocking thread pool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use tracing::debug;

use crate::error::{AdcrewError, ExecutionFailure};
use crate::store::{AdCopy, ImageRecord, ImageStore};

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS employee_ai_ads_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        userid TEXT NOT NULL,
        image_url TEXT NOT NULL,
        is_evaluated INTEGER NOT NULL DEFAULT 0,
        is_approved INTEGER NOT NULL DEFAULT 0,
        review TEXT,
        ad_copy TEXT,
        ad_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_employee_ai_ads_images_userid
        ON employee_ai_ads_images(userid, id);
";

const COLUMNS: &str = "id, userid, image_url, is_evaluated, is_approved, review, ad_copy, \
                       ad_id, created_at, updated_at";

/// Whether `path` names a SQLite database rather than a JSON snapshot.
pub fn is_database_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ["db", "sqlite", "sqlite3"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub struct SqliteImageStore {
    pool: DbPool,
}

impl SqliteImageStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, AdcrewError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| AdcrewError::Database(format!("failed to create connection pool: {e}")))?;
        Self::with_pool(pool)
    }

    /// Wraps an existing pool, creating the table if it does not exist.
    pub fn with_pool(pool: DbPool) -> Result<Self, AdcrewError> {
        let conn = pool
            .get()
            .map_err(|e| AdcrewError::Database(format!("failed to get connection: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AdcrewError::Database(format!("failed to create images table: {e}")))?;
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, ExecutionFailure>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| ExecutionFailure::Store(format!("failed to get connection: {e}")))?;
            f(&conn).map_err(|e| ExecutionFailure::Store(e.to_string()))
        })
        .await
        .map_err(|e| ExecutionFailure::Store(format!("task join error: {e}")))?
    }

    /// Rows of `user_id` matching `condition`, oldest first.
    async fn select(
        &self,
        user_id: &str,
        condition: &'static str,
    ) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM employee_ai_ads_images
                 WHERE userid = ?1 AND {condition} ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], read_row)?;
            rows.collect()
        })
        .await
    }

    /// Every row of `user_id`, oldest first.
    pub async fn records(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        self.select(user_id, "1 = 1").await
    }

    async fn update(
        &self,
        id: u64,
        assignments: &'static str,
        values: Vec<rusqlite::types::Value>,
    ) -> Result<(), ExecutionFailure> {
        let changed = self
            .with_conn(move |conn| {
                let sql = format!(
                    "UPDATE employee_ai_ads_images SET {assignments}, updated_at = ?{n}
                     WHERE id = ?{m}",
                    n = values.len() + 1,
                    m = values.len() + 2,
                );
                let mut bound = values;
                bound.push(Utc::now().to_rfc3339().into());
                bound.push((id as i64).into());
                conn.execute(&sql, rusqlite::params_from_iter(bound))
            })
            .await?;
        if changed == 0 {
            return Err(ExecutionFailure::Store(format!("image {id} not found")));
        }
        Ok(())
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    let copy = row
        .get::<_, Option<String>>(6)?
        .map(|json| serde_json::from_str::<AdCopy>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(ImageRecord {
        id: row.get::<_, i64>(0)? as u64,
        user_id: row.get(1)?,
        image_url: row.get(2)?,
        evaluated: row.get(3)?,
        approved: row.get(4)?,
        review: row.get(5)?,
        copy,
        ad_id: row.get(7)?,
        created_at: timestamp(row, 8)?,
        updated_at: timestamp(row, 9)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[async_trait]
impl ImageStore for SqliteImageStore {
    async fn insert_image(
        &self,
        user_id: &str,
        image_url: &str,
    ) -> Result<ImageRecord, ExecutionFailure> {
        let now = Utc::now();
        let (user, url) = (user_id.to_string(), image_url.to_string());
        let id = self
            .with_conn(move |conn| {
                let stamp = now.to_rfc3339();
                conn.execute(
                    "INSERT INTO employee_ai_ads_images
                         (userid, image_url, is_evaluated, created_at, updated_at)
                     VALUES (?1, ?2, 0, ?3, ?3)",
                    params![user, url, stamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!(id, user_id, "Image row inserted");
        Ok(ImageRecord {
            id: id as u64,
            user_id: user_id.to_string(),
            image_url: image_url.to_string(),
            evaluated: false,
            approved: false,
            review: None,
            copy: None,
            ad_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn unevaluated(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        self.select(user_id, "is_evaluated = 0").await
    }

    async fn mark_evaluated(
        &self,
        id: u64,
        approved: bool,
        review: &str,
    ) -> Result<(), ExecutionFailure> {
        self.update(
            id,
            "is_evaluated = 1, is_approved = ?1, review = ?2",
            vec![i64::from(approved).into(), review.to_string().into()],
        )
        .await
    }

    async fn awaiting_copy(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        self.select(user_id, "is_approved = 1 AND ad_copy IS NULL")
            .await
    }

    async fn attach_copy(&self, id: u64, copy: AdCopy) -> Result<(), ExecutionFailure> {
        let json = serde_json::to_string(&copy)
            .map_err(|e| ExecutionFailure::Store(format!("failed to encode copy: {e}")))?;
        self.update(id, "ad_copy = ?1", vec![json.into()]).await
    }

    async fn ready_to_launch(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        self.select(
            user_id,
            "is_approved = 1 AND ad_copy IS NOT NULL AND ad_id IS NULL",
        )
        .await
    }

    async fn mark_launched(&self, id: u64, ad_id: &str) -> Result<(), ExecutionFailure> {
        self.update(id, "ad_id = ?1", vec![ad_id.to_string().into()])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn copy() -> AdCopy {
        AdCopy {
            primary_text: "Stay dry all day".into(),
            headline: "Rain-proof".into(),
            description: "Lightweight shell".into(),
            call_to_action: None,
        }
    }

    fn open_temp() -> (tempfile::TempDir, SqliteImageStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteImageStore::open(&dir.path().join("db").join("images.sqlite")).unwrap();
        (dir, store)
    }

    #[test]
    fn database_paths_are_told_apart_from_snapshots() {
        assert!(is_database_path(Path::new("state/images.sqlite")));
        assert!(is_database_path(Path::new("images.DB")));
        assert!(!is_database_path(Path::new("store.json")));
        assert!(!is_database_path(Path::new("store")));
    }

    #[tokio::test]
    async fn rows_move_through_the_pipeline() {
        let (_dir, store) = open_temp();
        let a = store.insert_image("u1", "https://cdn/a.png").await.unwrap();
        let b = store.insert_image("u1", "https://cdn/b.png").await.unwrap();
        store.insert_image("u2", "https://cdn/c.png").await.unwrap();
        assert_eq!(b.id, a.id + 1);

        assert_eq!(store.unevaluated("u1").await.unwrap().len(), 2);
        store.mark_evaluated(a.id, true, "looks good").await.unwrap();
        store.mark_evaluated(b.id, false, "blurry").await.unwrap();
        assert!(store.unevaluated("u1").await.unwrap().is_empty());

        let awaiting = store.awaiting_copy("u1").await.unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].review.as_deref(), Some("looks good"));

        store.attach_copy(a.id, copy()).await.unwrap();
        assert!(store.awaiting_copy("u1").await.unwrap().is_empty());
        let ready = store.ready_to_launch("u1").await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].copy, Some(copy()));

        store.mark_launched(a.id, "ad_42").await.unwrap();
        assert!(store.ready_to_launch("u1").await.unwrap().is_empty());
        assert_eq!(store.unevaluated("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rows_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.sqlite");
        {
            let store = SqliteImageStore::open(&path).unwrap();
            let row = store.insert_image("u1", "https://cdn/a.png").await.unwrap();
            store.mark_evaluated(row.id, true, "ok").await.unwrap();
        }

        let store = SqliteImageStore::open(&path).unwrap();
        let rows = store.records("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].evaluated && rows[0].approved);
        assert!(rows[0].updated_at >= rows[0].created_at);
        let next = store.insert_image("u1", "https://cdn/b.png").await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn updating_unknown_row_fails() {
        let (_dir, store) = open_temp();
        let err = store.mark_launched(99, "ad").await.unwrap_err();
        assert_eq!(err.to_string(), "image store error: image 99 not found");
    }

    #[tokio::test]
    async fn concurrent_users_share_one_database() {
        let (_dir, store) = open_temp();
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for user in ["u1", "u2", "u3"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..4 {
                    store
                        .insert_image(user, &format!("https://cdn/{user}-{i}.png"))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        for user in ["u1", "u2", "u3"] {
            assert_eq!(store.records(user).await.unwrap().len(), 4);
        }
    }
}
