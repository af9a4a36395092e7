use crate::db::models::{FolderLock, LockChange};
use crate::db::schema::SQLITE_INIT;
use crate::error::DriveError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct FolderLockStorage {
    pool: SqlitePool,
}

impl FolderLockStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, DriveError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_opts = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database; pin one.
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(connect_opts).await?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url, "folder lock storage ready");
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), DriveError> {
        // sqlx::query runs a single statement
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn get(&self, folder_id: &str) -> Result<Option<FolderLock>, DriveError> {
        let row = sqlx::query(
            r#"SELECT folder_id, password_hash, created_at, updated_at
               FROM folder_locks WHERE folder_id = ?"#,
        )
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn is_locked(&self, folder_id: &str) -> Result<bool, DriveError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM folder_locks WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    /// Insert or replace the hash for `folder_id`; `created_at` survives updates.
    pub async fn upsert(
        &self,
        folder_id: &str,
        password_hash: &str,
    ) -> Result<LockChange, DriveError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let existing: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM folder_locks WHERE folder_id = ?")
                .bind(folder_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO folder_locks (folder_id, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(folder_id) DO UPDATE SET
                password_hash=excluded.password_hash,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(folder_id)
        .bind(password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if existing.0 > 0 {
            LockChange::Updated
        } else {
            LockChange::Created
        })
    }

    /// Swap the hash only while the row still holds `expected_hash`.
    /// Returns false when the row was changed or removed in the meantime.
    pub async fn replace_hash(
        &self,
        folder_id: &str,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, DriveError> {
        let res = sqlx::query(
            r#"
            UPDATE folder_locks SET password_hash = ?, updated_at = ?
            WHERE folder_id = ? AND password_hash = ?
            "#,
        )
        .bind(new_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(folder_id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Returns whether a lock row existed.
    pub async fn delete(&self, folder_id: &str) -> Result<bool, DriveError> {
        let res = sqlx::query("DELETE FROM folder_locks WHERE folder_id = ?")
            .bind(folder_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    fn row_to_model(row: SqliteRow) -> Result<FolderLock, DriveError> {
        let folder_id: String = row.try_get("folder_id")?;
        let password_hash: String = row.try_get("password_hash")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;

        Ok(FolderLock {
            folder_id,
            password_hash,
            created_at: parse_timestamp(&created_str)?,
            updated_at: parse_timestamp(&updated_str)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DriveError> {
    let ts = DateTime::parse_from_rfc3339(s)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);
    Ok(ts)
}
