//! Optional relational mirror of file metadata.
//!
//! The mirror is an auxiliary index keyed by a server-assigned integer id. The
//! on-disk info records stay authoritative: nothing in the key-based protocol
//! reads from here, and a failing mirror never fails a storage operation.

use crate::models::file_info::FileInfo;
use sqlx::{FromRow, SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use tracing::debug;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(FromRow)]
struct MirrorRow {
    id: i64,
    name: String,
    extension: String,
    box_key: String,
    original_name: String,
    upload_datetime: f64,
    uploaded_user_id: i64,
}

impl From<MirrorRow> for FileInfo {
    fn from(row: MirrorRow) -> Self {
        FileInfo {
            id: Some(row.id),
            name: row.name,
            extension: row.extension,
            box_key: row.box_key,
            original_name: row.original_name,
            upload_datetime: row.upload_datetime,
            uploaded_user_id: row.uploaded_user_id,
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct MetadataMirror {
    pub db: Arc<SqlitePool>,
}

impl MetadataMirror {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open a pool for `database_url`. In-memory databases get a single
    /// connection so every query sees the same schema.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Apply the embedded schema. Safe to run repeatedly.
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert a row for `info` and return its id.
    pub async fn save(&self, info: &FileInfo) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO storage_file
                (name, extension, box_key, original_name, upload_datetime, uploaded_user_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&info.name)
        .bind(&info.extension)
        .bind(&info.box_key)
        .bind(&info.original_name)
        .bind(info.upload_datetime)
        .bind(info.uploaded_user_id)
        .execute(&*self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<FileInfo>, sqlx::Error> {
        let row = sqlx::query_as::<_, MirrorRow>(
            "SELECT id, name, extension, box_key, original_name, upload_datetime, uploaded_user_id
             FROM storage_file WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(row.map(FileInfo::from))
    }

    pub async fn file_name(&self, id: i64) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT name FROM storage_file WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    /// Change the original filename. Returns whether a row was updated.
    pub async fn rename(&self, id: i64, original_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE storage_file SET original_name = ? WHERE id = ?")
            .bind(original_name)
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM storage_file WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cheap connectivity probe used by readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map(|_| ())
    }
}
