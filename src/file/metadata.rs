//! File metadata types and repository for the document portal.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::datetime::parse_db_datetime;
use crate::{PortalError, Result};

/// Metadata for a file stored in a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileRecord {
    /// Unique file ID.
    pub id: i64,
    /// Folder this file belongs to.
    pub folder_id: i64,
    /// Original filename (display name, not sanitized).
    pub filename: String,
    /// Path of the copy inside the managed storage area.
    pub storage_path: String,
    /// When the file was uploaded (UTC, SQLite format).
    pub uploaded_at: String,
}

impl FileRecord {
    /// Lower-cased extension of the original filename, empty when it has none.
    pub fn extension(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }

    /// Size of the stored copy in bytes, 0 when it is missing.
    pub fn size(&self) -> u64 {
        std::fs::metadata(Path::new(&self.storage_path))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Human readable size, e.g. `"1.50 KB"`.
    pub fn size_formatted(&self) -> String {
        format_size(self.size())
    }

    /// Get the uploaded_at as DateTime<Utc>.
    pub fn uploaded_at_datetime(&self) -> Option<DateTime<Utc>> {
        parse_db_datetime(&self.uploaded_at)
    }
}

/// Format a byte count with two decimals and a binary unit.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a file row on an existing connection or transaction.
    pub async fn insert(
        conn: &mut SqliteConnection,
        folder_id: i64,
        filename: &str,
        storage_path: &str,
    ) -> Result<i64> {
        let result =
            sqlx::query("INSERT INTO files (folder_id, filename, storage_path) VALUES (?, ?, ?)")
                .bind(folder_id)
                .bind(filename)
                .bind(storage_path)
                .execute(conn)
                .await
                .map_err(|e| PortalError::Store(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Create a new file entry.
    pub async fn create(
        &self,
        folder_id: i64,
        filename: &str,
        storage_path: &str,
    ) -> Result<FileRecord> {
        let mut conn = self.pool.acquire().await?;
        let id = Self::insert(&mut conn, folder_id, filename, storage_path).await?;
        drop(conn);

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("file".to_string()))
    }

    /// Get a file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(
            "SELECT id, folder_id, filename, storage_path, uploaded_at FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(file)
    }

    /// List files in a folder, newest upload first.
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, folder_id, filename, storage_path, uploaded_at
             FROM files WHERE folder_id = ? ORDER BY uploaded_at DESC, id DESC",
        )
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;

        Ok(files)
    }

    /// Delete a file row by ID.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count files directly inside a folder.
    pub async fn count_by_folder(&self, folder_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Count files in a folder and all of its descendants.
    pub async fn count_in_subtree(&self, folder_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM folders WHERE id = ?
                UNION
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
             )
             SELECT COUNT(*) FROM files WHERE folder_id IN (SELECT id FROM subtree)",
        )
        .bind(folder_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
