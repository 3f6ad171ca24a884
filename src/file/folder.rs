//! Folder types and repository for the document portal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::datetime::parse_db_datetime;
use crate::{PortalError, Result};

/// A node of the folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Display name (not unique).
    pub name: String,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    /// When the folder was created (UTC, SQLite format).
    pub created_at: String,
}

impl Folder {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> Option<DateTime<Utc>> {
        parse_db_datetime(&self.created_at)
    }

    /// Whether this is a root-level folder.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a folder row on an existing connection or transaction.
    ///
    /// Fails with a store error when `parent_id` does not reference an
    /// existing folder.
    pub async fn insert(
        conn: &mut SqliteConnection,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<i64> {
        let result = sqlx::query("INSERT INTO folders (name, parent_id) VALUES (?, ?)")
            .bind(name)
            .bind(parent_id)
            .execute(conn)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Create a new folder.
    pub async fn create(&self, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        let mut conn = self.pool.acquire().await?;
        let id = Self::insert(&mut conn, name, parent_id).await?;
        drop(conn);

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(folder)
    }

    /// List the direct children of `parent_id`, or the root folders for `None`.
    ///
    /// Ordered by name, then by ID for equal names.
    pub async fn list_children(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        let folders = match parent_id {
            Some(parent_id) => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, created_at
                     FROM folders WHERE parent_id = ? ORDER BY name ASC, id ASC",
                )
                .bind(parent_id)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Folder>(
                    "SELECT id, name, parent_id, created_at
                     FROM folders WHERE parent_id IS NULL ORDER BY name ASC, id ASC",
                )
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(folders)
    }

    /// List every folder, ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at FROM folders ORDER BY name ASC, id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(folders)
    }

    /// Rename a folder. Returns false if no folder has this ID.
    pub async fn rename(&self, id: i64, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Storage paths of every file in the subtree rooted at `id`.
    ///
    /// Uses `UNION` rather than `UNION ALL` so malformed cyclic parent links
    /// still terminate.
    pub async fn subtree_storage_paths(conn: &mut SqliteConnection, id: i64) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM folders WHERE id = ?
                UNION
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
             )
             SELECT storage_path FROM files WHERE folder_id IN (SELECT id FROM subtree)",
        )
        .bind(id)
        .fetch_all(conn)
        .await?;

        Ok(paths)
    }

    /// Delete a folder row; descendants and their files go with it through
    /// the `ON DELETE CASCADE` foreign keys.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the path from root to a folder (breadcrumb).
    ///
    /// Returns an empty vector when `id` does not resolve. A dangling parent
    /// reference ends the chain at the last folder found.
    pub async fn get_path(&self, id: i64) -> Result<Vec<Folder>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current_id = Some(id);

        while let Some(folder_id) = current_id {
            if !visited.insert(folder_id) {
                break;
            }
            match self.get_by_id(folder_id).await? {
                Some(folder) => {
                    current_id = folder.parent_id;
                    path.push(folder);
                }
                None => break,
            }
        }

        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create("Contrats", None).await.unwrap();

        assert_eq!(folder.name, "Contrats");
        assert!(folder.is_root());
        assert!(folder.created_at_datetime().is_some());
    }

    #[tokio::test]
    async fn test_create_folder_unknown_parent() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let result = repo.create("Orphan", Some(9999)).await;
        assert!(matches!(result, Err(PortalError::Store(_))));
    }

    #[tokio::test]
    async fn test_get_folder_not_found() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_root_folders_by_name() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        repo.create("Zeta", None).await.unwrap();
        repo.create("Alpha", None).await.unwrap();
        let parent = repo.create("Middle", None).await.unwrap();
        repo.create("Child", Some(parent.id)).await.unwrap();

        let roots = repo.list_children(None).await.unwrap();
        let names: Vec<_> = roots.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Middle", "Zeta"]);
    }

    #[tokio::test]
    async fn test_list_child_folders() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let parent = repo.create("Parent", None).await.unwrap();
        repo.create("b", Some(parent.id)).await.unwrap();
        repo.create("a", Some(parent.id)).await.unwrap();

        let children = repo.list_children(Some(parent.id)).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a");
        assert_eq!(children[1].name, "b");
        assert!(children.iter().all(|c| c.parent_id == Some(parent.id)));
    }

    #[tokio::test]
    async fn test_rename_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create("Original", None).await.unwrap();

        assert!(repo.rename(folder.id, "Updated").await.unwrap());
        assert_eq!(repo.get_by_id(folder.id).await.unwrap().unwrap().name, "Updated");
        assert!(!repo.rename(9999, "Nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create("Root", None).await.unwrap();
        let child = repo.create("Child", Some(root.id)).await.unwrap();
        let grandchild = repo.create("Grandchild", Some(child.id)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(FolderRepository::delete(&mut conn, root.id).await.unwrap());
        assert!(!FolderRepository::delete(&mut conn, root.id).await.unwrap());
        drop(conn);

        assert!(repo.get_by_id(child.id).await.unwrap().is_none());
        assert!(repo.get_by_id(grandchild.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subtree_storage_paths() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create("Root", None).await.unwrap();
        let child = repo.create("Child", Some(root.id)).await.unwrap();
        let other = repo.create("Other", None).await.unwrap();

        for (folder_id, path) in [(root.id, "u/1_a"), (child.id, "u/2_b"), (other.id, "u/3_c")] {
            sqlx::query("INSERT INTO files (folder_id, filename, storage_path) VALUES (?, ?, ?)")
                .bind(folder_id)
                .bind("x")
                .bind(path)
                .execute(db.pool())
                .await
                .unwrap();
        }

        let mut conn = db.pool().acquire().await.unwrap();
        let mut paths = FolderRepository::subtree_storage_paths(&mut conn, root.id)
            .await
            .unwrap();
        paths.sort();
        assert_eq!(paths, vec!["u/1_a".to_string(), "u/2_b".to_string()]);
    }

    #[tokio::test]
    async fn test_get_path() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create("Root", None).await.unwrap();
        let level1 = repo.create("Level1", Some(root.id)).await.unwrap();
        let level2 = repo.create("Level2", Some(level1.id)).await.unwrap();

        let path = repo.get_path(level2.id).await.unwrap();
        let names: Vec<_> = path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Level1", "Level2"]);
        assert!(path[0].is_root());
    }

    #[tokio::test]
    async fn test_get_path_unknown_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        assert!(repo.get_path(42).await.unwrap().is_empty());
    }
}
