//! Persistent store for administrators, folders and file metadata.
//!
//! [`Store`] is the single entry point the rest of the crate uses for
//! persistence. It is cheap to clone; clones share the same pool.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::auth::{hash_password, validate_password, verify_password, PasswordError};
use crate::config::Config;
use crate::db::{Admin, AdminRepository, Database};
use crate::file::{remove_stored_file, FileRecord, FileRepository, Folder, FolderRepository};
use crate::{PortalError, Result};

/// Handle to the portal database.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Wrap an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the configured database and seed the default administrator.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Self::new(Database::open(&config.database.path).await?);
        store
            .ensure_default_admin(&config.admin.default_login, &config.admin.default_password)
            .await?;
        Ok(store)
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ---- administrators ----

    /// Check a login and secret against the stored hash.
    ///
    /// Unknown logins and wrong secrets both yield `false`.
    pub async fn authenticate(&self, login: &str, secret: &str) -> Result<bool> {
        let Some(admin) = AdminRepository::new(self.db.pool()).get_by_login(login).await? else {
            debug!(login, "Unknown administrator");
            return Ok(false);
        };

        match verify_password(secret, &admin.password) {
            Ok(()) => {
                info!(login, "Administrator authenticated");
                Ok(true)
            }
            Err(PasswordError::InvalidHash) => {
                warn!(login, "Stored password hash is corrupt");
                Ok(false)
            }
            Err(_) => {
                debug!(login, "Wrong password");
                Ok(false)
            }
        }
    }

    /// Create an administrator after applying the password policy.
    pub async fn create_admin(&self, login: &str, secret: &str) -> Result<Admin> {
        let login = login.trim();
        if login.is_empty() {
            return Err(PortalError::Validation("login must not be empty".to_string()));
        }
        validate_password(secret).map_err(|e| PortalError::Validation(e.to_string()))?;

        let repo = AdminRepository::new(self.db.pool());
        if repo.get_by_login(login).await?.is_some() {
            return Err(PortalError::Validation(format!(
                "administrator {login} already exists"
            )));
        }

        let hash = hash_password(secret).map_err(|e| PortalError::Auth(e.to_string()))?;
        let admin = repo.create(login, &hash).await?;
        info!(admin_id = admin.id, login, "Created administrator");
        Ok(admin)
    }

    /// Seed an administrator when none exists. Returns whether one was
    /// created.
    pub async fn ensure_default_admin(&self, login: &str, secret: &str) -> Result<bool> {
        let repo = AdminRepository::new(self.db.pool());
        if repo.count().await? > 0 {
            return Ok(false);
        }

        let hash = hash_password(secret).map_err(|e| PortalError::Auth(e.to_string()))?;
        repo.create(login, &hash).await?;
        warn!(login, "Created default administrator; change its password");
        Ok(true)
    }

    // ---- folders ----

    /// Create a folder and return its ID.
    ///
    /// The name is trimmed and must not be empty. An unknown `parent_id`
    /// fails with a store error.
    pub async fn create_folder(&self, name: &str, parent_id: Option<i64>) -> Result<i64> {
        let name = non_empty_name(name)?;
        let folder = FolderRepository::new(self.db.pool())
            .create(name, parent_id)
            .await?;
        info!(folder_id = folder.id, ?parent_id, name, "Created folder");
        Ok(folder.id)
    }

    /// Get a folder by ID.
    pub async fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        FolderRepository::new(self.db.pool()).get_by_id(id).await
    }

    /// Direct children of `parent_id` (root folders for `None`), by name.
    pub async fn get_subfolders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        FolderRepository::new(self.db.pool())
            .list_children(parent_id)
            .await
    }

    /// Every folder, by name.
    pub async fn get_all_folders(&self) -> Result<Vec<Folder>> {
        FolderRepository::new(self.db.pool()).list_all().await
    }

    /// Rename a folder. Returns false if it does not exist.
    pub async fn rename_folder(&self, id: i64, new_name: &str) -> Result<bool> {
        let name = non_empty_name(new_name)?;
        let renamed = FolderRepository::new(self.db.pool()).rename(id, name).await?;
        if renamed {
            info!(folder_id = id, name, "Renamed folder");
        }
        Ok(renamed)
    }

    /// Delete a folder with its whole subtree and the stored bytes of every
    /// file in it.
    ///
    /// Rows go in one transaction; bytes are removed after the commit and a
    /// failure to remove one is only logged.
    pub async fn delete_folder(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let paths = FolderRepository::subtree_storage_paths(&mut *tx, id).await?;
        let deleted = FolderRepository::delete(&mut *tx, id).await?;
        tx.commit().await?;

        if !deleted {
            return Ok(false);
        }

        let removed = paths
            .iter()
            .filter(|p| remove_stored_file(Path::new(p)))
            .count();
        info!(folder_id = id, files = paths.len(), removed, "Deleted folder");
        Ok(true)
    }

    /// Breadcrumb from the root down to `id`. Empty if `id` is unknown.
    pub async fn get_folder_path(&self, id: i64) -> Result<Vec<Folder>> {
        FolderRepository::new(self.db.pool()).get_path(id).await
    }

    // ---- files ----

    /// Record a stored file in a folder and return its ID.
    pub async fn add_file(&self, folder_id: i64, filename: &str, storage_path: &str) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        let id = FileRepository::insert(&mut conn, folder_id, filename, storage_path).await?;
        debug!(file_id = id, folder_id, filename, "Recorded file");
        Ok(id)
    }

    /// Files directly in a folder, newest first.
    pub async fn get_files_in_folder(&self, folder_id: i64) -> Result<Vec<FileRecord>> {
        FileRepository::new(self.db.pool())
            .list_by_folder(folder_id)
            .await
    }

    /// Get a file by ID.
    pub async fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        FileRepository::new(self.db.pool()).get_by_id(id).await
    }

    /// Delete a file row, then its stored bytes (best effort).
    pub async fn delete_file(&self, id: i64) -> Result<bool> {
        let repo = FileRepository::new(self.db.pool());
        let Some(file) = repo.get_by_id(id).await? else {
            return Ok(false);
        };
        if !repo.delete(id).await? {
            return Ok(false);
        }

        remove_stored_file(Path::new(&file.storage_path));
        info!(file_id = id, filename = %file.filename, "Deleted file");
        Ok(true)
    }

    /// Number of files in a folder, optionally including all descendants.
    pub async fn count_files(&self, folder_id: i64, recursive: bool) -> Result<i64> {
        let repo = FileRepository::new(self.db.pool());
        if recursive {
            repo.count_in_subtree(folder_id).await
        } else {
            repo.count_by_folder(folder_id).await
        }
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn non_empty_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PortalError::Validation(
            "folder name must not be empty".to_string(),
        ));
    }
    Ok(name)
}
