//! File transfer service: uploads, exports, tree imports and opening stored files.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::icon;
use super::import::{ImportOptions, ImportReport, Importer};
use super::opener;
use super::storage::{
    export_stored_file, remove_stored_file, sanitize_filename, FileStorage,
};
use super::FileRecord;
use crate::store::Store;
use crate::{PortalError, Result};

/// Moves bytes between the local filesystem and the managed storage area,
/// recording what it stores through a [`Store`].
#[derive(Debug, Clone)]
pub struct TransferService {
    storage: FileStorage,
}

impl TransferService {
    /// Create a service managing `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: FileStorage::new(upload_dir),
        }
    }

    /// The underlying storage area.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Create the managed directory if missing.
    pub fn ensure_storage_root(&self) -> Result<()> {
        self.storage.ensure_root()
    }

    /// Copy `source` into the managed area. See [`FileStorage::store_file`].
    pub fn store_file(&self, source: &Path, original_name: &str) -> Result<PathBuf> {
        self.storage.store_file(source, original_name)
    }

    /// Store a single file and record it in `folder_id`.
    ///
    /// The display name is the source's final path segment. If the row
    /// cannot be inserted, the copied bytes are removed again.
    pub async fn upload_file(
        &self,
        store: &Store,
        folder_id: i64,
        source: &Path,
    ) -> Result<FileRecord> {
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PortalError::Validation(format!("{} has no file name", source.display()))
            })?;

        let storage = self.storage.clone();
        let src = source.to_path_buf();
        let name = filename.clone();
        let stored = tokio::task::spawn_blocking(move || storage.store_file(&src, &name))
            .await
            .map_err(|e| PortalError::Transfer(format!("copy task failed: {e}")))??;

        let stored_str = stored.to_string_lossy().into_owned();
        let file_id = match store.add_file(folder_id, &filename, &stored_str).await {
            Ok(id) => id,
            Err(e) => {
                warn!(folder_id, filename = %filename, error = %e, "Upload not recorded, removing copy");
                remove_stored_file(&stored);
                return Err(e);
            }
        };

        info!(file_id, folder_id, filename = %filename, "Uploaded file");
        store
            .get_file(file_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("file".to_string()))
    }

    /// Save a copy of a stored file outside the managed area.
    ///
    /// When `dest` is an existing directory the copy keeps the record's
    /// display name inside it. Returns the path written.
    pub fn export_file(&self, record: &FileRecord, dest: &Path) -> Result<PathBuf> {
        let target = if dest.is_dir() {
            dest.join(sanitize_filename(&record.filename))
        } else {
            dest.to_path_buf()
        };

        export_stored_file(Path::new(&record.storage_path), &target)?;
        info!(file_id = record.id, dest = %target.display(), "Exported file");
        Ok(target)
    }

    /// Mirror `source_dir` under `parent_id` and return the number of files
    /// imported. Folders are not counted.
    pub async fn import_tree(
        &self,
        store: &Store,
        source_dir: &Path,
        parent_id: Option<i64>,
    ) -> usize {
        self.import_tree_with(store, source_dir, parent_id, &ImportOptions::default())
            .await
            .files_imported
    }

    /// Mirror `source_dir` under `parent_id` with cancellation and progress
    /// reporting.
    pub async fn import_tree_with(
        &self,
        store: &Store,
        source_dir: &Path,
        parent_id: Option<i64>,
        options: &ImportOptions,
    ) -> ImportReport {
        Importer::new(store, &self.storage, options)
            .run(source_dir, parent_id)
            .await
    }

    /// Open a stored file with the platform's default application.
    pub fn open_with_default_handler(&self, path: &Path) -> bool {
        opener::open_with_default_handler(path)
    }

    /// Display glyph for a file extension.
    pub fn classify_icon(&self, extension: &str) -> &'static str {
        icon::classify_icon(extension)
    }
}
