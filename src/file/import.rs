//! Recursive import of a directory tree into the folder hierarchy.
//!
//! The walk is depth-first pre-order: a directory's folder row and the
//! rows of its regular files are committed together before any of its
//! subdirectories is visited. Per-item failures are logged, recorded in
//! the [`ImportReport`] and skipped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::icon::{classify_icon, extension_of};
use super::storage::{remove_stored_file, FileStorage};
use super::{FileRepository, FolderRepository};
use crate::store::Store;
use crate::{PortalError, Result};

/// Knobs for a single import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Checked before every directory and every entry.
    pub cancel: CancellationToken,
    /// Receives an event for each folder created, file imported and item
    /// skipped.
    pub progress: Option<UnboundedSender<ImportEvent>>,
}

impl ImportOptions {
    /// Options with a cancellation token and no progress channel.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    fn emit(&self, event: ImportEvent) {
        if let Some(tx) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// Progress notification sent while importing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    /// A folder row was committed for a source directory.
    FolderCreated {
        /// Id of the new folder.
        folder_id: i64,
        /// Folder it was created under; `None` at the top level.
        parent_id: Option<i64>,
        /// Directory name used as the folder name.
        name: String,
    },
    /// A file was copied into storage and its row committed.
    FileImported {
        /// Id of the new file row.
        file_id: i64,
        /// Folder holding the file.
        folder_id: i64,
        /// Display name, the source's final path segment.
        filename: String,
        /// Glyph for the file's extension.
        icon: &'static str,
    },
    /// A directory or file was left out of the import.
    Skipped {
        /// Source path that was not imported.
        path: PathBuf,
        /// Why it was left out.
        reason: String,
    },
}

/// An entry that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    /// Source path of the failed entry.
    pub path: PathBuf,
    /// Error text from the failed copy, listing or insert.
    pub reason: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Folder created for the source directory itself, if any.
    pub root_folder_id: Option<i64>,
    /// Folder rows committed, the root included.
    pub folders_created: usize,
    /// File rows committed. Folders are not counted.
    pub files_imported: usize,
    /// Entries that were skipped because of an error, in walk order.
    pub failures: Vec<ImportFailure>,
    /// True when the run stopped early because the token was cancelled.
    pub cancelled: bool,
}

/// A file copied into storage, waiting for its row.
struct StagedFile {
    source: PathBuf,
    filename: String,
    stored: PathBuf,
}

/// Walks one source tree. Holds the state shared by all directory levels.
pub(crate) struct Importer<'a> {
    store: &'a Store,
    storage: &'a FileStorage,
    options: &'a ImportOptions,
    visited: HashSet<PathBuf>,
    report: ImportReport,
}

impl<'a> Importer<'a> {
    pub(crate) fn new(store: &'a Store, storage: &'a FileStorage, options: &'a ImportOptions) -> Self {
        Self {
            store,
            storage,
            options,
            visited: HashSet::new(),
            report: ImportReport::default(),
        }
    }

    /// Import `source_dir` as a new folder under `parent_id`.
    pub(crate) async fn run(mut self, source_dir: &Path, parent_id: Option<i64>) -> ImportReport {
        info!(source = %source_dir.display(), ?parent_id, "Starting import");

        // Reversed push order keeps siblings in listing order.
        let mut pending = vec![(source_dir.to_path_buf(), parent_id)];
        let mut is_root = true;

        while let Some((dir, parent)) = pending.pop() {
            if self.options.cancel.is_cancelled() {
                self.report.cancelled = true;
                break;
            }

            let Some((folder_id, subdirs)) = self.import_level(&dir, parent).await else {
                is_root = false;
                continue;
            };
            if is_root {
                self.report.root_folder_id = Some(folder_id);
                is_root = false;
            }

            if self.report.cancelled {
                break;
            }
            pending.extend(subdirs.into_iter().rev().map(|d| (d, Some(folder_id))));
        }

        info!(
            files = self.report.files_imported,
            folders = self.report.folders_created,
            failures = self.report.failures.len(),
            cancelled = self.report.cancelled,
            "Import finished"
        );
        self.report
    }

    /// Import one directory: its folder row and its regular files.
    ///
    /// Returns the new folder ID and the subdirectories still to visit, or
    /// `None` when the whole subtree was skipped.
    async fn import_level(
        &mut self,
        dir: &Path,
        parent_id: Option<i64>,
    ) -> Option<(i64, Vec<PathBuf>)> {
        // The folder row is still created for an unresolvable directory;
        // only its contents are lost.
        let canonical = match fs::canonicalize(dir) {
            Ok(path) => {
                if !self.visited.insert(path.clone()) {
                    debug!(path = %dir.display(), "Directory already imported, skipping");
                    self.options.emit(ImportEvent::Skipped {
                        path: dir.to_path_buf(),
                        reason: "directory already imported".to_string(),
                    });
                    return None;
                }
                Some(path)
            }
            Err(e) => {
                self.fail(dir, format!("cannot resolve directory: {e}"));
                None
            }
        };

        let name = folder_name(dir, canonical.as_deref());
        let (files, subdirs) = match canonical {
            Some(_) => self.scan(dir),
            None => (Vec::new(), Vec::new()),
        };

        let mut staged = Vec::with_capacity(files.len());
        for (source, filename) in files {
            if self.options.cancel.is_cancelled() {
                self.report.cancelled = true;
                break;
            }
            match self.stage(&source, &filename).await {
                Ok(stored) => staged.push(StagedFile {
                    source,
                    filename,
                    stored,
                }),
                Err(e) => self.fail(&source, e.to_string()),
            }
        }

        let (folder_id, imported) = match self.commit_level(&name, parent_id, &staged).await {
            Ok(result) => result,
            Err(e) => {
                for file in &staged {
                    remove_stored_file(&file.stored);
                }
                self.fail(dir, e.to_string());
                return None;
            }
        };

        self.report.folders_created += 1;
        self.options.emit(ImportEvent::FolderCreated {
            folder_id,
            parent_id,
            name,
        });
        for (file_id, file) in imported {
            self.report.files_imported += 1;
            self.options.emit(ImportEvent::FileImported {
                file_id,
                folder_id,
                icon: classify_icon(extension_of(&file.filename)),
                filename: file.filename.clone(),
            });
        }

        Some((folder_id, subdirs))
    }

    /// List a directory, splitting entries into regular files and
    /// subdirectories. Symlinks are followed; anything else is ignored.
    fn scan(&mut self, dir: &Path) -> (Vec<(PathBuf, String)>, Vec<PathBuf>) {
        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.fail(dir, format!("cannot list directory: {e}"));
                return (files, subdirs);
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.fail(dir, format!("cannot read entry: {e}"));
                    continue;
                }
            };
            let path = entry.path();
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {
                    let filename = entry.file_name().to_string_lossy().into_owned();
                    files.push((path, filename));
                }
                Ok(meta) if meta.is_dir() => subdirs.push(path),
                Ok(_) => debug!(path = %path.display(), "Ignoring special file"),
                Err(e) => self.fail(&path, format!("cannot stat entry: {e}")),
            }
        }

        (files, subdirs)
    }

    /// Copy one file into storage off the async runtime.
    async fn stage(&self, source: &Path, filename: &str) -> Result<PathBuf> {
        let storage = self.storage.clone();
        let source = source.to_path_buf();
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || storage.store_file(&source, &filename))
            .await
            .map_err(|e| PortalError::Transfer(format!("copy task failed: {e}")))?
    }

    /// Insert the folder row and the staged file rows in one transaction.
    ///
    /// Rows that fail individually have their bytes removed and are
    /// reported; the rest of the level is still committed.
    async fn commit_level<'s>(
        &mut self,
        name: &str,
        parent_id: Option<i64>,
        staged: &'s [StagedFile],
    ) -> Result<(i64, Vec<(i64, &'s StagedFile)>)> {
        let mut tx = self.store.database().begin().await?;
        let folder_id = FolderRepository::insert(&mut *tx, name, parent_id).await?;

        let mut imported = Vec::with_capacity(staged.len());
        for file in staged {
            let stored = file.stored.to_string_lossy();
            match FileRepository::insert(&mut *tx, folder_id, &file.filename, &stored).await {
                Ok(file_id) => imported.push((file_id, file)),
                Err(e) => {
                    remove_stored_file(&file.stored);
                    self.fail(&file.source, e.to_string());
                }
            }
        }

        tx.commit().await.map_err(|e| {
            // Rows that made it are gone with the rollback; their bytes go too.
            for (_, file) in &imported {
                remove_stored_file(&file.stored);
            }
            PortalError::from(e)
        })?;

        debug!(folder_id, name, files = imported.len(), "Committed import level");
        Ok((folder_id, imported))
    }

    fn fail(&mut self, path: &Path, reason: String) {
        warn!(path = %path.display(), reason = %reason, "Import item skipped");
        self.options.emit(ImportEvent::Skipped {
            path: path.to_path_buf(),
            reason: reason.clone(),
        });
        self.report.failures.push(ImportFailure {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Name of the folder created for `dir`: its last path segment, falling
/// back to the canonical path for inputs like `.`.
fn folder_name(dir: &Path, canonical: Option<&Path>) -> String {
    dir.file_name()
        .filter(|n| *n != "." && *n != "..")
        .or_else(|| canonical.and_then(Path::file_name))
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical.unwrap_or(dir).to_string_lossy().into_owned())
}
