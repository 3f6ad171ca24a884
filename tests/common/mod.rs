//! Test helpers for integration tests.
//!
//! Provides TestPortal, a store plus transfer service rooted in a scratch
//! directory, and helpers for building source trees.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use docportal::{Config, Store, TransferService};

/// A portal backed by a database file and an upload directory inside a
/// temporary directory that is removed on drop.
pub struct TestPortal {
    pub store: Store,
    pub transfer: TransferService,
    pub config: Config,
    dir: TempDir,
}

impl TestPortal {
    /// Open a fresh portal with the default administrator seeded.
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");

        let mut config = Config::default();
        config.database.path = dir.path().join("portal.db").to_string_lossy().into_owned();
        config.storage.upload_dir = dir.path().join("uploads").to_string_lossy().into_owned();

        let store = Store::open(&config).await.expect("open store");
        let transfer = TransferService::new(&config.storage.upload_dir);
        transfer.ensure_storage_root().expect("create upload dir");

        Self {
            store,
            transfer,
            config,
            dir,
        }
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The managed upload directory.
    pub fn upload_dir(&self) -> &Path {
        self.transfer.storage().base_path()
    }

    /// Number of files in the upload directory.
    pub fn stored_file_count(&self) -> usize {
        fs::read_dir(self.upload_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Create a source tree under the scratch directory from
    /// `(relative path, content)` pairs and return its root.
    pub fn source_tree(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = self.root().join("sources").join(name);
        fs::create_dir_all(&root).expect("create source root");
        for (relative, content) in files {
            write_file(&root.join(relative), content.as_bytes());
        }
        root
    }
}

/// Write a file, creating parent directories as needed.
pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, content).expect("write file");
}
