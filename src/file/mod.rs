//! Folder and file management for docportal.
//!
//! This module provides:
//! - The folder tree and file metadata repositories
//! - The managed storage area for uploaded bytes
//! - Recursive directory import with progress and cancellation
//! - Opening stored files and extension-based icons

mod folder;
mod icon;
mod import;
mod metadata;
mod opener;
mod storage;
mod transfer;

pub use folder::{Folder, FolderRepository};
pub use icon::{classify_icon, extension_of, FileKind, DEFAULT_ICON};
pub use import::{ImportEvent, ImportFailure, ImportOptions, ImportReport};
pub use metadata::{format_size, FileRecord, FileRepository};
pub use opener::open_with_default_handler;
pub use storage::{
    export_stored_file, remove_stored_file, sanitize_filename, FileStorage,
    MAX_STORED_NAME_LENGTH,
};
pub use transfer::TransferService;
