//! docportal - document portal
//!
//! Keeps a tree of folders and the files filed in them in SQLite, copies
//! uploaded bytes into a managed storage area, and imports whole directory
//! trees. Only authenticated administrators may change the tree.

pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod store;

pub use auth::{hash_password, validate_password, verify_password, PasswordError};
pub use config::Config;
pub use db::{Admin, Database};
pub use error::{PortalError, Result};
pub use file::{
    classify_icon, sanitize_filename, FileRecord, Folder, ImportEvent, ImportOptions,
    ImportReport, TransferService,
};
pub use store::Store;
