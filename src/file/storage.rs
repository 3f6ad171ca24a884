//! Managed storage area for uploaded file bytes.
//!
//! Copies are stored flat under the base directory:
//! ```text
//! {base_path}/
//! ├── 1718000000000_rapport.pdf
//! ├── 1718000000001_rapport.pdf
//! └── 1718000000412_photo_1_.png
//! ```
//! The millisecond prefix keeps repeated uploads of the same name apart.

use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, warn};

use crate::datetime::now_millis;
use crate::{PortalError, Result};

/// Characters replaced by `_` in stored names.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of a sanitized filename (in characters).
pub const MAX_STORED_NAME_LENGTH: usize = 200;

/// Number of millisecond prefixes tried before giving up on a free name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Replace characters that are unsafe in filenames and cap the length.
///
/// Names longer than [`MAX_STORED_NAME_LENGTH`] keep their extension and
/// lose characters from the stem.
///
/// # Examples
///
/// ```
/// use docportal::file::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a<b>c.txt"), "a_b_c.txt");
/// ```
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if replaced.chars().count() <= MAX_STORED_NAME_LENGTH {
        return replaced;
    }

    let (stem, ext) = split_extension(&replaced);
    let ext_len = ext.chars().count();
    if ext_len >= MAX_STORED_NAME_LENGTH {
        return replaced.chars().take(MAX_STORED_NAME_LENGTH).collect();
    }

    let stem: String = stem.chars().take(MAX_STORED_NAME_LENGTH - ext_len).collect();
    format!("{stem}{ext}")
}

/// Split `name` into stem and extension (extension includes the dot).
///
/// Leading dots do not start an extension, so `.bashrc` has none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Remove a stored copy, logging instead of failing.
///
/// Returns `true` if a file was removed. A file that is already gone is not
/// reported as a failure.
pub fn remove_stored_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stored file");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove stored file");
            false
        }
    }
}

/// File storage service for the managed upload directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Base directory for file storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a FileStorage rooted at `base_path`.
    ///
    /// The directory is not touched; call [`FileStorage::ensure_root`].
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the base directory if it does not exist. Idempotent.
    pub fn ensure_root(&self) -> Result<()> {
        if !self.base_path.is_dir() {
            fs::create_dir_all(&self.base_path)?;
            debug!(path = %self.base_path.display(), "Created storage directory");
        }
        Ok(())
    }

    /// Copy `source` into the storage area under a fresh name.
    ///
    /// The stored name is `<unix-millis>_<sanitized original_name>`. Bytes,
    /// permissions and access/modification times are copied. On failure any
    /// partially written copy is removed.
    pub fn store_file(&self, source: &Path, original_name: &str) -> Result<PathBuf> {
        let mut src = File::open(source).map_err(|e| {
            PortalError::Transfer(format!("cannot read {}: {e}", source.display()))
        })?;
        let src_meta = src.metadata().map_err(|e| {
            PortalError::Transfer(format!("cannot stat {}: {e}", source.display()))
        })?;
        if !src_meta.is_file() {
            return Err(PortalError::Transfer(format!(
                "{} is not a regular file",
                source.display()
            )));
        }

        let safe_name = sanitize_filename(original_name);
        let (dest_path, mut dest) = self.create_unique(&safe_name)?;

        let copied = io::copy(&mut src, &mut dest).and_then(|_| dest.sync_all());
        drop(dest);

        if let Err(e) = copied.and_then(|_| copy_metadata(&src_meta, &dest_path)) {
            remove_stored_file(&dest_path);
            return Err(PortalError::Transfer(format!(
                "cannot write {}: {e}",
                dest_path.display()
            )));
        }

        debug!(
            source = %source.display(),
            dest = %dest_path.display(),
            bytes = src_meta.len(),
            "Stored file"
        );
        Ok(dest_path)
    }

    /// Check if a stored path exists.
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Create a new, previously nonexistent destination file.
    ///
    /// Starts at the current millisecond and moves forward until a name is
    /// free, so concurrent or back-to-back uploads never overwrite each other.
    fn create_unique(&self, safe_name: &str) -> Result<(PathBuf, File)> {
        self.ensure_root().map_err(|e| {
            PortalError::Transfer(format!(
                "cannot create storage area {}: {e}",
                self.base_path.display()
            ))
        })?;

        let mut millis = now_millis();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.base_path.join(format!("{millis}_{safe_name}"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => millis += 1,
                Err(e) => {
                    return Err(PortalError::Transfer(format!(
                        "cannot create {}: {e}",
                        path.display()
                    )))
                }
            }
        }

        Err(PortalError::Transfer(format!(
            "no free storage name for {safe_name}"
        )))
    }
}

/// Copy a stored file out of the managed area to `dest`.
///
/// An existing `dest` is overwritten. Permissions and access/modification
/// times are copied. Fails with `NotFound` when the stored bytes are gone
/// and with `Transfer` when the copy itself fails; a partial `dest` is
/// removed.
pub fn export_stored_file(stored: &Path, dest: &Path) -> Result<()> {
    let mut src = match File::open(stored) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PortalError::NotFound(format!(
                "stored file {}",
                stored.display()
            )))
        }
        Err(e) => {
            return Err(PortalError::Transfer(format!(
                "cannot read {}: {e}",
                stored.display()
            )))
        }
    };
    let src_meta = src.metadata().map_err(|e| {
        PortalError::Transfer(format!("cannot stat {}: {e}", stored.display()))
    })?;

    if let (Ok(a), Ok(b)) = (fs::canonicalize(stored), fs::canonicalize(dest)) {
        if a == b {
            return Err(PortalError::Transfer(format!(
                "{} is the stored file itself",
                dest.display()
            )));
        }
    }

    let mut out = File::create(dest).map_err(|e| {
        PortalError::Transfer(format!("cannot create {}: {e}", dest.display()))
    })?;
    let copied = io::copy(&mut src, &mut out).and_then(|_| out.sync_all());
    drop(out);

    if let Err(e) = copied.and_then(|_| copy_metadata(&src_meta, dest)) {
        remove_stored_file(dest);
        return Err(PortalError::Transfer(format!(
            "cannot write {}: {e}",
            dest.display()
        )));
    }

    debug!(
        stored = %stored.display(),
        dest = %dest.display(),
        bytes = src_meta.len(),
        "Exported file"
    );
    Ok(())
}

/// Copy permissions and timestamps from the source metadata.
fn copy_metadata(src_meta: &Metadata, dest: &Path) -> io::Result<()> {
    let atime = FileTime::from_last_access_time(src_meta);
    let mtime = FileTime::from_last_modification_time(src_meta);
    filetime::set_file_times(dest, atime, mtime)?;
    fs::set_permissions(dest, src_meta.permissions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("uploads"));
        storage.ensure_root().unwrap();
        (temp_dir, storage)
    }

    fn write_source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_ensure_root_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("a").join("uploads");
        let storage = FileStorage::new(&storage_path);

        assert!(!storage_path.exists());
        storage.ensure_root().unwrap();
        assert!(storage_path.is_dir());
        storage.ensure_root().unwrap();
        assert_eq!(storage.base_path(), storage_path);
    }

    #[test]
    fn test_sanitize_forbidden_chars() {
        assert_eq!(sanitize_filename("a<b>c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename(r#"x:y"z/w\v|u?t*.md"#), "x_y_z_w_v_u_t_.md");
        assert_eq!(sanitize_filename("plain name.pdf"), "plain name.pdf");
    }

    #[test]
    fn test_sanitize_truncates_keeping_extension() {
        let long_name = format!("{}.txt", "x".repeat(246));
        assert_eq!(long_name.chars().count(), 250);

        let sanitized = sanitize_filename(&long_name);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with(".txt"));
        assert!(sanitized.starts_with("xxx"));
    }

    #[test]
    fn test_sanitize_truncates_multibyte() {
        let long_name = format!("{}.pdf", "é".repeat(300));
        let sanitized = sanitize_filename(&long_name);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn test_sanitize_long_name_without_extension() {
        let sanitized = sanitize_filename(&"y".repeat(300));
        assert_eq!(sanitized, "y".repeat(200));
    }

    #[test]
    fn test_sanitize_huge_extension() {
        let name = format!("a.{}", "z".repeat(250));
        assert_eq!(sanitize_filename(&name).chars().count(), 200);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
    }

    #[test]
    fn test_store_file_copies_bytes() {
        let (temp_dir, storage) = setup_storage();
        let content: Vec<u8> = (0..=255).collect();
        let source = write_source(&temp_dir, "a.txt", &content);

        let stored = storage.store_file(&source, "a.txt").unwrap();

        assert!(stored.starts_with(storage.base_path()));
        assert_eq!(fs::read(&stored).unwrap(), content);
        assert!(storage.exists(&stored));
    }

    #[test]
    fn test_store_file_name_format() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "src.bin", b"data");

        let stored = storage.store_file(&source, "my<file>.txt").unwrap();
        let name = stored.file_name().unwrap().to_str().unwrap();

        let (prefix, rest) = name.split_once('_').unwrap();
        assert!(prefix.parse::<i64>().is_ok());
        assert_eq!(rest, "my_file_.txt");
    }

    #[test]
    fn test_store_file_repeated_uploads_unique() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "same.txt", b"same");

        let first = storage.store_file(&source, "same.txt").unwrap();
        let second = storage.store_file(&source, "same.txt").unwrap();
        let third = storage.store_file(&source, "same.txt").unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_ne!(first, third);
        assert_eq!(fs::read(&third).unwrap(), b"same");
    }

    #[test]
    fn test_store_file_preserves_mtime() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "old.txt", b"old");
        let mtime = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        let stored = storage.store_file(&source, "old.txt").unwrap();

        let stored_meta = fs::metadata(&stored).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&stored_meta), mtime);
    }

    #[test]
    fn test_store_file_missing_source() {
        let (temp_dir, storage) = setup_storage();

        let result = storage.store_file(&temp_dir.path().join("missing.txt"), "missing.txt");

        assert!(matches!(result, Err(PortalError::Transfer(_))));
        assert_eq!(fs::read_dir(storage.base_path()).unwrap().count(), 0);
    }

    #[test]
    fn test_store_file_rejects_directory() {
        let (temp_dir, storage) = setup_storage();
        let dir = temp_dir.path().join("a_dir");
        fs::create_dir(&dir).unwrap();

        let result = storage.store_file(&dir, "a_dir");
        assert!(matches!(result, Err(PortalError::Transfer(_))));
    }

    #[test]
    fn test_store_file_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("late"));
        let source = write_source(&temp_dir, "a.txt", b"a");

        let stored = storage.store_file(&source, "a.txt").unwrap();
        assert!(stored.is_file());
    }

    #[test]
    fn test_store_file_unwritable_root() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = write_source(&temp_dir, "blocker", b"not a directory");
        let storage = FileStorage::new(blocker.join("uploads"));
        let source = write_source(&temp_dir, "a.txt", b"a");

        let result = storage.store_file(&source, "a.txt");
        assert!(matches!(result, Err(PortalError::Transfer(_))));
    }

    #[test]
    fn test_export_stored_file() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "src.txt", b"exported bytes");
        let mtime = FileTime::from_unix_time(1_200_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();
        let stored = storage.store_file(&source, "src.txt").unwrap();

        let dest = temp_dir.path().join("copy.txt");
        export_stored_file(&stored, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"exported bytes");
        let dest_meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dest_meta), mtime);
        assert!(stored.exists());
    }

    #[test]
    fn test_export_missing_stored_file() {
        let (temp_dir, storage) = setup_storage();
        let dest = temp_dir.path().join("copy.txt");

        let result = export_stored_file(&storage.base_path().join("1_gone.txt"), &dest);
        assert!(matches!(result, Err(PortalError::NotFound(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_unwritable_destination() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "a.txt", b"a");
        let stored = storage.store_file(&source, "a.txt").unwrap();

        let dest = temp_dir.path().join("no_such_dir").join("a.txt");
        let result = export_stored_file(&stored, &dest);
        assert!(matches!(result, Err(PortalError::Transfer(_))));
    }

    #[test]
    fn test_export_onto_itself_rejected() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "a.txt", b"keep me");
        let stored = storage.store_file(&source, "a.txt").unwrap();

        let result = export_stored_file(&stored, &stored);
        assert!(matches!(result, Err(PortalError::Transfer(_))));
        assert_eq!(fs::read(&stored).unwrap(), b"keep me");
    }

    #[test]
    fn test_remove_stored_file() {
        let (temp_dir, storage) = setup_storage();
        let source = write_source(&temp_dir, "gone.txt", b"x");
        let stored = storage.store_file(&source, "gone.txt").unwrap();

        assert!(remove_stored_file(&stored));
        assert!(!stored.exists());
        assert!(!remove_stored_file(&stored));
    }
}
