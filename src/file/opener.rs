//! Opening stored files with the desktop's default application.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

/// Build the platform launcher command for `path`.
fn launcher(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        // The empty argument is the window title `start` expects first.
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

/// Open `path` with the operating system's default handler.
///
/// Returns false if the path does not exist, the launcher cannot be spawned,
/// or it exits with a failure status.
pub fn open_with_default_handler(path: &Path) -> bool {
    if !path.exists() {
        warn!(path = %path.display(), "Cannot open missing file");
        return false;
    }

    let status = launcher(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => {
            info!(path = %path.display(), "Opened file");
            true
        }
        Ok(status) => {
            warn!(path = %path.display(), %status, "Default handler failed");
            false
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot launch default handler");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_returns_false() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!open_with_default_handler(&dir.path().join("missing.pdf")));
    }

    #[test]
    fn test_launcher_passes_path() {
        let cmd = launcher(Path::new("/tmp/report.pdf"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args.last().unwrap().to_str(), Some("/tmp/report.pdf"));
    }
}
