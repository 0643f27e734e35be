//! Directory helpers

use std::io;
use std::path::{Path, PathBuf};

/// Create `path` and any missing parents.
///
/// Returns `true` if the directory had to be created.
pub fn ensure_dir(path: &Path) -> io::Result<bool> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(false);
    }
    tracing::info!("Creating folder: {}", path.display());
    std::fs::create_dir_all(path)?;
    Ok(true)
}

/// Resolve a directory that is guaranteed to be writable.
///
/// Tries `path` first: it is created if missing and a scratch file is written
/// into it. If either step fails, `fallback` is created instead. Both results
/// are returned as absolute paths.
pub fn fix_dir(path: &Path, fallback: &Path) -> io::Result<PathBuf> {
    match writable_dir(path) {
        Ok(dir) => Ok(dir),
        Err(e) => {
            tracing::warn!(
                "Cannot use {} ({}), falling back to {}",
                path.display(),
                e,
                fallback.display()
            );
            writable_dir(fallback)
        }
    }
}

fn writable_dir(path: &Path) -> io::Result<PathBuf> {
    ensure_dir(path)?;
    // dropped immediately, the scratch file is removed with it
    tempfile::tempfile_in(path)?;
    std::path::absolute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_nested() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");

        assert!(ensure_dir(&nested).unwrap());
        assert!(nested.is_dir());
        // second call is a no-op
        assert!(!ensure_dir(&nested).unwrap());
    }

    #[test]
    fn test_ensure_dir_empty_path() {
        assert!(!ensure_dir(Path::new("")).unwrap());
    }

    #[test]
    fn test_fix_dir_uses_preferred_when_writable() {
        let temp = TempDir::new().unwrap();
        let preferred = temp.path().join("logs");
        let fallback = temp.path().join("fallback");

        let dir = fix_dir(&preferred, &fallback).unwrap();
        assert_eq!(dir, preferred);
        assert!(!fallback.exists());
    }

    #[test]
    fn test_fix_dir_falls_back() {
        let temp = TempDir::new().unwrap();
        // a regular file cannot become a directory
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let preferred = blocker.join("logs");
        let fallback = temp.path().join("fallback");

        let dir = fix_dir(&preferred, &fallback).unwrap();
        assert_eq!(dir, fallback);
        assert!(fallback.is_dir());
    }
}
