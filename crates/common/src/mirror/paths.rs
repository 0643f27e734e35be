//! Path handling for the local and mirror roots
//!
//! Paths are made absolute against the working directory and normalized
//! lexically. [`resolve_links`] then resolves symlinks in the part of the
//! path that exists, so a path can be mapped even when the file only exists
//! on one side (or on neither) while a link cannot smuggle it out of a root.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and collapse `.` and `..` components
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Collapse `.` and `..` components lexically.
///
/// `..` at the root stays at the root, matching how the kernel resolves it.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Absolutize `path` and resolve symlinks in its deepest existing ancestor.
///
/// The components that do not exist yet are appended unchanged. Only
/// metadata is read; nothing is created or written.
pub fn resolve_links(path: &Path) -> io::Result<PathBuf> {
    let absolute = absolutize(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut resolved = canonical;
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(absolute);
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Relative location of `local` under `local_root`.
///
/// Both inputs must already be normalized. Matching is per component, so
/// `/data2/x` is not under `/data`. The root itself has no relative file and
/// yields `None`.
pub fn relative_to<'a>(local: &'a Path, local_root: &Path) -> Option<&'a Path> {
    let relative = local.strip_prefix(local_root).ok()?;
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}
