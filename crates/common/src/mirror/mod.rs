//! Mirror synchronization engine
//!
//! Keeps one path of a local working tree consistent with its counterpart in
//! a mirror tree (typically a mounted cloud drive). The decision for a path is
//! made from the existence and modification time of each side, recomputed on
//! every call; nothing is cached and no journal is kept.
//!
//! # Policy
//!
//! | local | mirror | mtimes          | action                 |
//! |-------|--------|-----------------|------------------------|
//! | yes   | no     |                 | copy local → mirror    |
//! | yes   | yes    | mirror < local  | copy local → mirror    |
//! | yes   | yes    | mirror >= local | nothing                |
//! | no    | yes    |                 | copy mirror → local    |
//! | no    | no     |                 | [`SyncError::FileMissing`] |
//!
//! Content is never merged and neither side is ever deleted. A pulled file
//! keeps the mirror's modification time so the next call lands on the tie
//! branch instead of pushing the same bytes back.
//!
//! # Concurrency
//!
//! The check-then-copy sequence is not atomic and concurrent calls on the
//! same path are not coordinated. Callers keep a single writer per path;
//! disjoint paths may be synced concurrently.

mod decision;
mod paths;
mod tabular;

pub use decision::{decide, SyncAction};
pub use paths::{absolutize, normalize, resolve_links};
pub use tabular::{
    parse as parse_delimited, DelimitedReader, Table, TabularError, TabularFormat, TabularReader,
};

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use serde::{Deserialize, Serialize};

use crate::fsutil::ensure_dir;

/// The pair of roots a [`MirrorSync`] maps between
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Tree standing in for the remote storage
    pub mirror_root: PathBuf,
    /// The local working tree; every synced path must be under it
    pub local_root: PathBuf,
}

impl MirrorConfig {
    pub fn new(mirror_root: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
            local_root: local_root.into(),
        }
    }
}

/// Result of a successful [`MirrorSync::sync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local copy was newer (or the only one) and was copied to the mirror
    Pushed { local: PathBuf, mirror: PathBuf },
    /// Only the mirror held the file and it was copied to the local tree
    Pulled { local: PathBuf, mirror: PathBuf },
    /// Mirror is at least as new as the local copy, nothing written
    UpToDate { local: PathBuf, mirror: PathBuf },
}

impl SyncOutcome {
    pub fn local(&self) -> &Path {
        match self {
            SyncOutcome::Pushed { local, .. }
            | SyncOutcome::Pulled { local, .. }
            | SyncOutcome::UpToDate { local, .. } => local,
        }
    }

    pub fn mirror(&self) -> &Path {
        match self {
            SyncOutcome::Pushed { mirror, .. }
            | SyncOutcome::Pulled { mirror, .. }
            | SyncOutcome::UpToDate { mirror, .. } => mirror,
        }
    }

    /// Whether this call wrote to either tree
    pub fn wrote(&self) -> bool {
        !matches!(self, SyncOutcome::UpToDate { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Pushed { .. } => "pushed",
            SyncOutcome::Pulled { .. } => "pulled",
            SyncOutcome::UpToDate { .. } => "up to date",
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("the file [{path}] is not mapped to mirror location [{mirror_root}]")]
    PathNotMapped { path: PathBuf, mirror_root: PathBuf },
    #[error("cannot find file [{mirror}] on the mirror")]
    FileMissing { local: PathBuf, mirror: PathBuf },
    #[error("[{0}] is a directory, only files can be synced")]
    NotAFile(PathBuf),
    #[error("failed to {action} [{path}]: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Tabular(#[from] TabularError),
}

impl SyncError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        SyncError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of [`MirrorSync::batch_sync`], one entry per input path in order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<(PathBuf, Result<SyncOutcome, SyncError>)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.succeeded() == 0
    }
}

/// Synchronizes individual paths between a local root and a mirror root
#[derive(Debug, Clone)]
pub struct MirrorSync {
    mirror_root: PathBuf,
    local_root: PathBuf,
    reader: Arc<dyn TabularReader>,
}

impl MirrorSync {
    /// Build an engine from explicit roots.
    ///
    /// Relative roots are resolved against the current directory once, here,
    /// and symlinks in the local root are resolved.
    pub fn new(config: MirrorConfig) -> Result<Self, SyncError> {
        let mirror_root = absolutize(&config.mirror_root)
            .map_err(|e| SyncError::io("resolve mirror root", &config.mirror_root, e))?;
        let local_root = resolve_links(&config.local_root)
            .map_err(|e| SyncError::io("resolve local root", &config.local_root, e))?;
        tracing::debug!(
            "Mirror sync between {} and {}",
            local_root.display(),
            mirror_root.display()
        );
        Ok(Self {
            mirror_root,
            local_root,
            reader: Arc::new(DelimitedReader),
        })
    }

    /// Replace the reader used by [`read_tabular_for_sync`](Self::read_tabular_for_sync)
    pub fn with_tabular_reader(mut self, reader: impl TabularReader + 'static) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Map a path to its (local, mirror) pair.
    ///
    /// Symlinks are resolved before the prefix check, so a link inside the
    /// local root that points elsewhere is not mapped. Only metadata is read.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<(PathBuf, PathBuf), SyncError> {
        let path = path.as_ref();
        let local = resolve_links(path).map_err(|e| SyncError::io("resolve", path, e))?;
        let Some(relative) = paths::relative_to(&local, &self.local_root) else {
            return Err(SyncError::PathNotMapped {
                path: path.to_path_buf(),
                mirror_root: self.mirror_root.clone(),
            });
        };
        let mirror = self.mirror_root.join(relative);
        Ok((local, mirror))
    }

    /// Make the local and mirror copies of `path` match.
    ///
    /// `path` may be relative to the current directory but must resolve under
    /// the local root; otherwise nothing on disk is read or written.
    pub fn sync(&self, path: impl AsRef<Path>) -> Result<SyncOutcome, SyncError> {
        let (local, mirror) = self.resolve(path)?;

        let local_mtime = modified(&local)?;
        let mirror_mtime = modified(&mirror)?;
        let action = decide(local_mtime, mirror_mtime);
        tracing::debug!(
            local = %local.display(),
            mirror = %mirror.display(),
            ?action,
            "sync decision"
        );

        match action {
            SyncAction::Push => {
                copy_file(&local, &mirror)?;
                // a copy stamped earlier than the source would be pushed again
                if let Some(local_mtime) = local_mtime {
                    if modified(&mirror)?.is_some_and(|copied| copied < local_mtime) {
                        filetime::set_file_mtime(&mirror, FileTime::from_system_time(local_mtime))
                            .map_err(|e| SyncError::io("set modification time of", &mirror, e))?;
                    }
                }
                tracing::info!("Pushed {} -> {}", local.display(), mirror.display());
                Ok(SyncOutcome::Pushed { local, mirror })
            }
            SyncAction::Pull => {
                copy_file(&mirror, &local)?;
                if let Some(mtime) = mirror_mtime {
                    filetime::set_file_mtime(&local, FileTime::from_system_time(mtime))
                        .map_err(|e| SyncError::io("set modification time of", &local, e))?;
                }
                tracing::info!("Pulled {} -> {}", mirror.display(), local.display());
                Ok(SyncOutcome::Pulled { local, mirror })
            }
            SyncAction::Skip => Ok(SyncOutcome::UpToDate { local, mirror }),
            SyncAction::Missing => Err(SyncError::FileMissing { local, mirror }),
        }
    }

    /// Sync each path in order.
    ///
    /// A failing path is logged and recorded; the remaining paths are still
    /// attempted.
    pub fn batch_sync<I, P>(&self, paths: I) -> BatchReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            let result = self.sync(path);
            if let Err(e) = &result {
                tracing::warn!("Skipping {}: {}", path.display(), e);
            }
            report.results.push((path.to_path_buf(), result));
        }
        report
    }

    /// Sync `path`, then open the local copy with `options`.
    ///
    /// No open is attempted when the sync fails.
    pub fn open_for_sync(
        &self,
        path: impl AsRef<Path>,
        options: &OpenOptions,
    ) -> Result<File, SyncError> {
        let outcome = self.sync(path)?;
        options
            .open(outcome.local())
            .map_err(|e| SyncError::io("open", outcome.local(), e))
    }

    /// Sync `path`, then read the local copy as a table.
    ///
    /// The reader is not invoked when the sync fails.
    pub fn read_tabular_for_sync(
        &self,
        path: impl AsRef<Path>,
        format: TabularFormat,
    ) -> Result<Table, SyncError> {
        let outcome = self.sync(path)?;
        Ok(self.reader.read(outcome.local(), format)?)
    }
}

/// Modification time of a file, `None` if it does not exist
fn modified(path: &Path) -> Result<Option<SystemTime>, SyncError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SyncError::io("stat", path, e)),
    };
    if metadata.is_dir() {
        return Err(SyncError::NotAFile(path.to_path_buf()));
    }
    metadata
        .modified()
        .map(Some)
        .map_err(|e| SyncError::io("read modification time of", path, e))
}

fn copy_file(from: &Path, to: &Path) -> Result<(), SyncError> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent).map_err(|e| SyncError::io("create directory", parent, e))?;
    }
    std::fs::copy(from, to).map_err(|e| SyncError::io("copy", from, e))?;
    Ok(())
}
