//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use filetime::FileTime;
use tempfile::TempDir;

use ::common::mirror::{MirrorConfig, MirrorSync};
use ::common::process::{InteractiveCommand, OutputSnapshot};

/// Route library logs to the test harness; `RUST_LOG` raises the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// A local root and a mirror root inside one temp dir
pub struct MirrorFixture {
    pub temp: TempDir,
    pub local_root: PathBuf,
    pub mirror_root: PathBuf,
    pub engine: MirrorSync,
}

pub fn setup_mirror() -> MirrorFixture {
    let temp = TempDir::new().unwrap();
    let local_root = temp.path().join("local");
    let mirror_root = temp.path().join("mirror");
    std::fs::create_dir_all(&local_root).unwrap();
    std::fs::create_dir_all(&mirror_root).unwrap();

    let engine = MirrorSync::new(MirrorConfig::new(&mirror_root, &local_root)).unwrap();
    MirrorFixture {
        temp,
        local_root,
        mirror_root,
        engine,
    }
}

/// Write a file (creating parents) and pin its mtime to `mtime` seconds
pub fn write_file(path: &Path, contents: &str, mtime: i64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
    set_mtime(path, mtime);
}

pub fn set_mtime(path: &Path, mtime: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

pub fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap())
}

/// Every file under `root`, relative to it, sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Drain repeatedly until `done` holds for the accumulated output
pub async fn drain_until(
    cmd: &mut InteractiveCommand,
    done: impl Fn(&OutputSnapshot) -> bool,
) -> OutputSnapshot {
    let mut collected = OutputSnapshot::default();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !done(&collected) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out, collected so far: {:?}",
            collected
        );
        collected.extend(cmd.drain_all());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    collected
}
