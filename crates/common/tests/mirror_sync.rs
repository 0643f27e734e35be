//! Integration tests for the mirror synchronization engine

mod common;

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ::common::mirror::{
    MirrorConfig, MirrorSync, SyncError, SyncOutcome, Table, TabularError, TabularFormat,
    TabularReader,
};

/// local/a/b.txt exists with mtime 100, the mirror has nothing.
/// The first sync creates mirror/a/ and copies, the second writes nothing.
#[test]
fn test_push_then_idempotent() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("a/b.txt");
    common::write_file(&local, "hello", 100);

    let outcome = fx.engine.sync(&local).unwrap();
    assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
    let mirror = fx.mirror_root.join("a/b.txt");
    assert_eq!(outcome.mirror(), mirror);
    assert_eq!(std::fs::read_to_string(&mirror).unwrap(), "hello");
    assert!(common::mtime(&mirror) >= common::mtime(&local));

    let mirror_mtime = common::mtime(&mirror);
    let again = fx.engine.sync(&local).unwrap();
    assert!(matches!(again, SyncOutcome::UpToDate { .. }));
    assert!(!again.wrote());
    assert_eq!(common::mtime(&mirror), mirror_mtime);
}

/// A local file dated after the copy time must not be pushed on every call
#[test]
fn test_future_local_mtime_is_pushed_once() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("future.txt");
    let future = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        + 3600;
    common::write_file(&local, "ahead", future);

    let first = fx.engine.sync(&local).unwrap();
    assert!(matches!(first, SyncOutcome::Pushed { .. }));
    let mirror = fx.mirror_root.join("future.txt");
    assert!(common::mtime(&mirror) >= common::mtime(&local));

    let second = fx.engine.sync(&local).unwrap();
    assert!(matches!(second, SyncOutcome::UpToDate { .. }));
    assert!(!second.wrote());
}

#[test]
fn test_newer_local_overwrites_mirror() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("notes.txt");
    let mirror = fx.mirror_root.join("notes.txt");
    common::write_file(&mirror, "old", 100);
    common::write_file(&local, "new", 200);

    let outcome = fx.engine.sync(&local).unwrap();
    assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
    assert_eq!(std::fs::read_to_string(&mirror).unwrap(), "new");
    // the copy stamps the mirror with the copy time
    assert!(common::mtime(&mirror).unix_seconds() > 200);
}

#[test]
fn test_newer_mirror_is_left_alone() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("notes.txt");
    let mirror = fx.mirror_root.join("notes.txt");
    common::write_file(&local, "local", 100);
    common::write_file(&mirror, "mirror", 200);

    let outcome = fx.engine.sync(&local).unwrap();
    assert!(matches!(outcome, SyncOutcome::UpToDate { .. }));
    assert_eq!(std::fs::read_to_string(&local).unwrap(), "local");
    assert_eq!(std::fs::read_to_string(&mirror).unwrap(), "mirror");
}

#[test]
fn test_equal_mtimes_are_a_noop() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("same.txt");
    let mirror = fx.mirror_root.join("same.txt");
    common::write_file(&local, "left", 500);
    common::write_file(&mirror, "right", 500);

    let outcome = fx.engine.sync(&local).unwrap();
    assert!(!outcome.wrote());
    assert_eq!(std::fs::read_to_string(&mirror).unwrap(), "right");
    assert_eq!(common::mtime(&mirror).unix_seconds(), 500);
}

#[test]
fn test_pull_creates_local_parents_and_keeps_mtime() {
    let fx = common::setup_mirror();
    let local = fx.local_root.join("deep/er/data.csv");
    let mirror = fx.mirror_root.join("deep/er/data.csv");
    common::write_file(&mirror, "a,b\n1,2\n", 300);

    let outcome = fx.engine.sync(&local).unwrap();
    assert!(matches!(outcome, SyncOutcome::Pulled { .. }));
    assert_eq!(std::fs::read_to_string(&local).unwrap(), "a,b\n1,2\n");
    assert_eq!(common::mtime(&local).unix_seconds(), 300);

    // pulled copy ties with the mirror, so nothing is pushed back
    let again = fx.engine.sync(&local).unwrap();
    assert!(matches!(again, SyncOutcome::UpToDate { .. }));
    assert_eq!(common::mtime(&mirror).unix_seconds(), 300);
}

#[test]
fn test_missing_on_both_sides() {
    let fx = common::setup_mirror();
    let err = fx.engine.sync(fx.local_root.join("ghost.txt")).unwrap_err();
    match err {
        SyncError::FileMissing { mirror, .. } => {
            assert_eq!(mirror, fx.mirror_root.join("ghost.txt"));
        }
        other => panic!("Expected FileMissing, got {:?}", other),
    }
}

#[test]
fn test_unmapped_path_touches_nothing() {
    let fx = common::setup_mirror();
    // shares a string prefix with the local root but is a sibling
    let sibling = fx.temp.path().join("local2/file.txt");
    common::write_file(&sibling, "outside", 100);

    let err = fx.engine.sync(&sibling).unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));

    let escaped = fx.local_root.join("../local2/file.txt");
    let err = fx.engine.sync(&escaped).unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));

    assert!(common::list_files(&fx.mirror_root).is_empty());
    assert!(common::list_files(&fx.local_root).is_empty());
}

/// A link inside the local root pointing out of it must not be written through
#[test]
fn test_symlink_out_of_local_root_is_not_mapped() {
    let fx = common::setup_mirror();
    let outside = fx.temp.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, fx.local_root.join("link")).unwrap();
    common::write_file(&fx.mirror_root.join("link/f.txt"), "remote", 100);

    let err = fx.engine.sync(fx.local_root.join("link/f.txt")).unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));
    assert!(!outside.join("f.txt").exists());

    // a file link escaping the root is rejected as well
    common::write_file(&outside.join("secret.txt"), "s", 100);
    std::os::unix::fs::symlink(outside.join("secret.txt"), fx.local_root.join("secret.txt"))
        .unwrap();
    let err = fx.engine.sync(fx.local_root.join("secret.txt")).unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));
    assert!(!fx.mirror_root.join("secret.txt").exists());
}

/// Links that stay inside the local root still map to the link's target
#[test]
fn test_symlink_within_local_root_maps_to_target() {
    let fx = common::setup_mirror();
    std::fs::create_dir_all(fx.local_root.join("real")).unwrap();
    std::os::unix::fs::symlink(fx.local_root.join("real"), fx.local_root.join("alias")).unwrap();
    common::write_file(&fx.local_root.join("real/a.txt"), "a", 100);

    let outcome = fx.engine.sync(fx.local_root.join("alias/a.txt")).unwrap();
    assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
    assert_eq!(outcome.mirror(), fx.mirror_root.join("real/a.txt"));
}

#[test]
fn test_local_root_itself_is_not_mapped() {
    let fx = common::setup_mirror();
    let err = fx.engine.sync(&fx.local_root).unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));
}

#[test]
fn test_directory_is_rejected() {
    let fx = common::setup_mirror();
    std::fs::create_dir_all(fx.local_root.join("subdir")).unwrap();
    let err = fx.engine.sync(fx.local_root.join("subdir")).unwrap_err();
    assert!(matches!(err, SyncError::NotAFile(_)));
}

#[test]
fn test_dot_segments_are_normalized() {
    let fx = common::setup_mirror();
    common::write_file(&fx.local_root.join("x/y.txt"), "y", 100);

    let outcome = fx
        .engine
        .sync(fx.local_root.join("x/./z/../y.txt"))
        .unwrap();
    assert_eq!(outcome.mirror(), fx.mirror_root.join("x/y.txt"));
    assert!(fx.mirror_root.join("x/y.txt").exists());
}

/// One failing path does not stop the rest of the batch
#[test]
fn test_batch_sync_is_best_effort() {
    common::init_tracing();
    let fx = common::setup_mirror();
    let missing = fx.local_root.join("missing.txt");
    let present = fx.local_root.join("present.txt");
    common::write_file(&present, "here", 100);

    let report = fx.engine.batch_sync([&missing, &present]);

    assert_eq!(report.results.len(), 2);
    assert!(matches!(
        report.results[0].1,
        Err(SyncError::FileMissing { .. })
    ));
    assert!(report.results[1].1.is_ok());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.all_failed());
    assert!(fx.mirror_root.join("present.txt").exists());
}

#[test]
fn test_open_for_sync_reads_pulled_file() {
    let fx = common::setup_mirror();
    common::write_file(&fx.mirror_root.join("doc.md"), "# title", 100);

    let mut file = fx
        .engine
        .open_for_sync(fx.local_root.join("doc.md"), OpenOptions::new().read(true))
        .unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "# title");
}

#[test]
fn test_open_for_sync_does_not_create_on_failure() {
    let fx = common::setup_mirror();
    let path = fx.local_root.join("new.txt");

    let err = fx
        .engine
        .open_for_sync(&path, OpenOptions::new().write(true).create(true))
        .unwrap_err();
    assert!(matches!(err, SyncError::FileMissing { .. }));
    assert!(!path.exists());
}

#[test]
fn test_open_for_sync_write_handle() {
    let fx = common::setup_mirror();
    let path = fx.local_root.join("log.txt");
    common::write_file(&path, "one\n", 100);

    let mut file = fx
        .engine
        .open_for_sync(&path, OpenOptions::new().append(true))
        .unwrap();
    file.write_all(b"two\n").unwrap();
    drop(file);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    // the mirror got the pre-append copy
    assert_eq!(
        std::fs::read_to_string(fx.mirror_root.join("log.txt")).unwrap(),
        "one\n"
    );
}

#[test]
fn test_read_tabular_for_sync() {
    let fx = common::setup_mirror();
    common::write_file(
        &fx.mirror_root.join("data/scores.tsv"),
        "name\tscore\nada\t3\n",
        100,
    );

    let table = fx
        .engine
        .read_tabular_for_sync(fx.local_root.join("data/scores.tsv"), TabularFormat::Tsv)
        .unwrap();
    assert_eq!(table.headers, vec!["name", "score"]);
    assert_eq!(table.column("name"), Some(vec!["ada"]));
    assert!(fx.local_root.join("data/scores.tsv").exists());
}

#[test]
fn test_read_tabular_reports_parse_errors() {
    let fx = common::setup_mirror();
    let path = fx.local_root.join("bad.csv");
    common::write_file(&path, "a,b\n1\n", 100);

    let err = fx
        .engine
        .read_tabular_for_sync(&path, TabularFormat::Csv)
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Tabular(TabularError::Ragged { .. })
    ));
}

/// Reader that records nothing and always returns a fixed table
#[derive(Debug)]
struct FixedReader;

impl TabularReader for FixedReader {
    fn read(&self, path: &Path, _format: TabularFormat) -> Result<Table, TabularError> {
        Ok(Table {
            headers: vec!["path".to_string()],
            rows: vec![vec![path.display().to_string()]],
        })
    }
}

#[test]
fn test_custom_reader_gets_local_path() {
    let fx = common::setup_mirror();
    let engine = fx.engine.clone().with_tabular_reader(FixedReader);
    let path = fx.local_root.join("sheet.xlsx");
    common::write_file(&path, "binary", 100);

    let table = engine
        .read_tabular_for_sync(&path, TabularFormat::Csv)
        .unwrap();
    assert_eq!(table.rows[0][0], path.display().to_string());
}

#[test]
fn test_custom_reader_not_called_on_failure() {
    let fx = common::setup_mirror();
    let engine = fx.engine.clone().with_tabular_reader(FixedReader);

    let err = engine
        .read_tabular_for_sync(PathBuf::from("/definitely/elsewhere.csv"), TabularFormat::Csv)
        .unwrap_err();
    assert!(matches!(err, SyncError::PathNotMapped { .. }));
}

#[test]
fn test_relative_roots_are_resolved() {
    let fx = common::setup_mirror();
    let cwd = std::env::current_dir().unwrap();
    let local_rel = pathdiff(&fx.local_root, &cwd);
    let engine = MirrorSync::new(MirrorConfig::new(&fx.mirror_root, &local_rel)).unwrap();
    assert!(engine.local_root().is_absolute());
    assert_eq!(
        engine.resolve(fx.local_root.join("a.txt")).unwrap().1,
        fx.mirror_root.join("a.txt")
    );
}

/// `target` expressed relative to `base` via `..` hops
fn pathdiff(target: &Path, base: &Path) -> PathBuf {
    let mut rel = PathBuf::new();
    for _ in base.components().skip(1) {
        rel.push("..");
    }
    rel.join(target.strip_prefix("/").unwrap())
}
