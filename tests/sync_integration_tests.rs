//! End-to-end copy command integration tests.
//!
//! Basic copy, overwrite behavior, dry-run safety, parallel runs and the
//! operation log.

use stagecopy::commands::sync::run;
use stagecopy::Config;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config_for(source: &Path, destination: &Path) -> Config {
    Config {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        json_summary: true,
        ..Config::default()
    }
}

#[test]
fn test_basic_copy_empty_destination() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");

    fs::create_dir_all(src.path().join("nested")).expect("create nested source dir");
    fs::write(src.path().join("root.txt"), b"root-content").expect("write root source file");
    fs::write(src.path().join("nested/inner.txt"), b"inner-content")
        .expect("write nested source file");

    run(config_for(src.path(), dst.path())).expect("copy run should succeed");

    assert_eq!(
        fs::read(dst.path().join("root.txt")).expect("read copied root file"),
        b"root-content"
    );
    assert_eq!(
        fs::read(dst.path().join("nested/inner.txt")).expect("read copied nested file"),
        b"inner-content"
    );
}

#[test]
fn test_copy_replaces_existing_files_through_staging() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");

    fs::write(src.path().join("same.txt"), b"new-data").expect("write source version");
    fs::write(dst.path().join("same.txt"), b"old").expect("write destination version");

    let config = Config {
        strategy_threshold: 1,
        ..config_for(src.path(), dst.path())
    };
    run(config).expect("copy run should succeed");

    assert_eq!(
        fs::read(dst.path().join("same.txt")).expect("read updated destination file"),
        b"new-data"
    );
    let names: Vec<String> = fs::read_dir(dst.path())
        .expect("list destination")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["same.txt".to_string()]);
}

#[test]
fn test_dry_run_makes_no_changes() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");

    fs::write(src.path().join("new.txt"), b"new").expect("write source file");
    fs::write(src.path().join("same.txt"), b"new-data").expect("write source version");
    fs::write(dst.path().join("same.txt"), b"old").expect("write destination version");

    let config = Config {
        dry_run: true,
        ..config_for(src.path(), dst.path())
    };
    run(config).expect("dry run should succeed");

    assert!(!dst.path().join("new.txt").exists());
    assert_eq!(
        fs::read(dst.path().join("same.txt")).expect("read destination file"),
        b"old"
    );
}

#[test]
fn test_single_file_source() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");
    let file = src.path().join("movie.mkv");
    fs::write(&file, vec![1u8; 4096]).expect("write source file");

    run(config_for(&file, dst.path())).expect("copy run should succeed");
    assert_eq!(
        fs::metadata(dst.path().join("movie.mkv"))
            .expect("copied file metadata")
            .len(),
        4096
    );
}

#[test]
fn test_failures_are_reported_as_error() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");

    fs::write(src.path().join("ok.txt"), b"ok").expect("write source file");
    fs::write(src.path().join("blocked.txt"), b"blocked").expect("write source file");
    // A directory in the way of a file target makes the copy fail
    fs::create_dir_all(dst.path().join("blocked.txt/inner")).expect("create blocking dir");

    let err = run(config_for(src.path(), dst.path())).expect_err("a failed file fails the run");
    assert!(err.to_string().contains("1 of 2"));
    assert_eq!(
        fs::read(dst.path().join("ok.txt")).expect("read copied file"),
        b"ok"
    );
    assert!(dst.path().join("blocked.txt/inner").is_dir());
}

#[test]
fn test_parallel_run_writes_one_log_line_group_per_file() {
    let src = TempDir::new().expect("create src tempdir");
    let dst = TempDir::new().expect("create dst tempdir");
    let logs = TempDir::new().expect("create log tempdir");

    for i in 0..12 {
        fs::write(src.path().join(format!("f{:02}.txt", i)), format!("file {}", i))
            .expect("write source file");
    }

    let log_path = logs.path().join("copy.log");
    let config = Config {
        threads: 4,
        log_file: Some(log_path.clone()),
        ..config_for(src.path(), dst.path())
    };
    run(config).expect("parallel run should succeed");

    for i in 0..12 {
        assert_eq!(
            fs::read_to_string(dst.path().join(format!("f{:02}.txt", i)))
                .expect("read copied file"),
            format!("file {}", i)
        );
    }

    let log = fs::read_to_string(&log_path).expect("read log");
    for seq in 1..=12 {
        assert!(log.contains(&format!("[#{:06}]", seq)), "missing #{}", seq);
    }
    assert!(log.contains("12 succeeded, 0 failed"));
}
