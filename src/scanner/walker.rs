//! Sequential directory walker

use crate::types::CopyError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Callback for reporting enumeration progress
///
/// Arguments:
/// - `files_found`: Total number of files found so far
/// - `bytes_found`: Total bytes found so far
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Regular files found under a root
#[derive(Debug, Clone, Default)]
pub struct FileList {
    pub root: PathBuf,
    /// Paths relative to `root`, sorted
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
    pub scan_duration: Duration,
}

impl FileList {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List every regular file under `root_path`
///
/// Nothing is filtered: hidden files and files named by `.gitignore` are
/// listed like any other. Symlinks are listed when they resolve to a
/// regular file.
///
/// # Errors
/// * `root_path` that is not a directory returns `CopyError::Validation`
/// * Unreadable entries and broken symlinks are logged and skipped
pub fn enumerate_files(
    root_path: &Path,
    on_progress: Option<&ProgressCallback>,
) -> Result<FileList, CopyError> {
    if !root_path.is_dir() {
        return Err(CopyError::Validation(format!(
            "Not a directory: {}",
            root_path.display()
        )));
    }

    let start_time = Instant::now();
    let mut list = FileList {
        root: root_path.to_path_buf(),
        ..FileList::default()
    };

    let walker = ignore::WalkBuilder::new(root_path)
        .standard_filters(false)
        .hidden(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "error during directory traversal, continuing");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        // Follows symlinks; special files and links to directories drop out here
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let relative_path = match entry.path().strip_prefix(root_path) {
            Ok(p) => p.to_path_buf(),
            Err(_) => {
                tracing::warn!(path = %entry.path().display(), "entry outside scan root, skipping");
                continue;
            }
        };

        list.files.push(relative_path);
        list.total_bytes += metadata.len();

        if let Some(callback) = on_progress {
            callback(list.files.len() as u64, list.total_bytes);
        }
    }

    list.files.sort();
    list.scan_duration = start_time.elapsed();
    tracing::debug!(
        root = %root_path.display(),
        files = list.files.len(),
        bytes = list.total_bytes,
        "enumeration finished"
    );

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_enumerate_empty_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let list = enumerate_files(temp_dir.path(), None).expect("enumerate empty dir");
        assert!(list.is_empty());
        assert_eq!(list.total_bytes, 0);
        assert_eq!(list.root, temp_dir.path());
    }

    #[test]
    fn test_enumerate_nested_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root_path = temp_dir.path();

        fs::create_dir_all(root_path.join("a/b")).expect("Failed to create dirs");
        fs::create_dir(root_path.join("c")).expect("Failed to create dir");
        fs::write(root_path.join("a/b/file.txt"), b"File 1").expect("write file1");
        fs::write(root_path.join("c/file2.txt"), b"File 2 content").expect("write file2");

        let list = enumerate_files(root_path, None).expect("enumerate");
        assert_eq!(
            list.files,
            vec![PathBuf::from("a/b/file.txt"), PathBuf::from("c/file2.txt")]
        );
        assert_eq!(list.total_bytes, 6 + 14);
    }

    #[test]
    fn test_enumerate_does_not_filter_hidden_or_ignored() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root_path = temp_dir.path();

        fs::write(root_path.join(".gitignore"), b"*.log\n").expect("write gitignore");
        fs::write(root_path.join("build.log"), b"log").expect("write log");
        fs::write(root_path.join(".hidden"), b"h").expect("write hidden");

        let list = enumerate_files(root_path, None).expect("enumerate");
        assert!(list.files.contains(&PathBuf::from("build.log")));
        assert!(list.files.contains(&PathBuf::from(".hidden")));
        assert!(list.files.contains(&PathBuf::from(".gitignore")));
    }

    #[test]
    #[cfg(unix)]
    fn test_enumerate_skips_broken_symlink() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root_path = temp_dir.path();

        fs::write(root_path.join("target.txt"), b"Target content").expect("write target");
        std::os::unix::fs::symlink(root_path.join("target.txt"), root_path.join("link.txt"))
            .expect("create symlink");
        std::os::unix::fs::symlink(root_path.join("nonexistent"), root_path.join("broken.txt"))
            .expect("create broken symlink");

        let list = enumerate_files(root_path, None).expect("enumerate");
        assert!(list.files.contains(&PathBuf::from("link.txt")));
        assert!(!list.files.contains(&PathBuf::from("broken.txt")));
    }

    #[test]
    fn test_enumerate_reports_progress() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, size) in [("file1.txt", 100), ("file2.txt", 200), ("file3.txt", 300)] {
            fs::write(temp_dir.path().join(name), vec![b'x'; size]).expect("write file");
        }

        let last_bytes = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last_bytes);
        let callback: ProgressCallback = Box::new(move |_files, bytes| {
            seen.store(bytes, Ordering::Relaxed);
        });

        let list = enumerate_files(temp_dir.path(), Some(&callback)).expect("enumerate");
        assert_eq!(list.len(), 3);
        assert_eq!(last_bytes.load(Ordering::Relaxed), 600);
    }

    #[test]
    fn test_enumerate_rejects_file_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = temp_dir.path().join("single.txt");
        fs::write(&file, b"x").expect("write file");

        let err = enumerate_files(&file, None).expect_err("file root must fail");
        assert!(err.is_validation_error());
    }
}
