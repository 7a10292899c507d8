//! Filesystem seam for every call that reads sizes or mutates the tree

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

/// Copy buffer size
const COPY_BUFFER_SIZE: usize = 128 * 1024;

/// Filesystem operations used by the executors
///
/// `StdFileOps` is the production implementation. Tests wrap it to force
/// failures at a chosen step.
pub trait FileOps: Send + Sync {
    /// Metadata, following symlinks
    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata>;

    /// Metadata of `path` itself, not following a final symlink
    fn symlink_metadata(&self, path: &Path) -> io::Result<fs::Metadata>;

    /// Whether anything (including a dangling symlink) occupies `path`
    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Stream `from` into a freshly truncated `to`, flushed to disk.
    ///
    /// `on_bytes` receives the running total after each chunk.
    fn copy_contents(&self, from: &Path, to: &Path, on_bytes: &mut dyn FnMut(u64))
        -> io::Result<u64>;

    /// Apply the permission bits of `from` to `to`
    fn copy_permissions(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// `std::fs` backed implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        fs::metadata(path)
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        fs::symlink_metadata(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn copy_contents(
        &self,
        from: &Path,
        to: &Path,
        on_bytes: &mut dyn FnMut(u64),
    ) -> io::Result<u64> {
        let mut src_file = File::open(from)?;
        let mut dest_file = File::create(to)?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = match src_file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            dest_file.write_all(&buffer[..bytes_read])?;
            total_bytes += bytes_read as u64;
            on_bytes(total_bytes);
        }

        // Data must be on disk before the caller commits or verifies
        dest_file.sync_all()?;

        Ok(total_bytes)
    }

    fn copy_permissions(&self, from: &Path, to: &Path) -> io::Result<()> {
        let permissions = fs::metadata(from)?.permissions();
        fs::set_permissions(to, permissions)
    }
}
