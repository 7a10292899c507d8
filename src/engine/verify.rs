//! Post-copy verification
//!
//! The check is existence plus size equality only; content is not hashed,
//! so a same-size corruption passes.

use crate::platform::FileOps;
use crate::types::CopyError;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct VerificationEngine {
    enabled: bool,
    ops: Arc<dyn FileOps>,
}

impl VerificationEngine {
    pub fn new(enabled: bool, ops: Arc<dyn FileOps>) -> Self {
        Self { enabled, ops }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` if the target passes, or verification is disabled
    pub fn verify(&self, source: &Path, target: &Path) -> bool {
        self.check(source, target).is_ok()
    }

    /// Like [`verify`](Self::verify) but explains the mismatch
    pub fn check(&self, source: &Path, target: &Path) -> Result<(), CopyError> {
        if !self.enabled {
            return Ok(());
        }

        let expected = match self.ops.metadata(source) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CopyError::SourceMissing {
                    path: source.to_path_buf(),
                })
            }
            Err(e) => return Err(CopyError::Io(e)),
        };
        let actual = self.ops.metadata(target).ok().map(|m| m.len());

        if actual == Some(expected) {
            Ok(())
        } else {
            Err(CopyError::VerificationFailure {
                path: target.to_path_buf(),
                expected,
                actual,
            })
        }
    }
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEngine")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StdFileOps;
    use std::fs;
    use tempfile::TempDir;

    fn engine(enabled: bool) -> VerificationEngine {
        VerificationEngine::new(enabled, Arc::new(StdFileOps))
    }

    #[test]
    fn test_same_size_passes() {
        let dir = TempDir::new().expect("create temp dir");
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, b"12345").expect("write src");
        fs::write(&dst, b"abcde").expect("write dst");

        // Size-only: different bytes of equal length pass
        assert!(engine(true).verify(&src, &dst));
    }

    #[test]
    fn test_size_mismatch_fails() {
        let dir = TempDir::new().expect("create temp dir");
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, b"12345").expect("write src");
        fs::write(&dst, b"123").expect("write dst");

        let err = engine(true).check(&src, &dst).expect_err("should fail");
        assert!(matches!(
            err,
            CopyError::VerificationFailure {
                expected: 5,
                actual: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_target_fails() {
        let dir = TempDir::new().expect("create temp dir");
        let src = dir.path().join("a");
        fs::write(&src, b"12345").expect("write src");

        let err = engine(true)
            .check(&src, &dir.path().join("missing"))
            .expect_err("should fail");
        assert!(matches!(
            err,
            CopyError::VerificationFailure { actual: None, .. }
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_source_is_not_reported_missing() {
        let dir = TempDir::new().expect("create temp dir");
        let file = dir.path().join("plain");
        fs::write(&file, b"12345").expect("write file");
        fs::write(dir.path().join("b"), b"12345").expect("write target");

        // ENOTDIR, not ENOENT
        let err = engine(true)
            .check(&file.join("child"), &dir.path().join("b"))
            .expect_err("should fail");
        assert!(matches!(err, CopyError::Io(_)), "got {:?}", err);
    }

    #[test]
    fn test_disabled_always_passes() {
        let dir = TempDir::new().expect("create temp dir");
        let src = dir.path().join("a");
        fs::write(&src, b"12345").expect("write src");

        let verifier = engine(false);
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(&src, &dir.path().join("missing")));
    }
}
