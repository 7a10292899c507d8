//! CopyResult - Outcome of one `copy_file` call

use super::{CopyError, CopyErrorKind, CopyStrategy};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a single file copy
///
/// Created once per `copy_file` call and handed to the caller. Failures are
/// carried as data: `error_message` holds the rendered error (prefixed with
/// `CRITICAL:` for the critical kinds) and `error_kind` its discriminant.
#[derive(Debug, Clone, Serialize)]
pub struct CopyResult {
    /// Sequence number issued by the session for this file
    pub sequence: u64,

    pub success: bool,

    pub strategy: CopyStrategy,

    pub source: PathBuf,

    pub target: PathBuf,

    /// Source size at the time the strategy was chosen
    pub file_size: u64,

    /// Wall-clock time spent inside the engine
    pub duration: Duration,

    /// Bytes written to the target (simulated in dry-run)
    pub bytes_copied: u64,

    /// Empty on success
    pub error_message: String,

    pub error_kind: Option<CopyErrorKind>,

    /// `true` when the size check passed, verification is disabled, or dry-run
    pub verification_passed: bool,

    /// Backup left on disk that needs attention (rollback failure, or a
    /// backup that could not be removed after a successful copy)
    pub backup_path: Option<PathBuf>,

    pub dry_run: bool,
}

impl CopyResult {
    pub(crate) fn new(
        sequence: u64,
        strategy: CopyStrategy,
        source: PathBuf,
        target: PathBuf,
        file_size: u64,
        dry_run: bool,
    ) -> Self {
        Self {
            sequence,
            success: false,
            strategy,
            source,
            target,
            file_size,
            duration: Duration::ZERO,
            bytes_copied: 0,
            error_message: String::new(),
            error_kind: None,
            verification_passed: false,
            backup_path: None,
            dry_run,
        }
    }

    /// Record a failure on this result
    pub(crate) fn fail(&mut self, error: &CopyError) {
        self.success = false;
        self.error_message = error.to_string();
        self.error_kind = Some(error.kind());
        if let CopyError::RollbackFailure { backup, .. } = error {
            self.backup_path = Some(backup.clone());
        }
    }

    /// Whether the failure must be surfaced prominently
    pub fn is_critical(&self) -> bool {
        self.error_kind.is_some_and(CopyErrorKind::is_critical)
    }

    /// Whether the file was skipped because the target exists and overwrite is off
    pub fn is_skipped(&self) -> bool {
        self.error_kind == Some(CopyErrorKind::OverwriteDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    fn blank() -> CopyResult {
        CopyResult::new(
            1,
            CopyStrategy::Staged,
            PathBuf::from("src.bin"),
            PathBuf::from("dst.bin"),
            42,
            false,
        )
    }

    #[test]
    fn test_fail_records_kind_and_message() {
        let mut result = blank();
        result.fail(&CopyError::RenameFailure {
            target: PathBuf::from("dst.bin"),
            source: IoError::new(ErrorKind::PermissionDenied, "locked"),
        });

        assert!(!result.success);
        assert!(result.error_message.starts_with("CRITICAL"));
        assert!(result.is_critical());
        assert!(!result.is_skipped());
        assert!(result.backup_path.is_none());
    }

    #[test]
    fn test_fail_with_rollback_failure_keeps_backup_path() {
        let mut result = blank();
        result.fail(&CopyError::RollbackFailure {
            target: PathBuf::from("dst.bin"),
            backup: PathBuf::from("dst.bin.backup_0badf00d"),
            reason: "denied".to_string(),
        });

        assert_eq!(
            result.backup_path,
            Some(PathBuf::from("dst.bin.backup_0badf00d"))
        );
        assert!(result.is_critical());
    }

    #[test]
    fn test_overwrite_disabled_is_a_skip() {
        let mut result = blank();
        result.fail(&CopyError::OverwriteDisabled {
            path: PathBuf::from("dst.bin"),
        });
        assert!(result.is_skipped());
        assert!(!result.is_critical());
    }
}
