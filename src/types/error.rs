//! Error types for stagecopy

use std::path::PathBuf;
use thiserror::Error;

/// Error types for copy-engine operations
///
/// Every failure a single `copy_file` call can hit maps to exactly one
/// variant. `RenameFailure` and `RollbackFailure` are the two critical kinds
/// and render with a `CRITICAL:` prefix.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error (logic checks)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source path does not exist
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    /// Source path exists but is not a regular file
    #[error("Source is not a regular file: {path}")]
    SourceNotFile { path: PathBuf },

    /// Target path is taken by a directory
    #[error("Target is a directory: {path}")]
    TargetNotFile { path: PathBuf },

    /// Target exists and the caller forbade overwriting it
    #[error("target exists, overwrite disabled: {path}")]
    OverwriteDisabled { path: PathBuf },

    /// Moving the existing target aside failed; nothing was changed
    #[error(
        "CRITICAL: could not move existing target {target} to backup: {source}. \
         Target is untouched; check whether the file is locked or the share is disconnected"
    )]
    RenameFailure {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing source bytes to the target failed
    #[error("Copy failed from {from} to {to}: {source}")]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Post-copy existence/size check failed
    #[error("Verification failed for {path}: expected {expected} bytes, found {}", describe_actual(.actual))]
    VerificationFailure {
        path: PathBuf,
        expected: u64,
        actual: Option<u64>,
    },

    /// Restoring the backup failed; original content lives only in `backup`
    #[error(
        "CRITICAL: rollback failed, original content of {target} is preserved at {backup}: {reason}. \
         Restore it manually"
    )]
    RollbackFailure {
        target: PathBuf,
        backup: PathBuf,
        reason: String,
    },
}

fn describe_actual(actual: &Option<u64>) -> String {
    match actual {
        Some(size) => format!("{} bytes", size),
        None => "no file".to_string(),
    }
}

/// Discriminant of [`CopyError`], cheap to copy into a `CopyResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum CopyErrorKind {
    Io,
    Config,
    Validation,
    SourceMissing,
    SourceNotFile,
    TargetNotFile,
    OverwriteDisabled,
    RenameFailure,
    CopyFailure,
    VerificationFailure,
    RollbackFailure,
}

impl CopyErrorKind {
    /// Kinds that must be surfaced prominently rather than counted.
    pub fn is_critical(self) -> bool {
        matches!(self, CopyErrorKind::RenameFailure | CopyErrorKind::RollbackFailure)
    }

    /// Short human label used in summaries.
    pub fn label(self) -> &'static str {
        match self {
            CopyErrorKind::Io => "I/O error",
            CopyErrorKind::Config => "Configuration error",
            CopyErrorKind::Validation => "Validation error",
            CopyErrorKind::SourceMissing => "Source missing",
            CopyErrorKind::SourceNotFile => "Source not a file",
            CopyErrorKind::TargetNotFile => "Target is a directory",
            CopyErrorKind::OverwriteDisabled => "Skipped (exists)",
            CopyErrorKind::RenameFailure => "Backup rename failed",
            CopyErrorKind::CopyFailure => "Copy failed",
            CopyErrorKind::VerificationFailure => "Verification failed",
            CopyErrorKind::RollbackFailure => "Rollback failed",
        }
    }
}

impl CopyError {
    pub fn kind(&self) -> CopyErrorKind {
        match self {
            CopyError::Io(_) => CopyErrorKind::Io,
            CopyError::Config(_) => CopyErrorKind::Config,
            CopyError::Validation(_) => CopyErrorKind::Validation,
            CopyError::SourceMissing { .. } => CopyErrorKind::SourceMissing,
            CopyError::SourceNotFile { .. } => CopyErrorKind::SourceNotFile,
            CopyError::TargetNotFile { .. } => CopyErrorKind::TargetNotFile,
            CopyError::OverwriteDisabled { .. } => CopyErrorKind::OverwriteDisabled,
            CopyError::RenameFailure { .. } => CopyErrorKind::RenameFailure,
            CopyError::CopyFailure { .. } => CopyErrorKind::CopyFailure,
            CopyError::VerificationFailure { .. } => CopyErrorKind::VerificationFailure,
            CopyError::RollbackFailure { .. } => CopyErrorKind::RollbackFailure,
        }
    }

    /// Check if this error is one of the two critical kinds
    pub fn is_critical(&self) -> bool {
        self.kind().is_critical()
    }

    /// Check if this error is a precondition failure (nothing was attempted)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CopyError::SourceMissing { .. }
                | CopyError::SourceNotFile { .. }
                | CopyError::TargetNotFile { .. }
                | CopyError::OverwriteDisabled { .. }
        )
    }

    /// Check if this error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, CopyError::Validation(_) | CopyError::Config(_))
    }

    /// Check if this error triggers the staged rollback path
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self,
            CopyError::CopyFailure { .. } | CopyError::VerificationFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_automatic_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let copy_error: CopyError = io_error.into();

        assert!(matches!(copy_error, CopyError::Io(_)));
        assert!(copy_error.to_string().contains("IO error"));
        assert_eq!(copy_error.kind(), CopyErrorKind::Io);
    }

    #[test]
    fn test_overwrite_disabled_message() {
        let error = CopyError::OverwriteDisabled {
            path: PathBuf::from("out/report.pdf"),
        };
        assert!(error
            .to_string()
            .contains("target exists, overwrite disabled"));
        assert!(error.is_precondition());
        assert!(!error.is_critical());
    }

    #[test]
    fn test_directory_target_is_a_precondition() {
        let error = CopyError::TargetNotFile {
            path: PathBuf::from("out/photos"),
        };
        assert_eq!(error.kind(), CopyErrorKind::TargetNotFile);
        assert!(error.is_precondition());
        assert!(!error.triggers_rollback());
        assert!(!error.is_critical());
    }

    #[test]
    fn test_rename_failure_is_critical_and_prefixed() {
        let error = CopyError::RenameFailure {
            target: PathBuf::from("/mnt/share/big.iso"),
            source: IoError::new(ErrorKind::PermissionDenied, "sharing violation"),
        };
        let message = error.to_string();
        assert!(message.starts_with("CRITICAL"));
        assert!(message.contains("big.iso"));
        assert!(message.contains("locked"));
        assert!(error.is_critical());
        assert!(!error.triggers_rollback());
    }

    #[test]
    fn test_rollback_failure_surfaces_backup_path() {
        let error = CopyError::RollbackFailure {
            target: PathBuf::from("data.db"),
            backup: PathBuf::from("data.db.backup_1a2b3c4d"),
            reason: "access denied".to_string(),
        };
        let message = error.to_string();
        assert!(message.starts_with("CRITICAL"));
        assert!(message.contains("data.db.backup_1a2b3c4d"));
        assert!(error.is_critical());
    }

    #[test]
    fn test_verification_failure_describes_missing_target() {
        let error = CopyError::VerificationFailure {
            path: PathBuf::from("a.bin"),
            expected: 10,
            actual: None,
        };
        assert!(error.to_string().contains("no file"));
        assert!(error.triggers_rollback());

        let error = CopyError::VerificationFailure {
            path: PathBuf::from("a.bin"),
            expected: 10,
            actual: Some(4),
        };
        assert!(error.to_string().contains("found 4 bytes"));
    }

    #[test]
    fn test_only_two_kinds_are_critical() {
        let critical: Vec<_> = [
            CopyErrorKind::Io,
            CopyErrorKind::Config,
            CopyErrorKind::Validation,
            CopyErrorKind::SourceMissing,
            CopyErrorKind::SourceNotFile,
            CopyErrorKind::TargetNotFile,
            CopyErrorKind::OverwriteDisabled,
            CopyErrorKind::RenameFailure,
            CopyErrorKind::CopyFailure,
            CopyErrorKind::VerificationFailure,
            CopyErrorKind::RollbackFailure,
        ]
        .into_iter()
        .filter(|kind| kind.is_critical())
        .collect();

        assert_eq!(
            critical,
            vec![CopyErrorKind::RenameFailure, CopyErrorKind::RollbackFailure]
        );
    }

    #[test]
    fn test_result_propagation() {
        fn inner_function() -> Result<(), CopyError> {
            Err(CopyError::Config("test error".to_string()))
        }

        fn outer_function() -> Result<(), CopyError> {
            inner_function()?;
            Ok(())
        }

        let result = outer_function();
        assert!(matches!(result, Err(CopyError::Config(_))));
    }
}
