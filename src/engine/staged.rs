//! Staged copy: rename-based backup, copy, verify, rollback on failure
//!
//! ```text
//! CheckOverwrite -> SaveOriginalTimestamps -> RenameTargetToBackup
//!   -> CopySourceToTarget -> VerifyCopy -> RemoveBackup -> Success
//!                   \______________\______-> Rollback
//! ```
//!
//! The existing target is moved aside with a rename, which is O(1) on the
//! same volume no matter how large the file is. Once that rename has run,
//! every remaining step runs to completion: the target path is empty until
//! the copy lands or the backup is renamed back.

use super::{
    check_overwrite, ensure_parent, sibling_with_suffix, CopyContext, CopyEngine,
    ExecutionReport,
};
use crate::platform::FileTimestamps;
use crate::types::CopyError;
use std::path::{Path, PathBuf};

pub struct StagedCopyExecutor<'a> {
    engine: &'a CopyEngine,
}

/// What rollback needs to restore the original target
struct Backup {
    path: PathBuf,
    original_times: Option<FileTimestamps>,
}

impl<'a> StagedCopyExecutor<'a> {
    pub fn new(engine: &'a CopyEngine) -> Self {
        Self { engine }
    }

    pub(crate) fn run(
        &self,
        ctx: &mut CopyContext<'_>,
        source: &Path,
        target: &Path,
        overwrite: bool,
        file_size: u64,
    ) -> Result<ExecutionReport, CopyError> {
        let ops = self.engine.ops.as_ref();

        // CheckOverwrite
        let target_exists = check_overwrite(ctx, ops, target, overwrite)?;

        let backup = if target_exists {
            Some(self.move_target_aside(ctx, target)?)
        } else {
            ensure_parent(ctx, ops, source, target)?;
            None
        };

        // CopySourceToTarget
        ctx.step(&format!("copy {} -> {}", source.display(), target.display()));
        let bytes_copied = if ctx.is_dry_run() {
            file_size
        } else {
            match self.copy_into_target(ctx, source, target, file_size) {
                Ok(bytes) => bytes,
                Err(cause) => return Err(self.rollback(ctx, target, backup, cause)),
            }
        };

        // VerifyCopy
        let verifier = &self.engine.verifier;
        if verifier.is_enabled() {
            ctx.step(&format!("verify {}", target.display()));
            if !ctx.is_dry_run() {
                if let Err(cause) = verifier.check(source, target) {
                    return Err(self.rollback(ctx, target, backup, cause));
                }
            }
        }

        // RemoveBackup
        let leftover_backup = match backup {
            Some(backup) => self.remove_backup(ctx, backup.path),
            None => None,
        };

        Ok(ExecutionReport {
            bytes_copied,
            verification_passed: true,
            leftover_backup,
        })
    }

    /// SaveOriginalTimestamps + RenameTargetToBackup
    ///
    /// A failed rename is critical but leaves the target untouched.
    fn move_target_aside(
        &self,
        ctx: &mut CopyContext<'_>,
        target: &Path,
    ) -> Result<Backup, CopyError> {
        ctx.step(&format!("save timestamps of {}", target.display()));
        let original_times = if ctx.is_dry_run() {
            None
        } else {
            match self.engine.timestamps.get_timestamps(target) {
                Ok(times) => Some(times),
                Err(e) => {
                    tracing::warn!(target = %target.display(), error = %e, "could not read original timestamps");
                    ctx.log(&format!(
                        "warning: original timestamps unavailable, rollback will not restore them: {}",
                        e
                    ));
                    None
                }
            }
        };

        let backup_path = sibling_with_suffix(target, "backup");
        ctx.step(&format!(
            "rename {} -> {}",
            target.display(),
            backup_path.display()
        ));
        if !ctx.is_dry_run() {
            self.engine
                .ops
                .rename(target, &backup_path)
                .map_err(|source| CopyError::RenameFailure {
                    target: target.to_path_buf(),
                    source,
                })?;
        }

        Ok(Backup {
            path: backup_path,
            original_times,
        })
    }

    fn copy_into_target(
        &self,
        ctx: &mut CopyContext<'_>,
        source: &Path,
        target: &Path,
        file_size: u64,
    ) -> Result<u64, CopyError> {
        let ops = self.engine.ops.as_ref();
        let copy_failure = |e: std::io::Error| CopyError::CopyFailure {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: e,
        };

        let mut progress = ctx.progress_for(file_size);
        let copied = ops
            .copy_contents(source, target, &mut |bytes| progress.tick(bytes))
            .map_err(copy_failure)?;
        progress.finish(copied);

        self.engine
            .timestamps
            .copy_timestamps(source, target)
            .and_then(|_| ops.copy_permissions(source, target))
            .map_err(copy_failure)?;

        Ok(copied)
    }

    /// RemoveBackup; failure here does not undo the successful copy
    fn remove_backup(&self, ctx: &mut CopyContext<'_>, backup_path: PathBuf) -> Option<PathBuf> {
        ctx.step(&format!("remove backup {}", backup_path.display()));
        if ctx.is_dry_run() {
            return None;
        }
        match self.engine.ops.remove_file(&backup_path) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(backup = %backup_path.display(), error = %e, "could not remove backup");
                ctx.log(&format!(
                    "warning: copy succeeded but backup {} could not be removed: {}",
                    backup_path.display(),
                    e
                ));
                Some(backup_path)
            }
        }
    }

    /// Restore the pre-call state of `target`
    ///
    /// Returns `cause` when the target was restored, or a critical
    /// `RollbackFailure` naming the backup when it could not be.
    fn rollback(
        &self,
        ctx: &mut CopyContext<'_>,
        target: &Path,
        backup: Option<Backup>,
        cause: CopyError,
    ) -> CopyError {
        let ops = self.engine.ops.as_ref();
        ctx.log(&format!("{}; rolling back", cause));

        if ops.exists(target) {
            ctx.step(&format!("remove partial {}", target.display()));
            if let Err(e) = ops.remove_file(target) {
                tracing::warn!(target = %target.display(), error = %e, "could not remove partial target");
                ctx.log(&format!("warning: could not remove partial target: {}", e));
            }
        }

        let Some(backup) = backup else {
            ctx.log("rollback complete, target did not exist before");
            return cause;
        };

        if !ops.exists(&backup.path) {
            return CopyError::RollbackFailure {
                target: target.to_path_buf(),
                backup: backup.path,
                reason: format!("{}; backup file has disappeared", cause),
            };
        }

        ctx.step(&format!(
            "rename {} -> {}",
            backup.path.display(),
            target.display()
        ));
        if let Err(e) = ops.rename(&backup.path, target) {
            return CopyError::RollbackFailure {
                target: target.to_path_buf(),
                backup: backup.path,
                reason: format!("{}; restoring backup failed: {}", cause, e),
            };
        }

        if let Some(times) = &backup.original_times {
            ctx.step(&format!("restore timestamps of {}", target.display()));
            if let Err(e) = self.engine.timestamps.restore_timestamps(target, times) {
                tracing::warn!(target = %target.display(), error = %e, "could not restore timestamps");
                ctx.log(&format!("warning: original timestamps not restored: {}", e));
            }
        }

        ctx.log("rollback complete, original target restored");
        cause
    }
}
