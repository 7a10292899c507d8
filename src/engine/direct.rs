//! Direct copy: write-then-rename for small local files
//!
//! 1. Stream the source into a sibling `.part_xxxxxxxx` file
//! 2. Apply timestamps and permissions to it
//! 3. Verify it
//! 4. Atomic rename over the target
//!
//! Any failure removes the partial file, so a pre-existing target is never
//! touched unless the final rename succeeds.

use super::{
    check_overwrite, ensure_parent, sibling_with_suffix, CopyContext, CopyEngine,
    ExecutionReport,
};
use crate::types::CopyError;
use std::path::Path;

pub struct DirectCopyExecutor<'a> {
    engine: &'a CopyEngine,
}

impl<'a> DirectCopyExecutor<'a> {
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

        check_overwrite(ctx, ops, target, overwrite)?;
        ensure_parent(ctx, ops, source, target)?;

        let part_path = sibling_with_suffix(target, "part");
        let copy_failure = |e: std::io::Error| CopyError::CopyFailure {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: e,
        };

        ctx.step(&format!(
            "copy {} -> {}",
            source.display(),
            part_path.display()
        ));
        let bytes_copied = if ctx.is_dry_run() {
            file_size
        } else {
            let mut progress = ctx.progress_for(file_size);
            let copied = ops
                .copy_contents(source, &part_path, &mut |bytes| progress.tick(bytes))
                .map_err(copy_failure);
            let copied = self.discard_on_error(ctx, &part_path, copied)?;
            progress.finish(copied);
            copied
        };

        ctx.step(&format!(
            "copy timestamps and permissions to {}",
            part_path.display()
        ));
        if !ctx.is_dry_run() {
            let applied = self
                .engine
                .timestamps
                .copy_timestamps(source, &part_path)
                .and_then(|_| ops.copy_permissions(source, &part_path))
                .map_err(copy_failure);
            self.discard_on_error(ctx, &part_path, applied)?;
        }

        let verifier = &self.engine.verifier;
        if verifier.is_enabled() {
            ctx.step(&format!("verify {}", part_path.display()));
            if !ctx.is_dry_run() {
                let checked = verifier.check(source, &part_path);
                self.discard_on_error(ctx, &part_path, checked)?;
            }
        }

        ctx.step(&format!(
            "rename {} -> {}",
            part_path.display(),
            target.display()
        ));
        if !ctx.is_dry_run() {
            let renamed = ops.rename(&part_path, target).map_err(copy_failure);
            self.discard_on_error(ctx, &part_path, renamed)?;
        }

        Ok(ExecutionReport {
            bytes_copied,
            verification_passed: true,
            leftover_backup: None,
        })
    }

    /// Remove the partial file when `outcome` is an error
    fn discard_on_error<T>(
        &self,
        ctx: &mut CopyContext<'_>,
        part_path: &Path,
        outcome: Result<T, CopyError>,
    ) -> Result<T, CopyError> {
        if outcome.is_err() {
            let ops = self.engine.ops.as_ref();
            if ops.exists(part_path) {
                ctx.log(&format!("remove partial {}", part_path.display()));
                if let Err(e) = ops.remove_file(part_path) {
                    tracing::warn!(path = %part_path.display(), error = %e, "could not remove partial file");
                    ctx.log(&format!(
                        "warning: partial file {} left behind: {}",
                        part_path.display(),
                        e
                    ));
                }
            }
        }
        outcome
    }
}
