//! Single-file copy engine
//!
//! `CopyEngine::copy_file` classifies both paths, sizes the source, picks a
//! [`CopyStrategy`] and hands the file to the matching executor. Every
//! outcome, including the critical ones, comes back as a [`CopyResult`];
//! nothing is thrown across the call.

mod direct;
mod staged;
pub mod strategy;
pub mod verify;

pub use direct::DirectCopyExecutor;
pub use staged::StagedCopyExecutor;
pub use strategy::{select_strategy, DEFAULT_STRATEGY_THRESHOLD};
pub use verify::VerificationEngine;

use crate::platform::{
    DriveClassifier, FileOps, NativeDriveClassifier, NativeTimestamps, StdFileOps,
    TimestampAccessor,
};
use crate::session::OperationSession;
use crate::types::{CopyError, CopyResult, CopyStrategy};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Minimum spacing between byte-progress callbacks
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Byte-progress callback: `(sequence, bytes_so_far, total_bytes)`
pub type ByteProgress = Arc<dyn Fn(u64, u64, u64) + Send + Sync>;

/// Settings the engine consumes from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Files at or above this size use the staged strategy
    pub strategy_threshold: u64,

    /// Run the post-copy existence/size check
    pub verification_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strategy_threshold: DEFAULT_STRATEGY_THRESHOLD,
            verification_enabled: true,
        }
    }
}

/// Per-call state handed to the executors
///
/// Carries the sequence number, the dry-run flag and the log line sink for
/// one `copy_file` call.
pub struct CopyContext<'a> {
    sequence: u64,
    dry_run: bool,
    log: &'a mut dyn FnMut(&str),
    progress: Option<ByteProgress>,
}

impl<'a> CopyContext<'a> {
    pub fn new(sequence: u64, dry_run: bool, log: &'a mut dyn FnMut(&str)) -> Self {
        Self {
            sequence,
            dry_run,
            log,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ByteProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub(crate) fn log(&mut self, message: &str) {
        (self.log)(message);
    }

    /// Log a step the same way in both modes; dry-run prefixes it
    pub(crate) fn step(&mut self, action: &str) {
        if self.dry_run {
            let line = format!("[DRY RUN] would {}", action);
            (self.log)(&line);
        } else {
            (self.log)(action);
        }
    }

    pub(crate) fn progress_for(&self, total: u64) -> ProgressThrottle {
        ProgressThrottle::new(self.progress.clone(), self.sequence, total)
    }
}

/// Rate-limits byte-progress callbacks
pub(crate) struct ProgressThrottle {
    callback: Option<ByteProgress>,
    sequence: u64,
    total: u64,
    last: Option<Instant>,
}

impl ProgressThrottle {
    fn new(callback: Option<ByteProgress>, sequence: u64, total: u64) -> Self {
        Self {
            callback,
            sequence,
            total,
            last: None,
        }
    }

    pub(crate) fn tick(&mut self, bytes: u64) {
        if self.callback.is_none() {
            return;
        }
        let now = Instant::now();
        let due = self
            .last
            .map_or(true, |last| now.duration_since(last) >= PROGRESS_INTERVAL);
        if due {
            self.emit(bytes);
            self.last = Some(now);
        }
    }

    pub(crate) fn finish(&mut self, bytes: u64) {
        self.emit(bytes);
    }

    /// A panicking callback is dropped for the rest of the file; the copy goes on
    fn emit(&mut self, bytes: u64) {
        let Some(callback) = &self.callback else {
            return;
        };
        let (sequence, total) = (self.sequence, self.total);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(sequence, bytes, total)));
        if outcome.is_err() {
            tracing::warn!(
                sequence,
                "byte-progress callback panicked, progress disabled for this file"
            );
            self.callback = None;
        }
    }
}

/// What an executor reports on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionReport {
    pub bytes_copied: u64,
    pub verification_passed: bool,
    /// Backup that could not be removed after a successful copy
    pub leftover_backup: Option<PathBuf>,
}

/// The copy engine
///
/// Cheap to clone; capabilities are shared behind `Arc`s so one engine can
/// serve several worker threads working on disjoint targets.
#[derive(Clone)]
pub struct CopyEngine {
    settings: EngineSettings,
    classifier: Arc<dyn DriveClassifier>,
    timestamps: Arc<dyn TimestampAccessor>,
    ops: Arc<dyn FileOps>,
    verifier: VerificationEngine,
}

impl CopyEngine {
    /// Engine wired to the native capabilities of this OS
    pub fn new(settings: EngineSettings) -> Self {
        let ops: Arc<dyn FileOps> = Arc::new(StdFileOps);
        Self {
            settings,
            classifier: Arc::new(NativeDriveClassifier::new()),
            timestamps: Arc::new(NativeTimestamps),
            verifier: VerificationEngine::new(settings.verification_enabled, Arc::clone(&ops)),
            ops,
        }
    }

    pub fn with_classifier(mut self, classifier: impl DriveClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_timestamps(mut self, timestamps: impl TimestampAccessor + 'static) -> Self {
        self.timestamps = Arc::new(timestamps);
        self
    }

    pub fn with_file_ops(mut self, ops: impl FileOps + 'static) -> Self {
        self.ops = Arc::new(ops);
        self.verifier =
            VerificationEngine::new(self.settings.verification_enabled, Arc::clone(&self.ops));
        self
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn verifier(&self) -> &VerificationEngine {
        &self.verifier
    }

    pub fn timestamps(&self) -> &dyn TimestampAccessor {
        self.timestamps.as_ref()
    }

    /// Strategy for a file of `file_size` bytes going from `source` to `target`
    pub fn determine_copy_strategy(
        &self,
        source: &Path,
        target: &Path,
        file_size: u64,
    ) -> CopyStrategy {
        select_strategy(
            self.classifier.classify(source),
            self.classifier.classify(target),
            file_size,
            self.settings.strategy_threshold,
        )
    }

    /// Copy one file within a session
    ///
    /// Issues the next sequence number from `session`, logs every step
    /// through it and honors its dry-run flag.
    pub fn copy_file(
        &self,
        session: &mut OperationSession,
        source: &Path,
        target: &Path,
        overwrite: bool,
    ) -> CopyResult {
        let sequence = session.next_sequence();
        let dry_run = session.is_dry_run();
        let progress = session.byte_progress();
        let mut log = |message: &str| session.log(sequence, message);
        let mut ctx = CopyContext::new(sequence, dry_run, &mut log).with_progress(progress);
        self.copy_with_context(&mut ctx, source, target, overwrite)
    }

    /// Copy one file with an explicit context
    ///
    /// Used where log lines must be buffered and replayed by the thread
    /// that owns the session.
    pub fn copy_with_context(
        &self,
        ctx: &mut CopyContext<'_>,
        source: &Path,
        target: &Path,
        overwrite: bool,
    ) -> CopyResult {
        let started = Instant::now();
        let source_class = self.classifier.classify(source);
        let target_class = self.classifier.classify(target);

        ctx.log(&format!(
            "copy {} ({}) -> {} ({})",
            source.display(),
            source_class,
            target.display(),
            target_class
        ));

        let size_check = self.check_source(source);
        let file_size = size_check.as_ref().map_or(0, |size| *size);
        let strategy = select_strategy(
            source_class,
            target_class,
            file_size,
            self.settings.strategy_threshold,
        );

        let mut result = CopyResult::new(
            ctx.sequence(),
            strategy,
            source.to_path_buf(),
            target.to_path_buf(),
            file_size,
            ctx.is_dry_run(),
        );

        let outcome = size_check.and_then(|_| {
            ctx.log(&format!("strategy {} for {} bytes", strategy, file_size));
            match strategy {
                CopyStrategy::Direct => {
                    DirectCopyExecutor::new(self).run(ctx, source, target, overwrite, file_size)
                }
                CopyStrategy::Staged => {
                    StagedCopyExecutor::new(self).run(ctx, source, target, overwrite, file_size)
                }
            }
        });

        match outcome {
            Ok(report) => {
                result.success = true;
                result.bytes_copied = report.bytes_copied;
                result.verification_passed = report.verification_passed;
                result.backup_path = report.leftover_backup;
                ctx.log(&format!("done: {} bytes", report.bytes_copied));
            }
            Err(error) => {
                if error.is_critical() {
                    tracing::error!(
                        sequence = ctx.sequence(),
                        target = %target.display(),
                        "{}",
                        error
                    );
                } else {
                    tracing::debug!(sequence = ctx.sequence(), "{}", error);
                }
                ctx.log(&format!("failed: {}", error));
                result.fail(&error);
            }
        }

        result.duration = started.elapsed();
        result
    }

    /// Source must exist and be a regular file; returns its size
    fn check_source(&self, source: &Path) -> Result<u64, CopyError> {
        match self.ops.metadata(source) {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(CopyError::SourceNotFile {
                path: source.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CopyError::SourceMissing {
                path: source.to_path_buf(),
            }),
            Err(e) => Err(CopyError::Io(e)),
        }
    }
}

impl std::fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// CheckOverwrite step shared by both executors; returns whether the target exists
pub(crate) fn check_overwrite(
    ctx: &mut CopyContext<'_>,
    ops: &dyn FileOps,
    target: &Path,
    overwrite: bool,
) -> Result<bool, CopyError> {
    let existing = ops.symlink_metadata(target).ok();
    if existing.as_ref().is_some_and(|m| m.is_dir()) {
        return Err(CopyError::TargetNotFile {
            path: target.to_path_buf(),
        });
    }
    let exists = existing.is_some();
    if exists && !overwrite {
        return Err(CopyError::OverwriteDisabled {
            path: target.to_path_buf(),
        });
    }
    if exists {
        ctx.log(&format!("target {} exists, will be replaced", target.display()));
    }
    Ok(exists)
}

/// Create the target's parent directory if it is missing
pub(crate) fn ensure_parent(
    ctx: &mut CopyContext<'_>,
    ops: &dyn FileOps,
    source: &Path,
    target: &Path,
) -> Result<(), CopyError> {
    let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if ops.exists(parent) {
        return Ok(());
    }

    ctx.step(&format!("create directory {}", parent.display()));
    if ctx.is_dry_run() {
        return Ok(());
    }
    ops.create_dir_all(parent)
        .map_err(|source_err| CopyError::CopyFailure {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: source_err,
        })
}

/// `"{path}.{tag}_{8 hex chars}"` next to `path`
pub(crate) fn sibling_with_suffix(path: &Path, tag: &str) -> PathBuf {
    let id = Uuid::new_v4().simple().to_string();
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}_{}", tag, &id[..8]));
    PathBuf::from(name)
}
