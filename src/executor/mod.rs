//! Batch driver over the copy engine

pub mod pool;

pub use pool::ParallelExecutor;

use crate::engine::CopyEngine;
use crate::session::OperationSession;
use crate::types::CopyResult;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// One file to copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    /// Path relative to both roots, for display
    pub relative: PathBuf,
    pub source: PathBuf,
    pub target: PathBuf,
    pub overwrite: bool,
}

/// Join relative paths onto both roots
pub fn build_requests(
    source_root: &Path,
    destination_root: &Path,
    relative_paths: impl IntoIterator<Item = PathBuf>,
    overwrite: bool,
) -> Vec<CopyRequest> {
    relative_paths
        .into_iter()
        .map(|relative| CopyRequest {
            source: source_root.join(&relative),
            target: destination_root.join(&relative),
            relative,
            overwrite,
        })
        .collect()
}

/// Aggregated outcome of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Number of requests in the batch
    pub total: usize,
    pub succeeded: usize,
    /// Failures, critical ones included, skips excluded
    pub failed: usize,
    /// Targets left alone because overwrite was disabled
    pub skipped: usize,
    pub bytes_copied: u64,
    /// Set when the cancel flag stopped the batch early
    pub cancelled: bool,
    /// Results of every failed request
    pub failures: Vec<CopyResult>,
}

impl BatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &CopyResult) {
        if result.success {
            self.succeeded += 1;
            self.bytes_copied += result.bytes_copied;
        } else if result.is_skipped() {
            self.skipped += 1;
        } else {
            self.failed += 1;
            self.failures.push(result.clone());
        }
    }

    /// Results that need a human: rollback failures and failed backup renames
    pub fn critical(&self) -> impl Iterator<Item = &CopyResult> {
        self.failures.iter().filter(|r| r.is_critical())
    }

    pub fn has_critical(&self) -> bool {
        self.critical().next().is_some()
    }

    /// Requests that were handed to the engine
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Events emitted while executing a batch
#[derive(Debug)]
pub enum ExecutionEvent {
    /// File copy started
    FileStart {
        index: usize,
        total: usize,
        sequence: u64,
        path: PathBuf,
    },
    /// File copy finished, successfully or not
    FileDone {
        index: usize,
        total: usize,
        result: CopyResult,
    },
    /// Batch completed (with or without errors)
    Complete { stats: BatchStats },
}

/// Optional callback used to receive execution events.
pub type ExecutionCallback = dyn Fn(&ExecutionEvent) + Send + Sync;

/// Copy every request in order
///
/// Continues past per-file failures. `cancel` is only checked between
/// files; a copy that has started always runs to completion.
pub fn execute_batch(
    engine: &CopyEngine,
    session: &mut OperationSession,
    requests: &[CopyRequest],
    on_event: Option<&ExecutionCallback>,
    cancel: Option<&AtomicBool>,
) -> BatchStats {
    let mut stats = BatchStats::new(requests.len());

    for (idx, request) in requests.iter().enumerate() {
        if is_cancelled(cancel) {
            session.log(
                session.last_sequence(),
                &format!("cancelled before {}", request.relative.display()),
            );
            stats.cancelled = true;
            break;
        }

        let index = idx + 1;
        emit_event(
            on_event,
            ExecutionEvent::FileStart {
                index,
                total: stats.total,
                sequence: session.last_sequence() + 1,
                path: request.relative.clone(),
            },
        );

        let result = engine.copy_file(session, &request.source, &request.target, request.overwrite);
        stats.record(&result);

        emit_event(
            on_event,
            ExecutionEvent::FileDone {
                index,
                total: stats.total,
                result,
            },
        );
    }

    emit_event(
        on_event,
        ExecutionEvent::Complete {
            stats: stats.clone(),
        },
    );

    stats
}

pub(crate) fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

pub(crate) fn emit_event(on_event: Option<&ExecutionCallback>, event: ExecutionEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::session::{start_copy_operation, MemoryLogSink, NullLogSink};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn engine() -> CopyEngine {
        CopyEngine::new(EngineSettings::default())
    }

    #[test]
    fn test_build_requests_joins_roots() {
        let requests = build_requests(
            Path::new("/src"),
            Path::new("/dst"),
            vec![PathBuf::from("a.txt"), PathBuf::from("sub/b.txt")],
            false,
        );
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].source, Path::new("/src/sub/b.txt"));
        assert_eq!(requests[1].target, Path::new("/dst/sub/b.txt"));
        assert_eq!(requests[1].relative, Path::new("sub/b.txt"));
        assert!(!requests[1].overwrite);
    }

    #[test]
    fn test_execute_batch_copy_overwrite_and_skip() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");

        fs::write(src.path().join("new.txt"), b"new-content").expect("write src new");
        fs::write(src.path().join("keep.txt"), b"updated").expect("write src keep");
        fs::write(dst.path().join("keep.txt"), b"old").expect("write dst keep old");

        let mut requests = build_requests(
            src.path(),
            dst.path(),
            vec![PathBuf::from("new.txt"), PathBuf::from("keep.txt")],
            true,
        );
        requests[1].overwrite = false;

        let mut session = start_copy_operation("batch", false, NullLogSink);
        let stats = execute_batch(&engine(), &mut session, &requests, None, None);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.bytes_copied, 11);
        assert_eq!(
            fs::read(dst.path().join("keep.txt")).expect("read dst keep"),
            b"old"
        );
    }

    #[test]
    fn test_execute_batch_continues_on_error() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("good.txt"), b"good").expect("write src good");

        let requests = build_requests(
            src.path(),
            dst.path(),
            vec![PathBuf::from("missing.txt"), PathBuf::from("good.txt")],
            true,
        );

        let mut session = start_copy_operation("batch", false, NullLogSink);
        let stats = execute_batch(&engine(), &mut session, &requests, None, None);

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert!(!stats.has_critical());
        assert!(dst.path().join("good.txt").exists());
        assert_eq!(session.last_sequence(), 2);
    }

    #[test]
    fn test_execute_batch_cancel_between_files() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("a.txt"), b"a").expect("write a");
        fs::write(src.path().join("b.txt"), b"b").expect("write b");

        let requests = build_requests(
            src.path(),
            dst.path(),
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
            true,
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_ref = Arc::clone(&cancel);
        let callback = move |event: &ExecutionEvent| {
            if let ExecutionEvent::FileDone { index: 1, .. } = event {
                cancel_ref.store(true, Ordering::Relaxed);
            }
        };

        let mut session = start_copy_operation("batch", false, NullLogSink);
        let stats = execute_batch(
            &engine(),
            &mut session,
            &requests,
            Some(&callback),
            Some(&cancel),
        );

        assert!(stats.cancelled);
        assert_eq!(stats.processed(), 1);
        assert!(dst.path().join("a.txt").exists());
        assert!(!dst.path().join("b.txt").exists());
    }

    #[test]
    fn test_execute_batch_emits_events_in_order() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("new.txt"), b"new-content").expect("write src new");

        let requests = build_requests(src.path(), dst.path(), vec![PathBuf::from("new.txt")], true);

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_ref = Arc::clone(&events);
        let callback = move |event: &ExecutionEvent| {
            let label = match event {
                ExecutionEvent::FileStart { sequence, .. } => format!("start#{}", sequence),
                ExecutionEvent::FileDone { result, .. } => format!("done#{}", result.sequence),
                ExecutionEvent::Complete { .. } => "complete".to_string(),
            };
            events_ref.lock().expect("lock events").push(label);
        };

        let sink = MemoryLogSink::new();
        let mut session = start_copy_operation("batch", false, sink.clone());
        let stats = execute_batch(&engine(), &mut session, &requests, Some(&callback), None);
        assert_eq!(stats.succeeded, 1);

        let snapshot = events.lock().expect("lock events snapshot").clone();
        assert_eq!(snapshot, vec!["start#1", "done#1", "complete"]);
        assert!(sink.lines().iter().any(|l| l.contains("[#000001]")));
    }
}
