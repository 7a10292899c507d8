//! Main copy command

use crate::engine::{ByteProgress, CopyEngine};
use crate::executor::{
    build_requests, execute_batch, BatchStats, CopyRequest, ExecutionEvent, ParallelExecutor,
};
use crate::scanner::{enumerate_files, ProgressCallback};
use crate::session::{
    end_copy_operation, start_copy_operation, FileLogSink, NullLogSink, OperationSession,
};
use crate::types::{CopyError, CopyErrorKind, CopyResult};
use crate::ui::ProgressReporter;
use crate::Config;
use console::style;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Queue depth per worker for the parallel executor
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Run the copy operation
pub fn run(config: Config) -> Result<(), CopyError> {
    let reporter = Arc::new(Mutex::new(if config.json_summary {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()
    }));

    let requests = collect_requests(&config, &reporter)?;
    if requests.is_empty() && !config.json_summary {
        println!("Nothing to copy.");
    }

    let byte_progress: ByteProgress = {
        let reporter = Arc::clone(&reporter);
        Arc::new(move |sequence: u64, bytes: u64, total: u64| {
            if let Ok(progress) = reporter.lock() {
                progress.update_file_bytes(sequence, bytes, total);
            }
        })
    };

    let mut session = open_session(&config)?.with_byte_progress(byte_progress);
    let engine = CopyEngine::new(config.engine_settings());

    if let Ok(mut progress) = reporter.lock() {
        progress.start_transfer(requests.len() as u64);
    }
    let progress_cb = {
        let reporter = Arc::clone(&reporter);
        move |event: &ExecutionEvent| match event {
            ExecutionEvent::FileStart { sequence, path, .. } => {
                if let Ok(progress) = reporter.lock() {
                    progress.set_current_file(*sequence, path);
                }
            }
            ExecutionEvent::FileDone { result, .. } => {
                if let Ok(mut progress) = reporter.lock() {
                    progress.complete_file(result);
                }
            }
            ExecutionEvent::Complete { stats } => {
                if let Ok(progress) = reporter.lock() {
                    progress.finish_transfer(stats);
                }
            }
        }
    };

    let batch = if config.threads > 1 {
        ParallelExecutor::new(config.threads, config.threads * QUEUE_DEPTH_PER_WORKER).and_then(
            |pool| pool.run(&engine, &mut session, &requests, Some(&progress_cb), None),
        )
    } else {
        Ok(execute_batch(
            &engine,
            &mut session,
            &requests,
            Some(&progress_cb),
            None,
        ))
    };

    let stats = match batch {
        Ok(stats) => stats,
        Err(e) => {
            end_copy_operation(session, 0, 0, 0);
            return Err(e);
        }
    };

    if !config.json_summary {
        if !stats.failures.is_empty() {
            println!("{}", format_error_summary(&stats.failures));
        }
        if stats.skipped > 0 {
            println!(
                "{} file(s) skipped: target exists and overwrite is disabled",
                stats.skipped
            );
        }
        if config.dry_run {
            println!("Dry-run mode: no changes were made.");
        }
    }
    if stats.has_critical() {
        eprintln!("{}", format_critical_block(&stats));
    }

    let summary = end_copy_operation(
        session,
        stats.succeeded as u64,
        stats.failed as u64,
        stats.bytes_copied,
    );
    if config.json_summary {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| CopyError::Io(e.into()))?;
        println!("{}", json);
    }

    if stats.failed > 0 {
        let critical = stats.critical().count();
        return Err(CopyError::Validation(format!(
            "{} of {} file(s) failed to copy ({} critical)",
            stats.failed, stats.total, critical
        )));
    }
    Ok(())
}

fn open_session(config: &Config) -> Result<OperationSession, CopyError> {
    let name = format!(
        "{} -> {}",
        config.source.display(),
        config.destination.display()
    );
    match &config.log_file {
        Some(path) => {
            let sink = FileLogSink::open(path).map_err(|e| {
                CopyError::Config(format!("Cannot open log file {}: {}", path.display(), e))
            })?;
            Ok(start_copy_operation(name, config.dry_run, sink))
        }
        None => Ok(start_copy_operation(name, config.dry_run, NullLogSink)),
    }
}

/// One request for a file source, one per regular file for a directory
fn collect_requests(
    config: &Config,
    reporter: &Arc<Mutex<ProgressReporter>>,
) -> Result<Vec<CopyRequest>, CopyError> {
    if config.source.is_file() {
        let Some(file_name) = config.source.file_name() else {
            return Err(CopyError::Validation(format!(
                "Source has no file name: {}",
                config.source.display()
            )));
        };
        let target = if config.destination.is_dir() {
            config.destination.join(file_name)
        } else {
            config.destination.clone()
        };
        return Ok(vec![CopyRequest {
            relative: PathBuf::from(file_name),
            source: config.source.clone(),
            target,
            overwrite: config.overwrite,
        }]);
    }

    if let Ok(progress) = reporter.lock() {
        progress.start_scan(&config.source);
    }
    let scan_progress: ProgressCallback = {
        let reporter = Arc::clone(reporter);
        Box::new(move |files: u64, bytes: u64| {
            if let Ok(progress) = reporter.lock() {
                progress.update_scan(files, bytes);
            }
        })
    };
    let list = enumerate_files(&config.source, Some(&scan_progress))?;
    if let Ok(progress) = reporter.lock() {
        progress.finish_scan(list.len(), list.total_bytes);
    }

    Ok(build_requests(
        &config.source,
        &config.destination,
        list.files,
        config.overwrite,
    ))
}

fn suggestion(kind: CopyErrorKind) -> Option<&'static str> {
    match kind {
        CopyErrorKind::SourceMissing => Some("Verify the path still exists and retry."),
        CopyErrorKind::SourceNotFile => Some("Only regular files can be copied."),
        CopyErrorKind::TargetNotFile => {
            Some("Move the directory out of the way or pick another destination.")
        }
        CopyErrorKind::CopyFailure => {
            Some("Check free space and permissions on the destination, then retry.")
        }
        CopyErrorKind::VerificationFailure => {
            Some("The destination may be unstable; retry and check disk or network health.")
        }
        CopyErrorKind::RenameFailure => {
            Some("Close programs holding the target open and check the share is connected.")
        }
        CopyErrorKind::RollbackFailure => Some("Restore the backup file listed below by hand."),
        CopyErrorKind::Io => Some("Retry. If this keeps happening, check disk health."),
        CopyErrorKind::Config | CopyErrorKind::Validation | CopyErrorKind::OverwriteDisabled => {
            None
        }
    }
}

fn format_error_summary(failures: &[CopyResult]) -> String {
    let mut groups: BTreeMap<&'static str, Vec<&CopyResult>> = BTreeMap::new();
    for result in failures {
        let label = result.error_kind.map_or("Unknown error", CopyErrorKind::label);
        groups.entry(label).or_default().push(result);
    }

    let mut lines = Vec::new();
    lines.push("Error summary:".to_string());
    for (label, items) in groups {
        lines.push(format!("  {} ({}):", label, items.len()));
        for result in items.iter().take(3) {
            lines.push(format!("    - {}", result.error_message));
            lines.push(format!("      Path: {}", result.target.display()));
            if let Some(hint) = result.error_kind.and_then(suggestion) {
                lines.push(format!("      Try: {}", hint));
            }
        }
        if items.len() > 3 {
            lines.push(format!("    - ... {} more", items.len() - 3));
        }
    }
    lines.join("\n")
}

/// Separate block for failures that need manual attention
fn format_critical_block(stats: &BatchStats) -> String {
    let mut lines = Vec::new();
    lines.push(
        style("CRITICAL: manual attention required")
            .red()
            .bold()
            .to_string(),
    );
    for result in stats.critical() {
        lines.push(format!("  #{} {}", result.sequence, result.target.display()));
        lines.push(format!("    {}", result.error_message));
        if let Some(backup) = &result.backup_path {
            lines.push(format!(
                "    Original content: {}",
                style(backup.display()).yellow()
            ));
        }
    }
    lines.join("\n")
}
