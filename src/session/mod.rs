//! Operation sessions
//!
//! One session models one user-initiated batch: it owns the log sink, issues
//! per-file sequence numbers and writes the closing summary. It is a plain
//! value passed by `&mut`, never shared between concurrent batches.

mod sink;

pub use sink::{FileLogSink, LogSink, MemoryLogSink, NullLogSink};

use crate::engine::ByteProgress;
use chrono::{DateTime, Local};
use indicatif::HumanBytes;
use serde::Serialize;
use uuid::Uuid;

/// Status callback: `(sequence_number, message)`
pub type StatusCallback = Box<dyn FnMut(u64, &str) + Send>;

pub struct OperationSession {
    id: Uuid,
    name: String,
    dry_run: bool,
    started_at: DateTime<Local>,
    sequence_counter: u64,
    sink: Box<dyn LogSink>,
    on_status: Option<StatusCallback>,
    on_bytes: Option<ByteProgress>,
}

/// Closing record of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: String,
    pub dry_run: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Sequence numbers issued, one per `copy_file` call
    pub files_processed: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_bytes: u64,
}

impl OperationSession {
    /// Open a session and write its start line
    pub fn start(name: impl Into<String>, dry_run: bool, sink: impl LogSink + 'static) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            dry_run,
            started_at: Local::now(),
            sequence_counter: 0,
            sink: Box::new(sink),
            on_status: None,
            on_bytes: None,
        };

        let mode = if dry_run { " (dry run)" } else { "" };
        let line = format!(
            "session {} started: {}{}",
            session.id, session.name, mode
        );
        session.write(None, &line);
        tracing::info!(session = %session.id, name = %session.name, dry_run, "copy operation started");
        session
    }

    pub fn with_status_callback(mut self, callback: impl FnMut(u64, &str) + Send + 'static) -> Self {
        self.on_status = Some(Box::new(callback));
        self
    }

    pub fn with_byte_progress(mut self, callback: ByteProgress) -> Self {
        self.on_bytes = Some(callback);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Last sequence number issued (0 before the first file)
    pub fn last_sequence(&self) -> u64 {
        self.sequence_counter
    }

    /// Issue the next per-file sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence_counter += 1;
        self.sequence_counter
    }

    pub fn byte_progress(&self) -> Option<ByteProgress> {
        self.on_bytes.clone()
    }

    /// Write a line for file `sequence` and forward it to the status callback
    pub fn log(&mut self, sequence: u64, message: &str) {
        self.write(Some(sequence), message);
        tracing::debug!(session = %self.id, sequence, "{}", message);
        if let Some(callback) = self.on_status.as_mut() {
            callback(sequence, message);
        }
    }

    /// Write the summary and release the sink
    pub fn end(mut self, success_count: u64, error_count: u64, total_bytes: u64) -> SessionSummary {
        let finished_at = Local::now();
        let elapsed = finished_at - self.started_at;
        let line = format!(
            "session {} finished: {} succeeded, {} failed, {} copied in {:.3}s",
            self.id,
            success_count,
            error_count,
            HumanBytes(total_bytes),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        self.write(None, &line);
        if let Err(e) = self.sink.flush() {
            tracing::warn!(session = %self.id, error = %e, "could not flush operation log");
        }
        tracing::info!(
            session = %self.id,
            success_count,
            error_count,
            total_bytes,
            "copy operation finished"
        );

        SessionSummary {
            id: self.id,
            name: self.name,
            dry_run: self.dry_run,
            started_at: self.started_at,
            finished_at,
            files_processed: self.sequence_counter,
            success_count,
            error_count,
            total_bytes,
        }
    }

    fn write(&mut self, sequence: Option<u64>, message: &str) {
        let line = format_line(Local::now(), sequence, message);
        if let Err(e) = self.sink.write_line(&line) {
            tracing::warn!(session = %self.id, error = %e, "could not write operation log line");
        }
    }
}

impl std::fmt::Debug for OperationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dry_run", &self.dry_run)
            .field("sequence_counter", &self.sequence_counter)
            .finish_non_exhaustive()
    }
}

/// Open a session for one batch
pub fn start_copy_operation(
    name: impl Into<String>,
    dry_run: bool,
    sink: impl LogSink + 'static,
) -> OperationSession {
    OperationSession::start(name, dry_run, sink)
}

/// Close a session, writing its summary
pub fn end_copy_operation(
    session: OperationSession,
    success_count: u64,
    error_count: u64,
    total_bytes: u64,
) -> SessionSummary {
    session.end(success_count, error_count, total_bytes)
}

/// `[2024-05-01 13:37:00.123] [#000042] message`
pub fn format_line(time: DateTime<Local>, sequence: Option<u64>, message: &str) -> String {
    let tag = match sequence {
        Some(sequence) => format!("#{:06}", sequence),
        None => "session".to_string(),
    };
    format!("[{}] [{}] {}", time.format("%Y-%m-%d %H:%M:%S%.3f"), tag, message)
}
