//! Concurrent copies over disjoint targets.
//!
//! Dispatcher + worker inbox design:
//! - the driver (the thread owning the session) issues sequence numbers and
//!   feeds a bounded upstream queue
//! - a dispatcher hands jobs round-robin to per-worker `mpsc` inboxes
//! - workers run the blocking copy on the blocking pool and send back the
//!   result plus the log lines they buffered
//! - the driver replays those lines into the session, so each file's lines
//!   stay together in the operation log
//!
//! Two requests for the same target in one batch are rejected up front.

use super::{emit_event, is_cancelled, BatchStats, CopyRequest, ExecutionCallback, ExecutionEvent};
use crate::engine::{ByteProgress, CopyContext, CopyEngine};
use crate::session::OperationSession;
use crate::types::{CopyError, CopyResult, CopyStrategy};
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

/// Work item accepted by the pool.
struct CopyJob {
    index: usize,
    sequence: u64,
    dry_run: bool,
    request: CopyRequest,
    progress: Option<ByteProgress>,
}

/// A finished job on its way back to the driver
struct JobOutcome {
    index: usize,
    worker_id: usize,
    result: CopyResult,
    lines: Vec<String>,
}

/// Runs a batch on a fixed number of worker tasks.
pub struct ParallelExecutor {
    runtime: Runtime,
    workers: usize,
    capacity: usize,
}

impl ParallelExecutor {
    /// Create a pool with `worker_count` workers and bounded queues.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self, CopyError> {
        let workers = worker_count.max(1);
        let capacity = queue_capacity.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .build()
            .map_err(CopyError::Io)?;

        Ok(Self {
            runtime,
            workers,
            capacity,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Copy every request, up to `workers` at a time
    ///
    /// Same contract as [`super::execute_batch`] except that completion
    /// order, and so `FileDone` order, may differ from request order.
    pub fn run(
        &self,
        engine: &CopyEngine,
        session: &mut OperationSession,
        requests: &[CopyRequest],
        on_event: Option<&ExecutionCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<BatchStats, CopyError> {
        ensure_disjoint_targets(requests)?;

        let total = requests.len();
        let mut stats = BatchStats::new(total);
        let workers = self.workers;
        let capacity = self.capacity;

        self.runtime.block_on(async {
            let (enqueue_tx, enqueue_rx) = mpsc::channel::<CopyJob>(capacity);
            let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<JobOutcome>();

            let mut worker_txs = Vec::with_capacity(workers);
            let mut worker_handles = Vec::with_capacity(workers);
            for worker_id in 0..workers {
                let (worker_tx, worker_rx) = mpsc::channel::<CopyJob>(capacity);
                worker_txs.push(worker_tx);
                worker_handles.push(tokio::spawn(worker_loop(
                    worker_id,
                    worker_rx,
                    engine.clone(),
                    outcome_tx.clone(),
                )));
            }
            drop(outcome_tx);

            let dispatcher_handle = tokio::spawn(dispatcher_loop(enqueue_rx, worker_txs));

            let mut in_flight = 0usize;
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
                let sequence = session.next_sequence();
                emit_event(
                    on_event,
                    ExecutionEvent::FileStart {
                        index,
                        total,
                        sequence,
                        path: request.relative.clone(),
                    },
                );

                let job = CopyJob {
                    index,
                    sequence,
                    dry_run: session.is_dry_run(),
                    request: request.clone(),
                    progress: session.byte_progress(),
                };
                if enqueue_tx.send(job).await.is_err() {
                    return Err(CopyError::Validation(
                        "parallel executor queue receiver is closed".to_string(),
                    ));
                }
                in_flight += 1;

                while let Ok(outcome) = outcome_rx.try_recv() {
                    in_flight -= 1;
                    deliver(session, &mut stats, on_event, outcome);
                }
            }

            // Closing the upstream queue lets the dispatcher drop the inboxes.
            drop(enqueue_tx);

            while in_flight > 0 {
                match outcome_rx.recv().await {
                    Some(outcome) => {
                        in_flight -= 1;
                        deliver(session, &mut stats, on_event, outcome);
                    }
                    None => break,
                }
            }

            dispatcher_handle.await.map_err(map_join_error)?;
            for handle in worker_handles {
                handle.await.map_err(map_join_error)?;
            }
            Ok::<(), CopyError>(())
        })?;

        emit_event(
            on_event,
            ExecutionEvent::Complete {
                stats: stats.clone(),
            },
        );
        Ok(stats)
    }
}

/// Replay a finished job into the session and the caller's callback
fn deliver(
    session: &mut OperationSession,
    stats: &mut BatchStats,
    on_event: Option<&ExecutionCallback>,
    outcome: JobOutcome,
) {
    let sequence = outcome.result.sequence;
    for line in &outcome.lines {
        session.log(sequence, line);
    }
    tracing::trace!(worker = outcome.worker_id, sequence, "job delivered");

    stats.record(&outcome.result);
    emit_event(
        on_event,
        ExecutionEvent::FileDone {
            index: outcome.index,
            total: stats.total,
            result: outcome.result,
        },
    );
}

async fn dispatcher_loop(
    mut enqueue_rx: mpsc::Receiver<CopyJob>,
    worker_txs: Vec<mpsc::Sender<CopyJob>>,
) {
    let mut next_worker = 0usize;
    let worker_len = worker_txs.len();

    while let Some(job) = enqueue_rx.recv().await {
        if worker_len == 0 {
            break;
        }

        let target = next_worker % worker_len;
        if worker_txs[target].send(job).await.is_ok() {
            next_worker = (next_worker + 1) % worker_len;
        }
    }
    // worker_txs are dropped here, which closes worker inboxes.
}

async fn worker_loop(
    worker_id: usize,
    mut worker_rx: mpsc::Receiver<CopyJob>,
    engine: CopyEngine,
    outcome_tx: mpsc::UnboundedSender<JobOutcome>,
) {
    while let Some(job) = worker_rx.recv().await {
        let index = job.index;
        let fallback = failed_result(&job);
        let engine = engine.clone();

        let outcome = match tokio::task::spawn_blocking(move || run_job(&engine, job)).await {
            Ok((result, lines)) => JobOutcome {
                index,
                worker_id,
                result,
                lines,
            },
            Err(e) => {
                let error = CopyError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("copy task failed: {}", e),
                ));
                let mut result = fallback;
                result.fail(&error);
                JobOutcome {
                    index,
                    worker_id,
                    result,
                    lines: vec![format!("failed: {}", error)],
                }
            }
        };

        if outcome_tx.send(outcome).is_err() {
            break;
        }
    }
}

fn run_job(engine: &CopyEngine, job: CopyJob) -> (CopyResult, Vec<String>) {
    let mut lines = Vec::new();
    let result = {
        let mut log = |message: &str| lines.push(message.to_string());
        let mut ctx =
            CopyContext::new(job.sequence, job.dry_run, &mut log).with_progress(job.progress);
        engine.copy_with_context(
            &mut ctx,
            &job.request.source,
            &job.request.target,
            job.request.overwrite,
        )
    };
    (result, lines)
}

/// Result reported when the copy task itself died
fn failed_result(job: &CopyJob) -> CopyResult {
    CopyResult::new(
        job.sequence,
        CopyStrategy::Direct,
        job.request.source.clone(),
        job.request.target.clone(),
        0,
        job.dry_run,
    )
}

fn ensure_disjoint_targets(requests: &[CopyRequest]) -> Result<(), CopyError> {
    let mut seen: HashSet<&Path> = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(request.target.as_path()) {
            return Err(CopyError::Validation(format!(
                "target appears more than once in a parallel batch: {}",
                request.target.display()
            )));
        }
    }
    Ok(())
}

fn map_join_error(error: tokio::task::JoinError) -> CopyError {
    CopyError::Validation(format!("parallel executor task failed: {}", error))
}
