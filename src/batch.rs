use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::audit_log::AuditLogger;
use crate::certificate::generate_certificate_id;
use crate::error::BatchError;
use crate::queue::JobQueue;
use crate::record_store::RecordStore;
use crate::types::{
    BatchSummary, FailedJob, JobProgress, WipeEvent, WipeJob, WipeRecord, SUMMARY_FAILURE_PREVIEW,
};
use crate::wipe_engine::{ProgressReporter, WipeEngine};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receiver of batch events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WipeEvent);
}

impl EventSink for Sender<WipeEvent> {
    fn emit(&self, event: WipeEvent) {
        // a caller that stopped listening does not stop the batch
        let _ = self.send(event);
    }
}

/// Discards every event.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: WipeEvent) {}
}

/// Forwards engine progress into the batch event stream.
struct SinkReporter<'a> {
    sink: &'a dyn EventSink,
}

impl ProgressReporter for SinkReporter<'_> {
    fn report(&self, progress: JobProgress) {
        self.sink.emit(WipeEvent::JobProgress(progress));
    }
}

/// Idle/Running state of the orchestrator plus the ids of drained jobs
/// that have not concluded yet.
#[derive(Debug, Default)]
pub struct BatchGate {
    running: AtomicBool,
    in_flight: Mutex<HashSet<String>>,
}

impl BatchGate {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self, asset_id: &str) -> bool {
        lock(&self.in_flight).contains(asset_id)
    }

    fn try_begin(self: &Arc<Self>) -> Result<RunningGuard, BatchError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BatchError::AlreadyRunning)?;
        Ok(RunningGuard {
            gate: Arc::clone(self),
        })
    }

    #[cfg(test)]
    pub(crate) fn mark_in_flight(&self, asset_id: &str) {
        lock(&self.in_flight).insert(asset_id.to_string());
    }

    fn finish_job(&self, asset_id: &str) {
        lock(&self.in_flight).remove(asset_id);
    }
}

/// Returns the gate to Idle when the batch ends, however it ends.
struct RunningGuard {
    gate: Arc<BatchGate>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.gate.in_flight).clear();
        self.gate.running.store(false, Ordering::SeqCst);
    }
}

/// A batch running on its worker thread.
pub struct BatchHandle {
    events: Receiver<WipeEvent>,
    worker: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn events(&self) -> &Receiver<WipeEvent> {
        &self.events
    }

    /// Waits for the worker and returns its summary.
    pub fn join(self) -> Result<BatchSummary, BatchError> {
        self.worker.join().map_err(|_| BatchError::WorkerPanicked)
    }
}

/// Drains the queue and wipes every job in order, one at a time.
pub struct BatchOrchestrator {
    engine: WipeEngine,
    records: Arc<Mutex<RecordStore>>,
    gate: Arc<BatchGate>,
    audit: AuditLogger,
}

impl BatchOrchestrator {
    pub fn new(engine: WipeEngine, records: Arc<Mutex<RecordStore>>) -> Self {
        Self {
            engine,
            records,
            gate: Arc::new(BatchGate::default()),
            audit: AuditLogger::new(),
        }
    }

    pub fn gate(&self) -> &BatchGate {
        &self.gate
    }

    /// Starts a batch on a background worker and returns its event stream.
    ///
    /// The queue lock is held from the emptiness check through the drain, so
    /// a concurrent enqueue lands either wholly before the snapshot or in the
    /// queue for the next batch.
    pub fn start(self: &Arc<Self>, queue: &Mutex<JobQueue>) -> Result<BatchHandle, BatchError> {
        let guard = self.gate.try_begin()?;
        let mut pending = lock(queue);
        if pending.is_empty() {
            return Err(BatchError::EmptyQueue);
        }

        let (event_tx, event_rx) = mpsc::channel::<WipeEvent>();
        let (job_tx, job_rx) = mpsc::channel::<Vec<WipeJob>>();
        let orchestrator = Arc::clone(self);

        // Spawn before draining so a failed spawn leaves the queue untouched.
        let worker = thread::Builder::new()
            .name("wipe-batch".to_string())
            .spawn(move || {
                let _guard = guard;
                let jobs = job_rx.recv().unwrap_or_default();
                orchestrator.process(jobs, &event_tx)
            })
            .map_err(|e| BatchError::Spawn(e.to_string()))?;

        let jobs = self.take_snapshot(&mut pending);
        drop(pending);
        // the worker only exits early by panicking, which join() reports
        let _ = job_tx.send(jobs);

        Ok(BatchHandle {
            events: event_rx,
            worker,
        })
    }

    /// Runs a whole batch on the calling thread.
    pub fn run_blocking(&self, queue: &Mutex<JobQueue>, sink: &dyn EventSink) -> Result<BatchSummary, BatchError> {
        let _guard = self.gate.try_begin()?;
        let jobs = {
            let mut pending = lock(queue);
            if pending.is_empty() {
                return Err(BatchError::EmptyQueue);
            }
            self.take_snapshot(&mut pending)
        };
        Ok(self.process(jobs, sink))
    }

    fn take_snapshot(&self, queue: &mut JobQueue) -> Vec<WipeJob> {
        let jobs = queue.drain_all();
        lock(&self.gate.in_flight).extend(jobs.iter().map(|j| j.asset_id.clone()));
        info!(jobs = jobs.len(), "batch started");
        jobs
    }

    /// Processes `jobs` strictly in order. Every job is attempted exactly
    /// once; a failed job never stops the batch.
    pub fn process(&self, jobs: Vec<WipeJob>, sink: &dyn EventSink) -> BatchSummary {
        let total = jobs.len();
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        for (index, job) in jobs.into_iter().enumerate() {
            let asset_id = job.asset_id.clone();
            sink.emit(WipeEvent::JobStarted {
                asset_id: asset_id.clone(),
                index,
                total,
            });

            match self.process_job(job, sink) {
                Ok(()) => summary.completed += 1,
                Err(reason) => {
                    summary.failed_count += 1;
                    let failed = FailedJob {
                        asset_id: asset_id.clone(),
                        reason,
                    };
                    if summary.failed.len() < SUMMARY_FAILURE_PREVIEW {
                        summary.failed.push(failed.clone());
                    }
                    sink.emit(WipeEvent::JobFailed(failed));
                }
            }

            self.gate.finish_job(&asset_id);
            sink.emit(WipeEvent::BatchProgress {
                completed: index + 1,
                total,
            });
        }

        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed_count,
            "batch finished"
        );
        sink.emit(WipeEvent::BatchCompleted(summary.clone()));
        summary
    }

    /// Wipes one job and persists its record. `Err` carries the failure reason.
    fn process_job(&self, job: WipeJob, sink: &dyn EventSink) -> Result<(), String> {
        let reporter = SinkReporter { sink };
        let start_time = Utc::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.engine.wipe_target(&job, &reporter)));
        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                let reason = err.to_string();
                self.audit.log_job_failed(&job.asset_id, &job.target_path, &reason);
                return Err(reason);
            }
            Err(_) => {
                let reason = "unexpected error while wiping target".to_string();
                error!(asset_id = %job.asset_id, "wipe engine panicked");
                self.audit.log_job_failed(&job.asset_id, &job.target_path, &reason);
                return Err(reason);
            }
        };
        let end_time = Utc::now();

        for failure in &outcome.failures {
            sink.emit(WipeEvent::FileFailed {
                asset_id: job.asset_id.clone(),
                path: failure.path.display().to_string(),
                reason: format!("{} failed: {}", failure.stage, failure.reason),
            });
        }

        let record = WipeRecord::completed(job, start_time, end_time, generate_certificate_id(end_time));
        self.audit
            .log_job_completed(&record, outcome.files_wiped, outcome.failures.len());

        let asset_id = record.asset_id.clone();
        let certificate_id = record.certificate_id.clone();
        if let Err(err) = lock(&self.records).append(record) {
            warn!(asset_id = %asset_id, error = %err, "wipe record not persisted");
            sink.emit(WipeEvent::PersistFailed {
                asset_id: asset_id.clone(),
                reason: err.to_string(),
            });
        }

        sink.emit(WipeEvent::JobCompleted {
            asset_id,
            certificate_id,
        });
        Ok(())
    }
}
