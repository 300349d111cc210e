use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::audit_log::AuditLogger;
use crate::batch::{lock, BatchHandle, BatchOrchestrator, EventSink};
use crate::certificate::{certificate_file_name, format_certificate};
use crate::config::WipeConfig;
use crate::error::{DuplicateLocation, QueueError, ServiceError};
use crate::queue::JobQueue;
use crate::record_store::RecordStore;
use crate::types::{BatchSummary, JobRequest, WipeJob, WipeRecord};
use crate::wipe_engine::{DiskBackend, WipeEngine};

/// Caller-facing entry point: owns the pending queue, the record cache and
/// the batch orchestrator for the lifetime of the process.
pub struct WipeService {
    queue: Mutex<JobQueue>,
    records: Arc<Mutex<RecordStore>>,
    orchestrator: Arc<BatchOrchestrator>,
    audit: AuditLogger,
}

impl WipeService {
    /// Loads the record store named by `config` and wipes through the local filesystem.
    pub fn new(config: &WipeConfig) -> Self {
        let engine = WipeEngine::with_backend(Arc::new(DiskBackend), config.chunk_size);
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: &WipeConfig, engine: WipeEngine) -> Self {
        let records = Arc::new(Mutex::new(RecordStore::open(&config.store_path)));
        info!(
            store = %config.store_path.display(),
            records = lock(&records).records().len(),
            "wipe service ready"
        );
        Self {
            queue: Mutex::new(JobQueue::new()),
            orchestrator: Arc::new(BatchOrchestrator::new(engine, Arc::clone(&records))),
            records,
            audit: AuditLogger::new(),
        }
    }

    pub fn enqueue(&self, request: JobRequest) -> Result<WipeJob, ServiceError> {
        let asset_id = request.asset_id.trim().to_string();
        let mut queue = lock(&self.queue);

        let result = if !asset_id.is_empty() && self.orchestrator.gate().is_in_flight(&asset_id) {
            Err(QueueError::DuplicateAssetId {
                asset_id: asset_id.clone(),
                location: DuplicateLocation::InFlight,
            })
        } else {
            let records = lock(&self.records);
            queue.enqueue(request, &records).cloned()
        };

        result.map_err(|err| {
            self.audit.log_enqueue_rejected(&asset_id, &err.to_string());
            ServiceError::from(err)
        })
    }

    pub fn remove(&self, index: usize) -> Result<WipeJob, ServiceError> {
        Ok(lock(&self.queue).remove(index)?)
    }

    pub fn clear(&self) {
        lock(&self.queue).clear();
    }

    pub fn list_pending(&self) -> Vec<WipeJob> {
        lock(&self.queue).jobs().to_vec()
    }

    pub fn list_records(&self) -> Vec<WipeRecord> {
        lock(&self.records).records().to_vec()
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.gate().is_running()
    }

    /// Starts the pending queue as a background batch.
    pub fn run_batch(&self) -> Result<BatchHandle, ServiceError> {
        Ok(self.orchestrator.start(&self.queue)?)
    }

    /// Runs the pending queue on the calling thread.
    pub fn run_batch_blocking(&self, sink: &dyn EventSink) -> Result<BatchSummary, ServiceError> {
        Ok(self.orchestrator.run_blocking(&self.queue, sink)?)
    }

    pub fn delete_record(&self, asset_id: &str) -> Result<usize, ServiceError> {
        let mut records = lock(&self.records);
        if !records.contains(asset_id) {
            return Err(ServiceError::RecordNotFound(asset_id.to_string()));
        }
        let removed = records.delete(asset_id)?;
        self.audit.log_record_deleted(asset_id, removed);
        Ok(removed)
    }

    /// Writes every record to `destination`; returns how many were written.
    pub fn export_records(&self, destination: &Path) -> Result<usize, ServiceError> {
        let records = lock(&self.records);
        records.export(destination)?;
        let count = records.records().len();
        self.audit.log_export(destination, count);
        Ok(count)
    }

    pub fn format_certificate(&self, asset_id: &str) -> Result<String, ServiceError> {
        let records = lock(&self.records);
        let record = records
            .get(asset_id)
            .ok_or_else(|| ServiceError::RecordNotFound(asset_id.to_string()))?;
        Ok(format_certificate(record))
    }

    /// Saves the certificate as `<dir>/<certificate_id>.txt`.
    pub fn write_certificate(&self, asset_id: &str, dir: &Path) -> Result<PathBuf, ServiceError> {
        let (file_name, text) = {
            let records = lock(&self.records);
            let record = records
                .get(asset_id)
                .ok_or_else(|| ServiceError::RecordNotFound(asset_id.to_string()))?;
            (certificate_file_name(record), format_certificate(record))
        };

        let path = dir.join(file_name);
        let io_err = |source: std::io::Error| ServiceError::Certificate {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        fs::write(&path, text).map_err(io_err)?;

        self.audit.log_certificate_written(asset_id, &path);
        Ok(path)
    }
}
