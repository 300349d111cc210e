//! Batch multi-pass data erasure.
//!
//! Jobs are validated into a pending queue, drained into a batch and wiped
//! one at a time. Every completed job leaves a persisted [`WipeRecord`] from
//! which a plain-text certificate can be rendered.

pub mod audit_log;
pub mod batch;
pub mod certificate;
pub mod config;
pub mod error;
pub mod path_validator;
pub mod queue;
pub mod record_store;
pub mod service;
pub mod types;
pub mod wipe_engine;

pub use batch::{BatchHandle, BatchOrchestrator, EventSink, NoopSink};
pub use config::WipeConfig;
pub use error::{BatchError, ConfigError, DuplicateLocation, QueueError, ServiceError, StoreError, WipeError};
pub use record_store::RecordStore;
pub use service::WipeService;
pub use types::{
    AssetType, BatchSummary, FailedJob, JobProgress, JobRequest, WipeEvent, WipeJob, WipeRecord,
    WipeStandard, WipeStatus,
};
pub use wipe_engine::{DiskBackend, WipeBackend, WipeEngine, WipeFile};
