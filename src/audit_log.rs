use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::types::WipeRecord;

pub const AUDIT_TARGET: &str = "audit";

/// Audit event ids.
///
/// - 1000: job wiped
/// - 1003: job failed
/// - 2000: record deleted
/// - 2001: records exported
/// - 2002: certificate written
/// - 3000: enqueue rejected
pub mod event_id {
    pub const JOB_COMPLETED: u32 = 1000;
    pub const JOB_FAILED: u32 = 1003;
    pub const RECORD_DELETED: u32 = 2000;
    pub const RECORDS_EXPORTED: u32 = 2001;
    pub const CERTIFICATE_WRITTEN: u32 = 2002;
    pub const ENQUEUE_REJECTED: u32 = 3000;
}

/// Audit trail of erasure operations, emitted as structured events on the
/// `audit` tracing target so a subscriber can route them separately.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    operator: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        let operator = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "Unknown".to_string());
        Self { operator }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn log_job_completed(&self, record: &WipeRecord, files_wiped: usize, file_failures: usize) {
        info!(
            target: AUDIT_TARGET,
            event_id = event_id::JOB_COMPLETED,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            asset_id = %record.asset_id,
            serial = %record.serial,
            path = %record.path,
            standard = %record.standard,
            passes = record.passes,
            certificate_id = %record.certificate_id,
            files_wiped,
            file_failures,
            "wipe completed"
        );
    }

    pub fn log_job_failed(&self, asset_id: &str, path: &str, reason: &str) {
        warn!(
            target: AUDIT_TARGET,
            event_id = event_id::JOB_FAILED,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            asset_id,
            path,
            reason,
            "wipe failed"
        );
    }

    pub fn log_record_deleted(&self, asset_id: &str, removed: usize) {
        info!(
            target: AUDIT_TARGET,
            event_id = event_id::RECORD_DELETED,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            asset_id,
            removed,
            "wipe record deleted"
        );
    }

    pub fn log_export(&self, destination: &Path, count: usize) {
        info!(
            target: AUDIT_TARGET,
            event_id = event_id::RECORDS_EXPORTED,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            destination = %destination.display(),
            count,
            "wipe records exported"
        );
    }

    pub fn log_certificate_written(&self, asset_id: &str, path: &Path) {
        info!(
            target: AUDIT_TARGET,
            event_id = event_id::CERTIFICATE_WRITTEN,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            asset_id,
            path = %path.display(),
            "certificate written"
        );
    }

    pub fn log_enqueue_rejected(&self, asset_id: &str, reason: &str) {
        warn!(
            target: AUDIT_TARGET,
            event_id = event_id::ENQUEUE_REJECTED,
            timestamp = %Utc::now().to_rfc3339(),
            operator = %self.operator,
            asset_id,
            reason,
            "enqueue rejected"
        );
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
