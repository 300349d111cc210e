use tracing::debug;

use crate::error::{DuplicateLocation, QueueError};
use crate::path_validator::PathValidator;
use crate::record_store::RecordStore;
use crate::types::{JobRequest, WipeJob, DEFAULT_OWNER};

/// Pending wipe jobs in enqueue order.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: Vec<WipeJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `request` and appends it. `asset_id` must be unique across
    /// pending jobs and the records already in `records`.
    pub fn enqueue(&mut self, request: JobRequest, records: &RecordStore) -> Result<&WipeJob, QueueError> {
        let asset_id = required(&request.asset_id, "asset_id")?;
        let serial = required(&request.serial, "serial")?;
        let target_path = required(&request.target_path, "target_path")?;

        PathValidator::validate_target(&target_path)?;

        if self.contains(&asset_id) {
            return Err(QueueError::DuplicateAssetId {
                asset_id,
                location: DuplicateLocation::Queue,
            });
        }
        if records.contains(&asset_id) {
            return Err(QueueError::DuplicateAssetId {
                asset_id,
                location: DuplicateLocation::Records,
            });
        }

        let owner = request
            .owner
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(DEFAULT_OWNER)
            .to_string();

        let job = WipeJob {
            asset_id,
            asset_type: request.asset_type,
            serial,
            owner,
            target_path,
            standard: request.standard,
        };
        debug!(asset_id = %job.asset_id, queued = self.pending.len() + 1, "job enqueued");
        self.pending.push(job);
        Ok(&self.pending[self.pending.len() - 1])
    }

    pub fn remove(&mut self, index: usize) -> Result<WipeJob, QueueError> {
        if index >= self.pending.len() {
            return Err(QueueError::NotFound(index));
        }
        Ok(self.pending.remove(index))
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Empties the queue and hands back its contents in enqueue order.
    pub fn drain_all(&mut self) -> Vec<WipeJob> {
        std::mem::take(&mut self.pending)
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.pending.iter().any(|job| job.asset_id == asset_id)
    }

    pub fn jobs(&self) -> &[WipeJob] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn required(value: &str, field: &'static str) -> Result<String, QueueError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QueueError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    use crate::types::{AssetType, WipeRecord, WipeStandard};

    fn request(asset_id: &str, path: &Path) -> JobRequest {
        JobRequest {
            asset_id: asset_id.to_string(),
            asset_type: AssetType::Hdd,
            serial: "SN-42".to_string(),
            owner: None,
            target_path: path.to_string_lossy().into_owned(),
            standard: WipeStandard::Nist80088,
        }
    }

    fn store_in(dir: &Path) -> RecordStore {
        RecordStore::open(dir.join("records.json"))
    }

    #[test]
    fn test_enqueue_normalises_fields() {
        let dir = tempfile::tempdir().unwrap();
        let records = store_in(dir.path());
        let mut queue = JobQueue::new();

        let mut req = request("  HDD-1 ", dir.path());
        req.owner = Some("   ".to_string());
        let job = queue.enqueue(req, &records).unwrap();
        assert_eq!(job.asset_id, "HDD-1");
        assert_eq!(job.owner, DEFAULT_OWNER);
        assert_eq!(job.passes(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let records = store_in(dir.path());
        let mut queue = JobQueue::new();

        let mut req = request("", dir.path());
        assert_eq!(queue.enqueue(req.clone(), &records).unwrap_err(), QueueError::MissingField("asset_id"));

        req.asset_id = "A".to_string();
        req.serial = " ".to_string();
        assert_eq!(queue.enqueue(req.clone(), &records).unwrap_err(), QueueError::MissingField("serial"));

        req.serial = "S".to_string();
        req.target_path = String::new();
        assert_eq!(queue.enqueue(req, &records).unwrap_err(), QueueError::MissingField("target_path"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let records = store_in(dir.path());
        let mut queue = JobQueue::new();
        let result = queue.enqueue(request("A", &dir.path().join("missing")), &records);
        assert!(matches!(result, Err(QueueError::PathNotFound(_))));
    }

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = store_in(dir.path());
        let mut queue = JobQueue::new();

        queue.enqueue(request("A", dir.path()), &records).unwrap();
        assert_eq!(
            queue.enqueue(request("A", dir.path()), &records).unwrap_err(),
            QueueError::DuplicateAssetId {
                asset_id: "A".to_string(),
                location: DuplicateLocation::Queue,
            }
        );

        let job = queue.drain_all().remove(0);
        records
            .append(WipeRecord::completed(job, Utc::now(), Utc::now(), "CERT-1".to_string()))
            .unwrap();
        assert_eq!(
            queue.enqueue(request("A", dir.path()), &records).unwrap_err(),
            QueueError::DuplicateAssetId {
                asset_id: "A".to_string(),
                location: DuplicateLocation::Records,
            }
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let records = store_in(dir.path());
        let mut queue = JobQueue::new();
        for id in ["A", "B", "C"] {
            queue.enqueue(request(id, dir.path()), &records).unwrap();
        }

        assert_eq!(queue.remove(1).unwrap().asset_id, "B");
        assert_eq!(queue.remove(5).unwrap_err(), QueueError::NotFound(5));
        let ids: Vec<&str> = queue.jobs().iter().map(|j| j.asset_id.as_str()).collect();
        assert_eq!(ids, ["A", "C"]);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_all_preserves_order_and_empties() {
        let dir = tempfile::tempdir().unwrap();
        let records = store_in(dir.path());
        let mut queue = JobQueue::new();
        for id in ["first", "second", "third"] {
            queue.enqueue(request(id, dir.path()), &records).unwrap();
        }

        let drained = queue.drain_all();
        let ids: Vec<&str> = drained.iter().map(|j| j.asset_id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
        assert!(queue.is_empty());

        queue.enqueue(request("late", dir.path()), &records).unwrap();
        assert_eq!(drained.len(), 3);
        assert_eq!(queue.len(), 1);
    }
}
