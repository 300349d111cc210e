use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::WipeRecord;

/// Ordered, durable list of completed wipe records.
///
/// The whole list is one JSON document, read once on open and rewritten on
/// every mutation.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<WipeRecord>,
}

impl RecordStore {
    /// Opens the store at `path`, loading whatever is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load(&path);
        Self { path, records }
    }

    /// Reads the persisted document. A missing, unreadable or corrupt
    /// document yields an empty list.
    pub fn load(path: &Path) -> Vec<WipeRecord> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "record store unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<WipeRecord>>(&bytes) {
            Ok(records) => {
                debug!(path = %path.display(), count = records.len(), "record store loaded");
                records
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "record store corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Adds `record` and rewrites the document. The record stays in memory
    /// even when the write fails.
    pub fn append(&mut self, record: WipeRecord) -> Result<(), StoreError> {
        self.records.push(record);
        self.save()
    }

    /// Removes every record for `asset_id` and returns how many were removed.
    pub fn delete(&mut self, asset_id: &str) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.asset_id != asset_id);
        let removed = before - self.records.len();
        self.save()?;
        Ok(removed)
    }

    /// Writes a copy of all records to `destination`.
    pub fn export(&self, destination: &Path) -> Result<(), StoreError> {
        write_document(destination, &self.records)
    }

    pub fn records(&self) -> &[WipeRecord] {
        &self.records
    }

    pub fn get(&self, asset_id: &str) -> Option<&WipeRecord> {
        self.records.iter().find(|r| r.asset_id == asset_id)
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.get(asset_id).is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        write_document(&self.path, &self.records)
    }
}

/// Serializes `records` and replaces `path` through a sibling temp file.
fn write_document(path: &Path, records: &[WipeRecord]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, &json).map_err(io_err)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::{AssetType, WipeJob, WipeStandard};

    fn record(asset_id: &str) -> WipeRecord {
        let job = WipeJob {
            asset_id: asset_id.to_string(),
            asset_type: AssetType::Server,
            serial: format!("SN-{asset_id}"),
            owner: "Ops".to_string(),
            target_path: format!("/mnt/{asset_id}"),
            standard: WipeStandard::DoD522022M,
        };
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 9, 45, 12).unwrap();
        WipeRecord::completed(job, start, end, format!("CERT-20260301094512-{}", 1000 + asset_id.len()))
    }

    #[test]
    fn test_append_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/wipe_records.json");

        let mut store = RecordStore::open(&path);
        assert!(store.records().is_empty());
        for id in ["SRV-1", "SRV-2", "SRV-3"] {
            store.append(record(id)).unwrap();
        }

        let reopened = RecordStore::open(&path);
        assert_eq!(reopened.records(), store.records());
        let ids: Vec<&str> = reopened.records().iter().map(|r| r.asset_id.as_str()).collect();
        assert_eq!(ids, ["SRV-1", "SRV-2", "SRV-3"]);
    }

    #[test]
    fn test_corrupt_store_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wipe_records.json");
        fs::write(&path, b"{ not json ]").unwrap();

        let mut store = RecordStore::open(&path);
        assert!(store.records().is_empty());

        store.append(record("NEW")).unwrap();
        assert_eq!(RecordStore::load(&path).len(), 1);
    }

    #[test]
    fn test_delete_removes_only_matching_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wipe_records.json");
        let mut store = RecordStore::open(&path);
        for id in ["A", "B", "C"] {
            store.append(record(id)).unwrap();
        }

        assert_eq!(store.delete("B").unwrap(), 1);
        assert_eq!(store.delete("missing").unwrap(), 0);

        let reloaded = RecordStore::load(&path);
        assert_eq!(reloaded, vec![record("A"), record("C")]);
    }

    #[test]
    fn test_export_writes_identical_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("wipe_records.json"));
        store.append(record("X1")).unwrap();

        let export_path = dir.path().join("export.json");
        store.export(&export_path).unwrap();
        assert_eq!(RecordStore::load(&export_path), store.records());
        assert_eq!(
            fs::read(&export_path).unwrap(),
            fs::read(store.path()).unwrap()
        );
    }

    #[test]
    fn test_loads_document_with_offsetless_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wipe_records.json");
        fs::write(
            &path,
            r#"[
  {
    "asset_id": "LT-001",
    "type": "USB Drive",
    "serial": "USB123",
    "owner": "Finance",
    "path": "/media/usb",
    "standard": "DoD 5220.22-M",
    "passes": 3,
    "status": "completed",
    "start_time": "2024-05-01T10:00:00.123456",
    "end_time": "2024-05-01T10:04:12.654321",
    "certificate_id": "CERT-20240501100412-4821"
  }
]"#,
        )
        .unwrap();

        let mut store = RecordStore::open(&path);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].asset_id, "LT-001");
        assert_eq!(store.records()[0].end_time.timestamp(), 1_714_557_852);

        store.append(record("NEXT")).unwrap();
        let ids: Vec<String> = RecordStore::load(&path).into_iter().map(|r| r.asset_id).collect();
        assert_eq!(ids, ["LT-001", "NEXT"]);
    }

    #[test]
    fn test_unwritable_store_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the document should be makes the rename fail
        let path = dir.path().join("blocked");
        fs::create_dir_all(path.join("child")).unwrap();

        let mut store = RecordStore::open(&path);
        let result = store.append(record("Z"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.records().len(), 1);
    }
}
