use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Owner recorded when the caller leaves it blank.
pub const DEFAULT_OWNER: &str = "N/A";

/// Kind of IT asset the erased storage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Laptop,
    Desktop,
    #[serde(rename = "SSD")]
    Ssd,
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "USB Drive", alias = "USBDrive")]
    UsbDrive,
    Server,
}

impl AssetType {
    pub const ALL: [AssetType; 6] = [
        AssetType::Laptop,
        AssetType::Desktop,
        AssetType::Ssd,
        AssetType::Hdd,
        AssetType::UsbDrive,
        AssetType::Server,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AssetType::Laptop => "Laptop",
            AssetType::Desktop => "Desktop",
            AssetType::Ssd => "SSD",
            AssetType::Hdd => "HDD",
            AssetType::UsbDrive => "USB Drive",
            AssetType::Server => "Server",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        AssetType::ALL
            .into_iter()
            .find(|t| t.name().replace(' ', "").to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown asset type: {s}"))
    }
}

/// Overwrite policy. Each standard fixes its pass count; the byte pattern
/// of a pass depends only on the pass index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WipeStandard {
    #[serde(rename = "DoD 5220.22-M", alias = "dod")]
    DoD522022M,
    #[serde(rename = "NIST 800-88", alias = "nist")]
    Nist80088,
    #[serde(rename = "Random 7-Pass", alias = "random7")]
    Random7Pass,
    #[serde(rename = "Quick Wipe", alias = "quick")]
    QuickWipe,
}

/// Standard, display name, CLI slug, pass count, description.
static STANDARD_TABLE: [(WipeStandard, &str, &str, u32, &str); 4] = [
    (WipeStandard::DoD522022M, "DoD 5220.22-M", "dod", 3, "Military Standard"),
    (WipeStandard::Nist80088, "NIST 800-88", "nist", 1, "Fast & Secure"),
    (WipeStandard::Random7Pass, "Random 7-Pass", "random7", 7, "Maximum Security"),
    (WipeStandard::QuickWipe, "Quick Wipe", "quick", 1, "Basic"),
];

impl WipeStandard {
    pub const ALL: [WipeStandard; 4] = [
        WipeStandard::DoD522022M,
        WipeStandard::Nist80088,
        WipeStandard::Random7Pass,
        WipeStandard::QuickWipe,
    ];

    fn entry(&self) -> &'static (WipeStandard, &'static str, &'static str, u32, &'static str) {
        // The table holds one row per variant, in declaration order.
        &STANDARD_TABLE[*self as usize]
    }

    pub fn passes(&self) -> u32 {
        self.entry().3
    }

    pub fn name(&self) -> &'static str {
        self.entry().1
    }

    pub fn slug(&self) -> &'static str {
        self.entry().2
    }

    pub fn description(&self) -> &'static str {
        self.entry().4
    }
}

impl fmt::Display for WipeStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WipeStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        STANDARD_TABLE
            .iter()
            .find(|(_, name, slug, _, _)| name.eq_ignore_ascii_case(s) || slug.eq_ignore_ascii_case(s))
            .map(|row| row.0)
            .ok_or_else(|| format!("unknown wipe standard: {s}"))
    }
}

/// Caller-supplied fields for a new job, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub asset_id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub serial: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(rename = "path")]
    pub target_path: String,
    pub standard: WipeStandard,
}

/// A validated erasure request sitting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeJob {
    pub asset_id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub serial: String,
    pub owner: String,
    #[serde(rename = "path")]
    pub target_path: String,
    pub standard: WipeStandard,
}

impl WipeJob {
    pub fn passes(&self) -> u32 {
        self.standard.passes()
    }

    /// One-line queue listing.
    pub fn summary(&self) -> String {
        format!(
            "{} | {} | {} | {} | {}",
            self.asset_id, self.asset_type, self.serial, self.standard, self.target_path
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeStatus {
    Completed,
    Failed,
}

impl WipeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WipeStatus::Completed => "COMPLETED",
            WipeStatus::Failed => "FAILED",
        }
    }
}

/// Durable outcome of a finished job. Field order and names form the
/// persisted and exported document layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeRecord {
    pub asset_id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub serial: String,
    pub owner: String,
    pub path: String,
    pub standard: WipeStandard,
    pub passes: u32,
    pub status: WipeStatus,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end_time: DateTime<Utc>,
    pub certificate_id: String,
}

/// Reads an RFC 3339 timestamp, or an ISO 8601 one without offset taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl WipeRecord {
    pub fn completed(
        job: WipeJob,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        certificate_id: String,
    ) -> Self {
        let passes = job.passes();
        Self {
            asset_id: job.asset_id,
            asset_type: job.asset_type,
            serial: job.serial,
            owner: job.owner,
            path: job.target_path,
            standard: job.standard,
            passes,
            status: WipeStatus::Completed,
            start_time,
            end_time,
            certificate_id,
        }
    }
}

/// Per-job progress, pushed while a target is being overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub asset_id: String,
    pub percent: f32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub asset_id: String,
    pub reason: String,
}

/// Failures listed individually in a batch summary.
pub const SUMMARY_FAILURE_PREVIEW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed_count: usize,
    /// At most [`SUMMARY_FAILURE_PREVIEW`] entries, in processing order.
    pub failed: Vec<FailedJob>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

/// Events a running batch pushes to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WipeEvent {
    JobStarted { asset_id: String, index: usize, total: usize },
    JobProgress(JobProgress),
    FileFailed { asset_id: String, path: String, reason: String },
    JobCompleted { asset_id: String, certificate_id: String },
    JobFailed(FailedJob),
    /// The target was wiped but its record could not be written to disk.
    PersistFailed { asset_id: String, reason: String },
    BatchProgress { completed: usize, total: usize },
    BatchCompleted(BatchSummary),
}
