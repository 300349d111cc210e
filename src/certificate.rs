use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::types::{WipeRecord, WipeStatus};

const RULE_WIDTH: usize = 75;
const ISSUER: &str = "Multi-Asset Secure Data Wipe System";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Builds a certificate id of the form `CERT-<YYYYmmddHHMMSS>-<NNNN>`.
pub fn generate_certificate_id(at: DateTime<Utc>) -> String {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 4];
    let entropy = match rng.fill(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes),
        Err(_) => at.timestamp_subsec_nanos(),
    };
    format!("CERT-{}-{}", at.format("%Y%m%d%H%M%S"), 1000 + entropy % 9000)
}

/// SHA-256 over the record's fields, one `key:value` line each.
pub fn record_fingerprint(record: &WipeRecord) -> String {
    let canonical = format!(
        "CERT_ID:{}\nASSET_ID:{}\nTYPE:{}\nSERIAL:{}\nOWNER:{}\nPATH:{}\nSTANDARD:{}\nPASSES:{}\nSTATUS:{}\nSTART:{}\nEND:{}",
        record.certificate_id,
        record.asset_id,
        record.asset_type,
        record.serial,
        record.owner,
        record.path,
        record.standard,
        record.passes,
        record.status.label(),
        record.start_time.to_rfc3339(),
        record.end_time.to_rfc3339(),
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Renders the plain-text attestation for a completed record.
///
/// Output depends only on `record`.
pub fn format_certificate(record: &WipeRecord) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    let mut cert = String::new();
    cert.push_str(&heavy);
    cert.push('\n');
    cert.push_str(&format!("{:^width$}\n", "DATA WIPE CERTIFICATE", width = RULE_WIDTH));
    cert.push_str(&heavy);
    cert.push_str("\n\n");

    cert.push_str(&format!("Certificate ID:  {}\n", record.certificate_id));
    cert.push_str(&format!("Date:            {}\n\n", record.end_time.format(TIME_FORMAT)));

    cert.push_str(&format!("ASSET INFORMATION\n{light}\n"));
    cert.push_str(&format!("Asset ID:        {}\n", record.asset_id));
    cert.push_str(&format!("Type:            {}\n", record.asset_type));
    cert.push_str(&format!("Serial Number:   {}\n", record.serial));
    cert.push_str(&format!("Owner:           {}\n\n", record.owner));

    cert.push_str(&format!("WIPE DETAILS\n{light}\n"));
    cert.push_str(&format!("Standard:        {}\n", record.standard));
    cert.push_str(&format!("Passes:          {}\n", record.passes));
    cert.push_str(&format!("Path Wiped:      {}\n", record.path));
    cert.push_str(&format!("Start Time:      {}\n", record.start_time.format(TIME_FORMAT)));
    cert.push_str(&format!("End Time:        {}\n", record.end_time.format(TIME_FORMAT)));
    cert.push_str(&format!("Status:          {}\n\n", status_text(record.status)));

    cert.push_str(&format!("CERTIFICATION\n{light}\n"));
    cert.push_str(&format!(
        "This certificate verifies that all data at the above path has been\n\
         permanently erased using the {} standard with {} overwrite\n\
         pass(es). The data is considered unrecoverable and the device is\n\
         ready for secure disposal or repurposing.\n\n",
        record.standard, record.passes
    ));

    cert.push_str(&format!("Record Fingerprint (SHA-256):\n{}\n\n", record_fingerprint(record)));
    cert.push_str(&heavy);
    cert.push('\n');
    cert.push_str(&format!("Generated by: {ISSUER}\n"));
    cert.push_str(&heavy);
    cert.push('\n');
    cert
}

fn status_text(status: WipeStatus) -> &'static str {
    match status {
        WipeStatus::Completed => "SUCCESSFULLY COMPLETED",
        WipeStatus::Failed => status.label(),
    }
}

/// File name a certificate is saved under.
pub fn certificate_file_name(record: &WipeRecord) -> String {
    format!("{}.txt", record.certificate_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::types::{AssetType, WipeJob, WipeStandard};

    fn sample_record() -> WipeRecord {
        let job = WipeJob {
            asset_id: "LAP-2291".to_string(),
            asset_type: AssetType::Laptop,
            serial: "5CG1234XYZ".to_string(),
            owner: "Finance".to_string(),
            target_path: "/media/usb0".to_string(),
            standard: WipeStandard::DoD522022M,
        };
        WipeRecord::completed(
            job,
            Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 1, 8, 12, 30).unwrap(),
            "CERT-20261001081230-4821".to_string(),
        )
    }

    #[test]
    fn test_certificate_is_deterministic() {
        let record = sample_record();
        assert_eq!(format_certificate(&record), format_certificate(&record.clone()));
    }

    #[test]
    fn test_certificate_contents() {
        let cert = format_certificate(&sample_record());
        for expected in [
            "DATA WIPE CERTIFICATE",
            "Certificate ID:  CERT-20261001081230-4821",
            "Asset ID:        LAP-2291",
            "Type:            Laptop",
            "Serial Number:   5CG1234XYZ",
            "Owner:           Finance",
            "Standard:        DoD 5220.22-M",
            "Passes:          3",
            "Path Wiped:      /media/usb0",
            "Start Time:      2026-10-01 08:00:00 UTC",
            "End Time:        2026-10-01 08:12:30 UTC",
            "Status:          SUCCESSFULLY COMPLETED",
            "using the DoD 5220.22-M standard with 3 overwrite",
        ] {
            assert!(cert.contains(expected), "certificate missing {expected:?}");
        }
    }

    #[test]
    fn test_failed_status_line() {
        let mut record = sample_record();
        record.status = WipeStatus::Failed;
        let cert = format_certificate(&record);
        assert!(cert.contains("Status:          FAILED\n"));
        assert!(!cert.contains("SUCCESSFULLY"));
    }

    #[test]
    fn test_fingerprint_tracks_record_fields() {
        let record = sample_record();
        let mut altered = record.clone();
        altered.serial.push('!');
        assert_eq!(record_fingerprint(&record).len(), 64);
        assert_ne!(record_fingerprint(&record), record_fingerprint(&altered));
    }

    #[test]
    fn test_certificate_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 14, 5, 9).unwrap();
        for _ in 0..50 {
            let id = generate_certificate_id(at);
            let parts: Vec<&str> = id.split('-').collect();
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], "CERT");
            assert_eq!(parts[1], "20261016140509");
            let suffix: u32 = parts[2].parse().unwrap();
            assert!((1000..=9999).contains(&suffix));
        }
    }

    #[test]
    fn test_certificate_file_name() {
        assert_eq!(certificate_file_name(&sample_record()), "CERT-20261001081230-4821.txt");
    }
}
