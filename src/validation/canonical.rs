//! Canonical signable bytes for a diagnosis key batch.
//!
//! Every federation participant signs exactly these bytes, so the layout
//! must not change:
//!
//! ```text
//! base64(keyData) "." rollingStartIntervalNumber "." rollingPeriod "."
//! transmissionRiskLevel "." visitedCountries (sorted, ",") "." origin "."
//! reportType "." daysSinceOnsetOfSymptoms "."
//! ```
//!
//! Integers are decimal, absent optional fields are empty. Per-key records
//! are sorted by byte order and concatenated, which makes the result
//! independent of key order in the upload.

use base64::{engine::general_purpose, Engine as _};

use crate::model::{DiagnosisKey, DiagnosisKeyBatch};

const SEPARATOR: char = '.';

/// Canonical record for one key.
pub fn key_record(key: &DiagnosisKey) -> String {
    let mut visited: Vec<&str> = key.visited_countries.iter().map(String::as_str).collect();
    visited.sort_unstable();

    let fields = [
        general_purpose::STANDARD.encode(&key.key_data),
        key.rolling_start_interval_number.to_string(),
        key.rolling_period.to_string(),
        key.transmission_risk_level.to_string(),
        visited.join(","),
        key.origin.clone(),
        key.report_type.clone().unwrap_or_default(),
        key.days_since_onset_of_symptoms
            .map(|d| d.to_string())
            .unwrap_or_default(),
    ];

    let mut record = String::new();
    for field in &fields {
        record.push_str(field);
        record.push(SEPARATOR);
    }
    record
}

/// Bytes the batch signature is computed over.
pub fn signable_bytes(batch: &DiagnosisKeyBatch) -> Vec<u8> {
    let mut records: Vec<String> = batch.keys.iter().map(key_record).collect();
    records.sort_unstable();
    records.concat().into_bytes()
}
