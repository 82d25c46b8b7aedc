//! Database models for diagnosis key storage.
//!
//! These models represent the structure of data in the database tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::DiagnosisKey;
use crate::pipeline::intake::UploadReport;

/// Represents an accepted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub origin: String,
    pub batch_tag: String,
    pub upload_id: String,
    pub received_at: DateTime<Utc>,
    pub content_hash: String,
    pub signing_thumbprint: String,
    /// JSON-encoded `UploadReport`.
    pub report: String,
}

impl BatchRecord {
    pub fn from_report(report: &UploadReport) -> Result<Self, serde_json::Error> {
        Ok(Self {
            origin: report.origin.clone(),
            batch_tag: report.batch_tag.clone(),
            upload_id: report.upload_id.clone(),
            received_at: report.received_at,
            content_hash: report.content_hash.clone(),
            signing_thumbprint: report.signing_thumbprint.clone(),
            report: serde_json::to_string(report)?,
        })
    }

    pub fn decode_report(&self) -> Result<UploadReport, serde_json::Error> {
        serde_json::from_str(&self.report)
    }
}

/// Represents one accepted diagnosis key row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub origin: String,
    pub batch_tag: String,
    pub key_data_hex: String,
    pub rolling_start_interval_number: i64,
    pub rolling_period: i64,
    pub transmission_risk_level: i64,
    pub visited_countries: Vec<String>,
    pub report_type: Option<String>,
    pub days_since_onset_of_symptoms: Option<i64>,
}

impl KeyRecord {
    pub fn from_key(key: &DiagnosisKey, batch_tag: &str) -> Self {
        Self {
            origin: key.origin.clone(),
            batch_tag: batch_tag.to_string(),
            key_data_hex: hex::encode(&key.key_data),
            rolling_start_interval_number: key.rolling_start_interval_number,
            rolling_period: key.rolling_period,
            transmission_risk_level: key.transmission_risk_level,
            visited_countries: key.visited_countries.clone(),
            report_type: key.report_type.clone(),
            days_since_onset_of_symptoms: key.days_since_onset_of_symptoms,
        }
    }
}
