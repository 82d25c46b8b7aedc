//! Diagnosis key and batch models.
//!
//! These mirror the JSON upload format (`application/json; version=1.0`).
//! Key material travels as standard base64.
//!
//! Decoding one key never fails: a field that cannot be represented decodes
//! to a value the field rules reject, so a broken key is rejected on its own
//! instead of taking its siblings down with it.

use serde::{Deserialize, Serialize};

/// Required length of `key_data` in bytes.
pub const KEY_DATA_LENGTH: usize = 16;

/// One diagnosis key as uploaded by a national backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisKey {
    #[serde(
        serialize_with = "lenient::serialize_key_data",
        deserialize_with = "lenient::key_data",
        default
    )]
    pub key_data: Vec<u8>,
    #[serde(deserialize_with = "lenient::integer", default)]
    pub rolling_start_interval_number: i64,
    #[serde(deserialize_with = "lenient::integer", default)]
    pub rolling_period: i64,
    #[serde(deserialize_with = "lenient::integer", default)]
    pub transmission_risk_level: i64,
    #[serde(deserialize_with = "lenient::strings", default)]
    pub visited_countries: Vec<String>,
    #[serde(deserialize_with = "lenient::string", default)]
    pub origin: String,
    #[serde(
        deserialize_with = "lenient::optional_string",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub report_type: Option<String>,
    #[serde(
        deserialize_with = "lenient::optional_integer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub days_since_onset_of_symptoms: Option<i64>,
}

/// Ordered sequence of keys submitted in one upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosisKeyBatch {
    #[serde(default)]
    pub keys: Vec<DiagnosisKey>,
}

impl DiagnosisKeyBatch {
    pub fn new(keys: Vec<DiagnosisKey>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Report types known to the federation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Unknown,
    ConfirmedTest,
    ConfirmedClinicalDiagnosis,
    SelfReport,
    Recursive,
    Revoked,
}

impl ReportType {
    pub const ALL: [ReportType; 6] = [
        ReportType::Unknown,
        ReportType::ConfirmedTest,
        ReportType::ConfirmedClinicalDiagnosis,
        ReportType::SelfReport,
        ReportType::Recursive,
        ReportType::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Unknown => "UNKNOWN",
            ReportType::ConfirmedTest => "CONFIRMED_TEST",
            ReportType::ConfirmedClinicalDiagnosis => "CONFIRMED_CLINICAL_DIAGNOSIS",
            ReportType::SelfReport => "SELF_REPORT",
            ReportType::Recursive => "RECURSIVE",
            ReportType::Revoked => "REVOKED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|rt| rt.as_str() == name)
    }
}

/// Integer value standing in for a number that is not a valid integer.
/// Every integer rule rejects it.
pub const UNREPRESENTABLE: i64 = i64::MIN;

mod lenient {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use super::UNREPRESENTABLE;

    pub fn serialize_key_data<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    /// Undecodable key data becomes empty and fails the length rule.
    pub fn key_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(encoded) => general_purpose::STANDARD
                .decode(encoded.trim().as_bytes())
                .unwrap_or_default(),
            _ => Vec::new(),
        })
    }

    fn to_integer(value: &Value) -> i64 {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|_| i64::MAX))
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                        .map(|f| f as i64)
                })
                .unwrap_or(UNREPRESENTABLE),
            _ => UNREPRESENTABLE,
        }
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => 0,
            value => to_integer(&value),
        })
    }

    pub fn optional_integer<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => None,
            value => Some(to_integer(&value)),
        })
    }

    /// Non-string values decode to an empty string, which no country matches.
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Non-string entries are kept in their JSON form and fail the country
    /// code rule.
    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_json() {
        let json = r#"{
            "keyData": "YWJjZDEyMzRhYmNkMTIzNA==",
            "rollingStartIntervalNumber": 2673936,
            "rollingPeriod": 144,
            "transmissionRiskLevel": 5,
            "visitedCountries": ["DE", "FR"],
            "origin": "DE",
            "reportType": "CONFIRMED_TEST",
            "daysSinceOnsetOfSymptoms": 2
        }"#;

        let key: DiagnosisKey = serde_json::from_str(json).unwrap();
        assert_eq!(key.key_data, b"abcd1234abcd1234".to_vec());
        assert_eq!(key.rolling_period, 144);
        assert_eq!(key.visited_countries, vec!["DE", "FR"]);
        assert_eq!(key.report_type.as_deref(), Some("CONFIRMED_TEST"));
    }

    #[test]
    fn test_undecodable_fields_stay_per_key() {
        let json = r#"{
            "keyData": "***",
            "rollingStartIntervalNumber": "soon",
            "rollingPeriod": 1.5,
            "transmissionRiskLevel": 4294967296,
            "visitedCountries": "FR",
            "origin": 49,
            "reportType": 3,
            "daysSinceOnsetOfSymptoms": 99999999999999999999999
        }"#;

        let key: DiagnosisKey = serde_json::from_str(json).unwrap();
        assert!(key.key_data.is_empty());
        assert_eq!(key.rolling_start_interval_number, UNREPRESENTABLE);
        assert_eq!(key.rolling_period, UNREPRESENTABLE);
        assert_eq!(key.transmission_risk_level, 4_294_967_296);
        assert_eq!(key.visited_countries, vec!["\"FR\"".to_string()]);
        assert_eq!(key.origin, "");
        assert_eq!(key.report_type.as_deref(), Some("3"));
        assert_eq!(key.days_since_onset_of_symptoms, Some(UNREPRESENTABLE));
    }

    #[test]
    fn test_key_json_keeps_wire_format() {
        let key = DiagnosisKey {
            key_data: b"abcd1234abcd1234".to_vec(),
            rolling_start_interval_number: 1,
            rolling_period: 144,
            transmission_risk_level: 2,
            visited_countries: Vec::new(),
            origin: "DE".to_string(),
            report_type: None,
            days_since_onset_of_symptoms: None,
        };
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["keyData"], "YWJjZDEyMzRhYmNkMTIzNA==");
        assert_eq!(json["rollingPeriod"], 144);
        assert!(json.get("reportType").is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        // Absent fields decode to zero values so the field rules can reject
        // them per key instead of failing the whole payload.
        let key: DiagnosisKey = serde_json::from_str(r#"{"origin": "DE"}"#).unwrap();
        assert!(key.key_data.is_empty());
        assert_eq!(key.rolling_start_interval_number, 0);
        assert_eq!(key.days_since_onset_of_symptoms, None);
    }

    #[test]
    fn test_invalid_base64_decodes_empty() {
        let key: DiagnosisKey = serde_json::from_str(r#"{"keyData": "!!not base64"}"#).unwrap();
        assert!(key.key_data.is_empty());
    }

    #[test]
    fn test_non_object_key_fails_batch() {
        let result: Result<DiagnosisKeyBatch, _> = serde_json::from_str(r#"{"keys": [3]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_report_type_names() {
        assert_eq!(ReportType::from_name("SELF_REPORT"), Some(ReportType::SelfReport));
        assert_eq!(ReportType::from_name("self_report"), None);
        assert_eq!(ReportType::Revoked.as_str(), "REVOKED");
    }
}
