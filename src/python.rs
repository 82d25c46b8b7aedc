//! Python extension surface.
//!
//! The host web service terminates HTTP, owns the database connection and
//! calls into this module once per upload. Certificates and configuration
//! are pushed in by the host and kept in process-wide state here; the core
//! pipeline itself holds no globals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::config::GatewayConfig;
use crate::error::StoreError;
use crate::model::{CertificateRecord, DiagnosisKey};
use crate::pipeline::{BatchIntakePipeline, RequestHeaders, UploadReport, UploadRequest};
use crate::storage::{self, DiagnosisKeyStore, InsertOutcome};
use crate::trust::{CachedTrustStore, MemoryCertificateRepository};
use crate::validation::rules::ValidationOutcome;

type SharedTrustStore = Arc<CachedTrustStore<Arc<MemoryCertificateRepository>>>;

lazy_static! {
    static ref CONFIG: RwLock<GatewayConfig> = RwLock::new(GatewayConfig::default());
    static ref CERTIFICATES: Arc<MemoryCertificateRepository> =
        Arc::new(MemoryCertificateRepository::default());
    static ref TRUST_STORE: RwLock<SharedTrustStore> = RwLock::new(new_trust_store(
        GatewayConfig::default().trust_cache_ttl_secs
    ));
}

fn new_trust_store(ttl_secs: u64) -> SharedTrustStore {
    Arc::new(CachedTrustStore::new(
        CERTIFICATES.clone(),
        Duration::from_secs(ttl_secs),
    ))
}

/// Adapter calling the host's store object.
///
/// The object must provide `exists(origin, batch_tag) -> bool`,
/// `recorded_outcome(origin, batch_tag) -> str | None` and
/// `insert_all(origin, batch_tag, keys_json, report_json) -> bool`
/// (False when the unique constraint rejected the batch).
struct PyKeyStore<'py> {
    store: &'py PyAny,
}

fn backend_error(e: PyErr) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl DiagnosisKeyStore for PyKeyStore<'_> {
    fn exists(&self, origin: &str, batch_tag: &str) -> Result<bool, StoreError> {
        self.store
            .call_method1("exists", (origin, batch_tag))
            .and_then(|v| v.extract::<bool>())
            .map_err(backend_error)
    }

    fn recorded_outcome(
        &self,
        origin: &str,
        batch_tag: &str,
    ) -> Result<Option<UploadReport>, StoreError> {
        let raw: Option<String> = self
            .store
            .call_method1("recorded_outcome", (origin, batch_tag))
            .and_then(|v| v.extract())
            .map_err(backend_error)?;

        raw.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::Decode(e.to_string())))
            .transpose()
    }

    fn insert_all(
        &self,
        origin: &str,
        batch_tag: &str,
        keys: &[DiagnosisKey],
        report: &UploadReport,
    ) -> Result<InsertOutcome, StoreError> {
        let keys_json = serde_json::to_string(keys).map_err(|e| StoreError::Backend(e.to_string()))?;
        let report_json =
            serde_json::to_string(report).map_err(|e| StoreError::Backend(e.to_string()))?;

        let inserted: bool = self
            .store
            .call_method1("insert_all", (origin, batch_tag, keys_json, report_json))
            .and_then(|v| v.extract())
            .map_err(backend_error)?;

        if inserted {
            return Ok(InsertOutcome::Inserted);
        }

        match self.recorded_outcome(origin, batch_tag)? {
            Some(previous) => Ok(InsertOutcome::Duplicate(previous)),
            None => Err(StoreError::Backend(
                "insert reported a duplicate but no outcome is recorded".to_string(),
            )),
        }
    }
}

/// Initialize the module-level logger
fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}

/// Process one diagnosis key upload.
///
/// # Arguments
/// * `headers` - Request headers (names are matched case-insensitively)
/// * `content_type` - Request content type
/// * `body` - Raw request body
/// * `store` - Host object implementing the key store calls
///
/// # Returns
/// Dict with `status` plus either the per-key report or `error_code`/`error`
#[pyfunction]
#[pyo3(signature = (headers, content_type, body, store))]
fn process_diagnosis_key_upload(
    py: Python<'_>,
    headers: HashMap<String, String>,
    content_type: Option<String>,
    body: &[u8],
    store: &PyAny,
) -> PyResult<Py<PyAny>> {
    init_logger();

    let config = CONFIG.read().clone();
    let trust = TRUST_STORE.read().clone();
    let pipeline = BatchIntakePipeline::new(config, trust, PyKeyStore { store });

    let request = UploadRequest::new(
        RequestHeaders::from(headers),
        content_type.as_deref(),
        body.to_vec(),
    );

    let py_result = PyDict::new(py);
    match pipeline.process_upload(&request) {
        Ok(report) => {
            py_result.set_item("status", report.status_code())?;
            py_result.set_item("upload_id", &report.upload_id)?;
            py_result.set_item("origin", &report.origin)?;
            py_result.set_item("batch_tag", &report.batch_tag)?;
            py_result.set_item("received_count", report.received_count)?;
            py_result.set_item("accepted_count", report.accepted_count)?;
            py_result.set_item("rejected_count", report.rejected_count)?;
            py_result.set_item("replayed", report.replayed)?;

            let keys_list = PyList::empty(py);
            for key in &report.keys {
                let key_dict = PyDict::new(py);
                key_dict.set_item("index", key.index)?;
                match key.outcome {
                    ValidationOutcome::Accepted => key_dict.set_item("status", "Accepted")?,
                    ValidationOutcome::Rejected(reason) => {
                        key_dict.set_item("status", "Rejected")?;
                        key_dict.set_item("reason", reason.as_str())?;
                    }
                }
                keys_list.append(key_dict)?;
            }
            py_result.set_item("keys", keys_list)?;
        }
        Err(e) => {
            py_result.set_item("status", e.status_code())?;
            py_result.set_item("error_code", e.code())?;
            py_result.set_item("error", e.to_string())?;
        }
    }

    Ok(py_result.into())
}

/// Replace the gateway configuration.
///
/// Rebuilds the certificate cache when the TTL changes.
#[pyfunction]
fn configure_gateway(config_json: &str) -> PyResult<()> {
    init_logger();

    let config = GatewayConfig::from_json_str(config_json)
        .map_err(|e| PyValueError::new_err(format!("{:#}", e)))?;

    let mut current = CONFIG.write();
    if current.trust_cache_ttl_secs != config.trust_cache_ttl_secs {
        *TRUST_STORE.write() = new_trust_store(config.trust_cache_ttl_secs);
    }
    *current = config;

    log::info!("GATEWAY_CONFIGURED");
    Ok(())
}

/// Load certificates from database into the repository.
///
/// # Arguments
/// * `rows` - (country, thumbprint, certificate_type, algorithm,
///   public_key_base64, valid_from, valid_until, revoked)
#[pyfunction]
#[allow(clippy::type_complexity)]
fn load_certificates_from_db(
    rows: Vec<(String, String, String, String, String, String, String, bool)>,
) -> PyResult<usize> {
    init_logger();

    let mut records = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (country, thumbprint, certificate_type, algorithm, public_key, valid_from, valid_until, revoked) in rows {
        let row = serde_json::json!({
            "country": country,
            "thumbprint": thumbprint,
            "certificate_type": certificate_type,
            "algorithm": algorithm,
            "public_key_base64": public_key,
            "valid_from": valid_from,
            "valid_until": valid_until,
            "revoked": revoked,
        });
        match serde_json::from_value::<CertificateRecord>(row) {
            Ok(record) => records.push(record),
            Err(e) => errors.push(format!("{}: {}", thumbprint, e)),
        }
    }

    errors.extend(
        CERTIFICATES
            .replace_records(records)
            .into_iter()
            .map(|e| e.to_string()),
    );

    let trust = TRUST_STORE.read().clone();
    trust.invalidate();
    let loaded = CERTIFICATES.len();

    log::info!(
        "CERTIFICATES_LOADED certificates={} errors={}",
        loaded,
        errors.len()
    );

    if !errors.is_empty() {
        log::warn!("CERTIFICATE_LOAD_ERRORS: {:?}", errors);
    }

    Ok(loaded)
}

/// Refresh the certificate cache.
#[pyfunction]
fn refresh_certificate_cache() -> PyResult<usize> {
    init_logger();
    let trust = TRUST_STORE.read().clone();
    trust
        .refresh()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Check if the certificate cache needs refresh (TTL expired).
///
/// Returns (needs_refresh, cache_age_secs, cached_certificates)
#[pyfunction]
fn check_cache_status() -> PyResult<(bool, Option<u64>, usize)> {
    let trust = TRUST_STORE.read().clone();
    Ok((
        trust.needs_refresh(),
        trust.cache_age_secs(),
        trust.certificate_count(),
    ))
}

/// SQL statements the host executes for `store` calls.
#[pyfunction]
fn get_storage_queries(py: Python<'_>) -> PyResult<Py<PyAny>> {
    let queries = PyDict::new(py);
    queries.set_item("schema", storage::build_schema_ddl())?;
    queries.set_item("batch_insert", storage::build_batch_insert())?;
    queries.set_item("key_insert", storage::build_diagnosis_key_insert())?;
    queries.set_item("batch_exists", storage::build_batch_exists())?;
    queries.set_item("recorded_outcome", storage::build_recorded_outcome_select())?;
    Ok(queries.into())
}

/// Python module definition
#[pymodule]
fn efgs_intake(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(process_diagnosis_key_upload, m)?)?;
    m.add_function(wrap_pyfunction!(configure_gateway, m)?)?;
    m.add_function(wrap_pyfunction!(load_certificates_from_db, m)?)?;
    m.add_function(wrap_pyfunction!(refresh_certificate_cache, m)?)?;
    m.add_function(wrap_pyfunction!(check_cache_status, m)?)?;
    m.add_function(wrap_pyfunction!(get_storage_queries, m)?)?;
    Ok(())
}
