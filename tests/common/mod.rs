//! Shared fixtures for upload tests.

#![allow(dead_code)]

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use ed25519_dalek::{Signer, SigningKey};

use efgs_intake::model::{
    compute_thumbprint, CertificateType, DiagnosisKey, DiagnosisKeyBatch, SignatureAlgorithm,
    TrustedCertificate,
};
use efgs_intake::trust::{CachedTrustStore, MemoryCertificateRepository};
use efgs_intake::validation::signable_bytes;
use efgs_intake::{
    BatchIntakePipeline, GatewayConfig, InMemoryKeyStore, RequestHeaders, UploadRequest,
};

pub const FIRST_BATCHTAG: &str = "20201020-0001";
pub const SECOND_BATCHTAG: &str = "20201020-0002";
pub const DN_STRING_DE: &str = "C=DE,O=Robert Koch-Institut,CN=efgs-upload";
pub const DN_STRING_FR: &str = "C=FR,O=Sante publique,CN=efgs-upload";
pub const CONTENT_TYPE: &str = "application/json; version=1.0";

pub type TestPipeline = BatchIntakePipeline<CachedTrustStore<MemoryCertificateRepository>, InMemoryKeyStore>;

pub fn auth_cert_hash() -> String {
    compute_thumbprint(b"DE authentication certificate")
}

pub fn auth_cert_hash_fr() -> String {
    compute_thumbprint(b"FR authentication certificate")
}

pub fn signing_key_de() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

pub fn signing_key_fr() -> SigningKey {
    SigningKey::from_bytes(&[43u8; 32])
}

fn certificate(
    country: &str,
    thumbprint: String,
    certificate_type: CertificateType,
    public_key: Vec<u8>,
) -> TrustedCertificate {
    TrustedCertificate {
        country: country.to_string(),
        thumbprint,
        certificate_type,
        algorithm: SignatureAlgorithm::Ed25519,
        public_key,
        valid_from: Utc::now() - ChronoDuration::days(30),
        valid_until: Utc::now() + ChronoDuration::days(30),
        revoked: false,
    }
}

pub fn certificates() -> Vec<TrustedCertificate> {
    vec![
        certificate("DE", auth_cert_hash(), CertificateType::Authentication, vec![0u8; 32]),
        certificate(
            "DE",
            compute_thumbprint(b"DE signing certificate"),
            CertificateType::Signing,
            signing_key_de().verifying_key().to_bytes().to_vec(),
        ),
        certificate("FR", auth_cert_hash_fr(), CertificateType::Authentication, vec![0u8; 32]),
        certificate(
            "FR",
            compute_thumbprint(b"FR signing certificate"),
            CertificateType::Signing,
            signing_key_fr().verifying_key().to_bytes().to_vec(),
        ),
    ]
}

pub fn pipeline() -> TestPipeline {
    pipeline_with_config(GatewayConfig::default())
}

pub fn pipeline_with_config(config: GatewayConfig) -> TestPipeline {
    let trust = CachedTrustStore::new(
        MemoryCertificateRepository::new(certificates()),
        Duration::from_secs(config.trust_cache_ttl_secs),
    );
    BatchIntakePipeline::new(config, trust, InMemoryKeyStore::new())
}

pub fn diagnosis_key() -> DiagnosisKey {
    DiagnosisKey {
        key_data: b"abcd1234abcd1234".to_vec(),
        rolling_start_interval_number: 2_673_936,
        rolling_period: 144,
        transmission_risk_level: 5,
        visited_countries: vec!["FR".to_string(), "DK".to_string()],
        origin: "DE".to_string(),
        report_type: Some("CONFIRMED_TEST".to_string()),
        days_since_onset_of_symptoms: Some(2),
    }
}

pub fn sign(batch: &DiagnosisKeyBatch, key: &SigningKey) -> String {
    general_purpose::STANDARD.encode(key.sign(&signable_bytes(batch)).to_bytes())
}

pub fn upload_request(
    batch: &DiagnosisKeyBatch,
    batch_tag: &str,
    signature: &str,
    thumbprint: &str,
    distinguished_name: &str,
) -> UploadRequest {
    let headers = RequestHeaders::from_pairs([
        ("batchTag", batch_tag),
        ("batchSignature", signature),
        ("X-SSL-Client-SHA256", thumbprint),
        ("X-SSL-Client-DN", distinguished_name),
    ]);
    let body = serde_json::to_vec(batch).expect("batch serializes");
    UploadRequest::new(headers, Some(CONTENT_TYPE), body)
}

/// Signed DE upload with a hand-written JSON body.
///
/// The signature covers the batch as the gateway decodes it.
pub fn signed_json_upload(body: &serde_json::Value, batch_tag: &str) -> UploadRequest {
    let batch: DiagnosisKeyBatch =
        serde_json::from_value(body.clone()).expect("body decodes as a batch");
    let headers = RequestHeaders::from_pairs([
        ("batchTag", batch_tag),
        ("batchSignature", sign(&batch, &signing_key_de()).as_str()),
        ("X-SSL-Client-SHA256", auth_cert_hash().as_str()),
        ("X-SSL-Client-DN", DN_STRING_DE),
    ]);
    let body = serde_json::to_vec(body).expect("body serializes");
    UploadRequest::new(headers, Some(CONTENT_TYPE), body)
}

/// Correctly authenticated and signed upload from DE.
pub fn signed_upload(batch: &DiagnosisKeyBatch, batch_tag: &str) -> UploadRequest {
    upload_request(
        batch,
        batch_tag,
        &sign(batch, &signing_key_de()),
        &auth_cert_hash(),
        DN_STRING_DE,
    )
}
