use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ed25519_dalek::{Signer, SigningKey};

use efgs_intake::model::{
    compute_thumbprint, CertificateType, DiagnosisKey, DiagnosisKeyBatch, SignatureAlgorithm,
    TrustedCertificate,
};
use efgs_intake::trust::{CachedTrustStore, MemoryCertificateRepository};
use efgs_intake::validation::{signable_bytes, FieldValidator, RuleContext};
use efgs_intake::{
    BatchIntakePipeline, GatewayConfig, InMemoryKeyStore, RequestHeaders, UploadRequest,
};

fn key(i: u32) -> DiagnosisKey {
    let mut key_data = b"abcd1234abcd0000".to_vec();
    key_data[12..].copy_from_slice(&i.to_be_bytes());
    DiagnosisKey {
        key_data,
        rolling_start_interval_number: 2_673_936,
        rolling_period: 144,
        transmission_risk_level: (i % 10) as i64,
        visited_countries: vec!["FR".to_string(), "DK".to_string()],
        origin: "DE".to_string(),
        report_type: Some("CONFIRMED_TEST".to_string()),
        days_since_onset_of_symptoms: Some(2),
    }
}

fn batch(size: u32) -> DiagnosisKeyBatch {
    DiagnosisKeyBatch::new((0..size).map(key).collect())
}

fn certificate(thumbprint: String, certificate_type: CertificateType, public_key: Vec<u8>) -> TrustedCertificate {
    TrustedCertificate {
        country: "DE".to_string(),
        thumbprint,
        certificate_type,
        algorithm: SignatureAlgorithm::Ed25519,
        public_key,
        valid_from: Utc::now() - ChronoDuration::days(1),
        valid_until: Utc::now() + ChronoDuration::days(1),
        revoked: false,
    }
}

fn bench_validation(c: &mut Criterion) {
    let validator = FieldValidator::default();
    let ctx = RuleContext {
        uploader_country: "DE",
    };
    let keys = batch(1000).keys;

    c.bench_function("validate_1000_keys", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(validator.validate(key, &ctx));
            }
        })
    });
}

fn bench_canonical(c: &mut Criterion) {
    let batch = batch(1000);
    c.bench_function("signable_bytes_1000_keys", |b| {
        b.iter(|| black_box(signable_bytes(&batch)))
    });
}

fn bench_upload(c: &mut Criterion) {
    let signing_key = SigningKey::from_bytes(&[42u8; 32]);
    let auth_thumbprint = compute_thumbprint(b"bench auth");
    let certificates = vec![
        certificate(auth_thumbprint.clone(), CertificateType::Authentication, vec![0u8; 32]),
        certificate(
            compute_thumbprint(b"bench signing"),
            CertificateType::Signing,
            signing_key.verifying_key().to_bytes().to_vec(),
        ),
    ];

    let batch = batch(500);
    let signature = general_purpose::STANDARD.encode(signing_key.sign(&signable_bytes(&batch)).to_bytes());
    let body = serde_json::to_vec(&batch).unwrap();

    let trust = CachedTrustStore::new(
        MemoryCertificateRepository::new(certificates),
        Duration::from_secs(300),
    );
    let pipeline = BatchIntakePipeline::new(GatewayConfig::default(), trust, InMemoryKeyStore::new());

    let mut counter = 0u64;
    c.bench_function("process_upload_500_keys", |b| {
        b.iter_batched(
            || {
                counter += 1;
                let tag = format!("bench-{}", counter);
                UploadRequest::new(
                    RequestHeaders::from_pairs([
                        ("batchTag", tag.as_str()),
                        ("batchSignature", signature.as_str()),
                        ("X-SSL-Client-SHA256", auth_thumbprint.as_str()),
                        ("X-SSL-Client-DN", "C=DE,CN=bench"),
                    ]),
                    Some("application/json; version=1.0"),
                    body.clone(),
                )
            },
            |request| black_box(pipeline.process_upload(&request)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_validation, bench_canonical, bench_upload);
criterion_main!(benches);
