//! Diagnosis key batch intake pipeline.
//!
//! Coordinates one upload request:
//! 1. Caller authentication (certificate headers)
//! 2. Payload parsing
//! 3. Batch signature verification
//! 4. Batch tag idempotency check
//! 5. Per-key field validation
//! 6. Persistence of accepted keys
//! 7. Per-key outcome report
//!
//! Steps 1-3 are request-fatal. Step 5 never fails the request: a batch
//! whose keys are all rejected is still a successful upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::IntakeError;
use crate::logging::structured::LogContext;
use crate::model::DiagnosisKey;
use crate::storage::{DiagnosisKeyStore, InsertOutcome};
use crate::trust::identity::{CallerIdentity, IdentityResolver};
use crate::trust::store::CertificateTrustStore;
use crate::validation::canonical::signable_bytes;
use crate::validation::rules::{FieldValidator, RuleContext, ValidationOutcome};
use crate::validation::signature::{compute_hash, SignatureVerifier};

use super::context::UploadContext;
use super::request::{parse_upload, UploadRequest};

/// Outcome of one key, keyed by its position in the upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyOutcome {
    pub index: usize,
    pub outcome: ValidationOutcome,
}

/// Result of processing an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub upload_id: String,
    pub origin: String,
    pub batch_tag: String,
    pub received_at: DateTime<Utc>,
    /// SHA-256 of the canonical signable bytes.
    pub content_hash: String,
    pub signing_thumbprint: String,
    pub received_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub keys: Vec<KeyOutcome>,
    /// Set when this report was recorded by an earlier upload of the same
    /// batch tag.
    #[serde(default)]
    pub replayed: bool,
}

impl UploadReport {
    /// 201 when every key was accepted, 207 for partial acceptance.
    pub fn status_code(&self) -> u16 {
        if self.rejected_count == 0 {
            201
        } else {
            207
        }
    }

    fn replay(mut self) -> Self {
        self.replayed = true;
        self
    }
}

pub struct BatchIntakePipeline<T, S> {
    config: GatewayConfig,
    validator: FieldValidator,
    trust: T,
    store: S,
}

impl<T: CertificateTrustStore, S: DiagnosisKeyStore> BatchIntakePipeline<T, S> {
    pub fn new(config: GatewayConfig, trust: T, store: S) -> Self {
        let validator = FieldValidator::new(config.enabled_rules.iter().copied());
        Self {
            config,
            validator,
            trust,
            store,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn trust_store(&self) -> &T {
        &self.trust
    }

    pub fn key_store(&self) -> &S {
        &self.store
    }

    /// Process one upload request.
    pub fn process_upload(&self, request: &UploadRequest) -> Result<UploadReport, IntakeError> {
        self.process_upload_with_context(&UploadContext::new(), request)
    }

    pub fn process_upload_with_context(
        &self,
        upload: &UploadContext,
        request: &UploadRequest,
    ) -> Result<UploadReport, IntakeError> {
        let ctx = upload.log_context();
        log::info!("{} UPLOAD_RECEIVED body_bytes={}", ctx, request.body.len());

        // [1] AUTHENTICATION
        let caller = IdentityResolver::new(&self.trust, &self.config.header_fields)
            .resolve(&request.headers, &ctx)?;

        // [2] PAYLOAD
        let signed = parse_upload(request, &self.config, &ctx)?;
        let ctx = ctx.with_batch_tag(&signed.batch_tag);

        // [3] SIGNATURE
        let verified = SignatureVerifier::new(&self.trust, &self.config).verify(
            &signed.batch,
            &signed.signature,
            &caller,
            &ctx,
        )?;

        // [4] IDEMPOTENCY
        let content_hash = compute_hash(&signable_bytes(&signed.batch));
        if let Some(previous) = self.store.recorded_outcome(&caller.country, &signed.batch_tag)? {
            log_replay(&ctx, &previous, &content_hash);
            return Ok(previous.replay());
        }

        // [5] PER-KEY VALIDATION
        let outcomes = self.validate_keys(&signed.batch.keys, &caller, &ctx);

        let accepted: Vec<DiagnosisKey> = signed
            .batch
            .keys
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.outcome.is_accepted())
            .map(|(key, _)| key.clone())
            .collect();

        let report = UploadReport {
            upload_id: upload.upload_id.clone(),
            origin: caller.country.clone(),
            batch_tag: signed.batch_tag.clone(),
            received_at: upload.received_at,
            content_hash,
            signing_thumbprint: verified.signing_thumbprint,
            received_count: outcomes.len(),
            accepted_count: accepted.len(),
            rejected_count: outcomes.len() - accepted.len(),
            keys: outcomes,
            replayed: false,
        };

        // [6] PERSIST
        match self
            .store
            .insert_all(&caller.country, &signed.batch_tag, &accepted, &report)
        {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::Duplicate(previous)) => {
                // Lost the race against a concurrent retransmission.
                log_replay(&ctx, &previous, &report.content_hash);
                return Ok(previous.replay());
            }
            Err(e) => {
                crate::log_error!(ctx, "STORE_INSERT_FAILED", error = e.to_string());
                return Err(e.into());
            }
        }

        // [7] RESPOND
        log::info!(
            "{} BATCH_COMPLETE received={} accepted={} rejected={}",
            ctx,
            report.received_count,
            report.accepted_count,
            report.rejected_count
        );

        Ok(report)
    }

    fn validate_keys(
        &self,
        keys: &[DiagnosisKey],
        caller: &CallerIdentity,
        ctx: &LogContext,
    ) -> Vec<KeyOutcome> {
        let rule_ctx = RuleContext {
            uploader_country: &caller.country,
        };

        keys.iter()
            .enumerate()
            .map(|(index, key)| {
                let outcome = self.validator.validate(key, &rule_ctx);
                if let ValidationOutcome::Rejected(reason) = outcome {
                    let key_ctx = ctx.with_key(index);
                    crate::log_info!(
                        key_ctx,
                        "KEY_REJECTED",
                        reason = reason.as_str(),
                        violations = self.validator.violations(key, &rule_ctx),
                    );
                } else {
                    crate::log_debug!(ctx, "KEY_ACCEPTED", index = index);
                }
                KeyOutcome { index, outcome }
            })
            .collect()
    }
}

fn log_replay(ctx: &LogContext, previous: &UploadReport, content_hash: &str) {
    if previous.content_hash != content_hash {
        crate::log_warn!(
            ctx,
            "BATCH_TAG_REUSED",
            previous_upload = &previous.upload_id,
            previous_hash = &previous.content_hash,
            content_hash = content_hash,
        );
    } else {
        log::info!(
            "{} BATCH_REPLAYED previous_upload={} accepted={}",
            ctx,
            previous.upload_id,
            previous.accepted_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::KeyRejection;

    fn report(rejected: usize) -> UploadReport {
        UploadReport {
            upload_id: "upload-1".to_string(),
            origin: "DE".to_string(),
            batch_tag: "tag".to_string(),
            received_at: Utc::now(),
            content_hash: "00".repeat(32),
            signing_thumbprint: "ff".repeat(32),
            received_count: 2,
            accepted_count: 2 - rejected,
            rejected_count: rejected,
            keys: Vec::new(),
            replayed: false,
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(report(0).status_code(), 201);
        assert_eq!(report(1).status_code(), 207);
        assert_eq!(report(2).status_code(), 207);
    }

    #[test]
    fn test_report_json_roundtrip_keeps_outcomes() {
        let mut original = report(1);
        original.keys = vec![
            KeyOutcome {
                index: 0,
                outcome: ValidationOutcome::Accepted,
            },
            KeyOutcome {
                index: 1,
                outcome: ValidationOutcome::Rejected(KeyRejection::InvalidKeyData),
            },
        ];

        let json = serde_json::to_string(&original).unwrap();
        let decoded: UploadReport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
        assert!(!decoded.replay().keys.is_empty());
    }
}
