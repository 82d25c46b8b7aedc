//! Detached batch signature verification.
//!
//! Verifies the `batchSignature` header against the signing certificates
//! registered for the authenticated caller's country. Verification fails
//! closed: anything other than a verified signature is `SignatureInvalid`.

use base64::{engine::general_purpose, Engine as _};
use p256::ecdsa::signature::Verifier as _;
use sha2::{Digest, Sha256};

use crate::config::GatewayConfig;
use crate::error::IntakeError;
use crate::logging::structured::LogContext;
use crate::model::{CertificateType, DiagnosisKeyBatch, SignatureAlgorithm, TrustedCertificate};
use crate::trust::identity::CallerIdentity;
use crate::trust::store::CertificateTrustStore;
use crate::validation::canonical::signable_bytes;

/// Proof that a batch was authored by the caller's country.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedSignature {
    pub signing_thumbprint: String,
    pub algorithm: SignatureAlgorithm,
}

pub struct SignatureVerifier<'a, T: ?Sized> {
    trust: &'a T,
    config: &'a GatewayConfig,
}

impl<'a, T: CertificateTrustStore + ?Sized> SignatureVerifier<'a, T> {
    pub fn new(trust: &'a T, config: &'a GatewayConfig) -> Self {
        Self { trust, config }
    }

    /// Verify `signature_encoded` over the canonical bytes of `batch`.
    ///
    /// Any currently valid signing certificate of the caller's country may
    /// have produced the signature (certificates overlap during rotation).
    pub fn verify(
        &self,
        batch: &DiagnosisKeyBatch,
        signature_encoded: &str,
        caller: &CallerIdentity,
        ctx: &LogContext,
    ) -> Result<VerifiedSignature, IntakeError> {
        let signature = decode_signature(signature_encoded).map_err(|e| {
            log::warn!("{} SIGNATURE_DECODE_FAILED error={}", ctx, e);
            IntakeError::SignatureInvalid(e)
        })?;

        log::debug!(
            "{} SIGNATURE_DECODE success=true bytes={}",
            ctx,
            signature.len()
        );

        let certificates = self
            .trust
            .certificates_for_country(&caller.country, CertificateType::Signing);

        log::debug!(
            "{} SIGNATURE_CERT_LOOKUP country={} found={}",
            ctx,
            caller.country,
            certificates.len()
        );

        if certificates.is_empty() {
            log::warn!(
                "{} SIGNATURE_INVALID reason=no_signing_certificate country={}",
                ctx,
                caller.country
            );
            return Err(IntakeError::SignatureInvalid(format!(
                "no signing certificate registered for {}",
                caller.country
            )));
        }

        let message = signable_bytes(batch);
        let mut last_error = String::from("no usable signing certificate");

        for certificate in &certificates {
            if certificate.country != caller.country {
                log::warn!(
                    "{} SIGNATURE_CERT_SKIPPED thumbprint={} reason=country_mismatch",
                    ctx,
                    certificate.thumbprint
                );
                last_error = "signing certificate country mismatch".to_string();
                continue;
            }

            if !self.config.algorithm_enabled(certificate.algorithm) {
                log::warn!(
                    "{} SIGNATURE_CERT_SKIPPED thumbprint={} reason=algorithm_disabled algorithm={}",
                    ctx,
                    certificate.thumbprint,
                    certificate.algorithm.as_str()
                );
                last_error = format!("algorithm {} not accepted", certificate.algorithm.as_str());
                continue;
            }

            match verify_with_certificate(certificate, &message, &signature) {
                Ok(()) => {
                    log::info!(
                        "{} SIGNATURE_VERIFY thumbprint={} algorithm={} valid=true",
                        ctx,
                        certificate.thumbprint,
                        certificate.algorithm.as_str()
                    );
                    return Ok(VerifiedSignature {
                        signing_thumbprint: certificate.thumbprint.clone(),
                        algorithm: certificate.algorithm,
                    });
                }
                Err(e) => {
                    log::debug!(
                        "{} SIGNATURE_VERIFY thumbprint={} valid=false error={}",
                        ctx,
                        certificate.thumbprint,
                        e
                    );
                    last_error = e;
                }
            }
        }

        log::warn!(
            "{} SIGNATURE_INVALID country={} candidates={} error={}",
            ctx,
            caller.country,
            certificates.len(),
            last_error
        );
        Err(IntakeError::SignatureInvalid(last_error))
    }
}

/// Decode a transport-encoded signature (URL-safe first, then standard base64).
pub fn decode_signature(encoded: &str) -> Result<Vec<u8>, String> {
    let encoded = encoded.trim();
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| general_purpose::STANDARD.decode(encoded))
        .map_err(|e| format!("Decode error: {}", e))?;

    if bytes.is_empty() {
        return Err("Empty signature".to_string());
    }
    Ok(bytes)
}

/// Verify `signature` over `message` with one certificate's public key.
pub fn verify_with_certificate(
    certificate: &TrustedCertificate,
    message: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    match certificate.algorithm {
        SignatureAlgorithm::Ed25519 => {
            let key_bytes: [u8; 32] = certificate
                .public_key
                .as_slice()
                .try_into()
                .map_err(|_| "Invalid Ed25519 key length".to_string())?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
                .map_err(|e| format!("Invalid public key: {}", e))?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|e| format!("Parse error: {}", e))?;
            key.verify_strict(message, &signature)
                .map_err(|e| format!("Verification failed: {}", e))
        }
        SignatureAlgorithm::EcdsaP256Sha256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&certificate.public_key)
                .map_err(|e| format!("Invalid public key: {}", e))?;
            let signature = p256::ecdsa::Signature::from_der(signature)
                .or_else(|_| p256::ecdsa::Signature::from_slice(signature))
                .map_err(|e| format!("Parse error: {}", e))?;
            key.verify(message, &signature)
                .map_err(|e| format!("Verification failed: {}", e))
        }
    }
}

/// Compute SHA256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
