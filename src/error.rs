//! Error types.
//!
//! Request-fatal failures are `IntakeError`; per-key rejections are not
//! errors and live in `validation::rules::KeyRejection`.

use thiserror::Error;

/// Request-fatal intake failure. No keys are stored when one of these occurs.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("batch signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("diagnosis key store failure: {0}")]
    Storage(#[from] StoreError),
}

impl IntakeError {
    /// HTTP status the host should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            IntakeError::AuthenticationFailed(_) => 403,
            IntakeError::MalformedPayload(_) => 400,
            IntakeError::SignatureInvalid(_) => 400,
            IntakeError::Storage(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            IntakeError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            IntakeError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            IntakeError::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

/// Failure reported by a `DiagnosisKeyStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stored outcome could not be decoded: {0}")]
    Decode(String),
}

/// Failure reported by a `CertificateRepository`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("certificate repository unavailable: {0}")]
    Unavailable(String),

    #[error("invalid certificate {thumbprint}: {source}")]
    InvalidCertificate {
        thumbprint: String,
        #[source]
        source: CertificateError,
    },
}

/// A certificate record that cannot be turned into a trust anchor.
#[derive(Debug, Error, PartialEq)]
pub enum CertificateError {
    #[error("public key is not valid base64: {0}")]
    PublicKeyEncoding(String),

    #[error("invalid public key length: expected {expected}, got {actual}")]
    PublicKeyLength { expected: usize, actual: usize },

    #[error("invalid country code: {0:?}")]
    Country(String),

    #[error("validity window ends before it starts")]
    ValidityWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(IntakeError::AuthenticationFailed("x".into()).status_code(), 403);
        assert_eq!(IntakeError::MalformedPayload("x".into()).status_code(), 400);
        assert_eq!(IntakeError::SignatureInvalid("x".into()).status_code(), 400);
        assert_eq!(
            IntakeError::from(StoreError::Backend("down".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_display() {
        let err = IntakeError::SignatureInvalid("no signing certificate".into());
        assert_eq!(err.to_string(), "batch signature invalid: no signing certificate");
        assert_eq!(err.code(), "SIGNATURE_INVALID");
    }
}
