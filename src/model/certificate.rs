//! Trusted certificate models.
//!
//! Certificates are provisioned out of band; this crate only reads them.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CertificateError;

/// Role a certificate is trusted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateType {
    Authentication,
    Signing,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Authentication => "AUTHENTICATION",
            CertificateType::Signing => "SIGNING",
        }
    }
}

/// Batch signature algorithms the gateway knows how to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ED25519")]
    Ed25519,
    #[serde(rename = "ECDSA_P256_SHA256")]
    EcdsaP256Sha256,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ED25519",
            SignatureAlgorithm::EcdsaP256Sha256 => "ECDSA_P256_SHA256",
        }
    }
}

/// Certificate row as supplied by the certificate repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub country: String,
    pub thumbprint: String,
    pub certificate_type: CertificateType,
    pub algorithm: SignatureAlgorithm,
    pub public_key_base64: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
}

/// A certificate registered as authoritative for one country and role.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustedCertificate {
    pub country: String,
    /// Normalized lower-case hex SHA-256 thumbprint.
    pub thumbprint: String,
    pub certificate_type: CertificateType,
    pub algorithm: SignatureAlgorithm,
    pub public_key: Vec<u8>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub revoked: bool,
}

impl TrustedCertificate {
    /// Whether the certificate may be used at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.valid_from <= now && now <= self.valid_until
    }
}

impl TryFrom<CertificateRecord> for TrustedCertificate {
    type Error = CertificateError;

    fn try_from(record: CertificateRecord) -> Result<Self, Self::Error> {
        let public_key = general_purpose::STANDARD
            .decode(record.public_key_base64.trim())
            .map_err(|e| CertificateError::PublicKeyEncoding(e.to_string()))?;

        let expected = match record.algorithm {
            SignatureAlgorithm::Ed25519 => Some(32),
            // SEC1 compressed or uncompressed point
            SignatureAlgorithm::EcdsaP256Sha256 => None,
        };
        if let Some(len) = expected {
            if public_key.len() != len {
                return Err(CertificateError::PublicKeyLength {
                    expected: len,
                    actual: public_key.len(),
                });
            }
        }

        let country = record.country.trim().to_uppercase();
        if country.len() != 2 {
            return Err(CertificateError::Country(record.country));
        }

        if record.valid_until < record.valid_from {
            return Err(CertificateError::ValidityWindow);
        }

        Ok(Self {
            country,
            thumbprint: normalize_thumbprint(&record.thumbprint),
            certificate_type: record.certificate_type,
            algorithm: record.algorithm,
            public_key,
            valid_from: record.valid_from,
            valid_until: record.valid_until,
            revoked: record.revoked,
        })
    }
}

/// Compute the SHA-256 thumbprint of raw certificate bytes.
pub fn compute_thumbprint(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

/// Normalize a thumbprint as presented by the TLS proxy.
///
/// Lower-cases, strips `:` separators and surrounding whitespace, and
/// left-pads with zeros to 64 characters (some proxies drop leading zeros).
pub fn normalize_thumbprint(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .flat_map(|c| c.to_lowercase())
        .collect();

    if cleaned.len() < 64 {
        format!("{:0>64}", cleaned)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(algorithm: SignatureAlgorithm, key: &[u8]) -> CertificateRecord {
        CertificateRecord {
            country: "de".to_string(),
            thumbprint: "AB:CD".to_string(),
            certificate_type: CertificateType::Signing,
            algorithm,
            public_key_base64: general_purpose::STANDARD.encode(key),
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(1),
            revoked: false,
        }
    }

    #[test]
    fn test_compute_thumbprint() {
        let thumbprint = compute_thumbprint(b"certificate");
        assert_eq!(thumbprint.len(), 64);
    }

    #[test]
    fn test_normalize_thumbprint() {
        assert_eq!(normalize_thumbprint("AB:CD"), format!("{}abcd", "0".repeat(60)));

        let full = "F".repeat(64);
        assert_eq!(normalize_thumbprint(&full), "f".repeat(64));
    }

    #[test]
    fn test_record_conversion() {
        let cert = TrustedCertificate::try_from(record(SignatureAlgorithm::Ed25519, &[1u8; 32])).unwrap();
        assert_eq!(cert.country, "DE");
        assert_eq!(cert.thumbprint.len(), 64);
        assert!(cert.is_usable_at(Utc::now()));
    }

    #[test]
    fn test_ed25519_key_length_checked() {
        let result = TrustedCertificate::try_from(record(SignatureAlgorithm::Ed25519, &[1u8; 31]));
        assert!(matches!(
            result,
            Err(CertificateError::PublicKeyLength { expected: 32, actual: 31 })
        ));
    }

    #[test]
    fn test_revoked_not_usable() {
        let mut rec = record(SignatureAlgorithm::Ed25519, &[1u8; 32]);
        rec.revoked = true;
        let cert = TrustedCertificate::try_from(rec).unwrap();
        assert!(!cert.is_usable_at(Utc::now()));
    }

    #[test]
    fn test_expired_not_usable() {
        let cert = TrustedCertificate::try_from(record(SignatureAlgorithm::Ed25519, &[1u8; 32])).unwrap();
        assert!(!cert.is_usable_at(Utc::now() + Duration::days(2)));
    }
}
