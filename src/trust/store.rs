//! Certificate trust store.
//!
//! Read-mostly cache of trusted certificates loaded from a repository and
//! refreshed once the snapshot is older than the configured TTL. A failed
//! reload is retried at most once per `RELOAD_RETRY_INTERVAL` (or TTL, if
//! shorter).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{RepositoryError, RepositoryError::InvalidCertificate};
use crate::model::{CertificateRecord, CertificateType, TrustedCertificate};

/// Authoritative source of certificates. Only read by this crate.
pub trait CertificateRepository: Send + Sync {
    fn load_certificates(&self) -> Result<Vec<TrustedCertificate>, RepositoryError>;
}

/// Lookups used by authentication and signature verification.
///
/// A missing certificate is `None` / empty, never an error: impostor callers
/// are an expected outcome. Revoked or expired certificates are never
/// returned.
pub trait CertificateTrustStore: Send + Sync {
    fn lookup(&self, thumbprint: &str, certificate_type: CertificateType) -> Option<TrustedCertificate>;

    fn certificates_for_country(
        &self,
        country: &str,
        certificate_type: CertificateType,
    ) -> Vec<TrustedCertificate>;
}

impl<T: CertificateTrustStore + ?Sized> CertificateTrustStore for &T {
    fn lookup(&self, thumbprint: &str, certificate_type: CertificateType) -> Option<TrustedCertificate> {
        (**self).lookup(thumbprint, certificate_type)
    }

    fn certificates_for_country(
        &self,
        country: &str,
        certificate_type: CertificateType,
    ) -> Vec<TrustedCertificate> {
        (**self).certificates_for_country(country, certificate_type)
    }
}

impl<T: CertificateTrustStore + ?Sized> CertificateTrustStore for Arc<T> {
    fn lookup(&self, thumbprint: &str, certificate_type: CertificateType) -> Option<TrustedCertificate> {
        (**self).lookup(thumbprint, certificate_type)
    }

    fn certificates_for_country(
        &self,
        country: &str,
        certificate_type: CertificateType,
    ) -> Vec<TrustedCertificate> {
        (**self).certificates_for_country(country, certificate_type)
    }
}

/// Repository backed by a certificate list held in memory.
///
/// The host replaces the list whenever provisioning changes it.
#[derive(Debug, Default)]
pub struct MemoryCertificateRepository {
    certificates: RwLock<Vec<TrustedCertificate>>,
}

impl MemoryCertificateRepository {
    pub fn new(certificates: Vec<TrustedCertificate>) -> Self {
        Self {
            certificates: RwLock::new(certificates),
        }
    }

    /// Convert records, keeping the valid ones and returning the failures.
    pub fn from_records(records: Vec<CertificateRecord>) -> (Self, Vec<RepositoryError>) {
        let repository = Self::default();
        let errors = repository.replace_records(records);
        (repository, errors)
    }

    pub fn replace(&self, certificates: Vec<TrustedCertificate>) {
        *self.certificates.write() = certificates;
    }

    pub fn replace_records(&self, records: Vec<CertificateRecord>) -> Vec<RepositoryError> {
        let mut certificates = Vec::with_capacity(records.len());
        let mut errors = Vec::new();

        for record in records {
            let thumbprint = record.thumbprint.clone();
            match TrustedCertificate::try_from(record) {
                Ok(cert) => certificates.push(cert),
                Err(source) => errors.push(InvalidCertificate { thumbprint, source }),
            }
        }

        self.replace(certificates);
        errors
    }

    pub fn len(&self) -> usize {
        self.certificates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.read().is_empty()
    }
}

impl CertificateRepository for MemoryCertificateRepository {
    fn load_certificates(&self) -> Result<Vec<TrustedCertificate>, RepositoryError> {
        Ok(self.certificates.read().clone())
    }
}

impl<R: CertificateRepository + ?Sized> CertificateRepository for Arc<R> {
    fn load_certificates(&self) -> Result<Vec<TrustedCertificate>, RepositoryError> {
        (**self).load_certificates()
    }
}

/// Upper bound on how often a failing repository is retried.
const RELOAD_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Snapshot of the repository at one point in time.
#[derive(Debug, Default)]
struct CertificateCache {
    by_thumbprint: HashMap<(String, CertificateType), TrustedCertificate>,
    loaded_at: Option<Instant>,
    failed_at: Option<Instant>,
}

impl CertificateCache {
    fn needs_refresh(&self, ttl: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() > ttl,
            None => true,
        }
    }

    /// Stale, and not inside the back-off window of a failed reload.
    fn should_reload(&self, ttl: Duration) -> bool {
        let retry_due = self
            .failed_at
            .map_or(true, |failed_at| failed_at.elapsed() >= ttl.min(RELOAD_RETRY_INTERVAL));
        retry_due && self.needs_refresh(ttl)
    }

    fn replace(&mut self, certificates: Vec<TrustedCertificate>) {
        self.by_thumbprint = certificates
            .into_iter()
            .map(|cert| ((cert.thumbprint.clone(), cert.certificate_type), cert))
            .collect();
        self.loaded_at = Some(Instant::now());
        self.failed_at = None;
    }
}

/// Trust store caching a `CertificateRepository`.
pub struct CachedTrustStore<R> {
    repository: R,
    cache: RwLock<CertificateCache>,
    ttl: Duration,
}

impl<R: CertificateRepository> CachedTrustStore<R> {
    pub fn new(repository: R, ttl: Duration) -> Self {
        Self {
            repository,
            cache: RwLock::new(CertificateCache::default()),
            ttl,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Reload from the repository now, regardless of TTL.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn refresh(&self) -> Result<usize, RepositoryError> {
        let mut cache = self.cache.write();
        self.reload_into(&mut cache)
    }

    /// Drop the snapshot so the next lookup reloads.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write();
        cache.loaded_at = None;
        cache.failed_at = None;
        drop(cache);
        log::info!("TRUST_CACHE_INVALIDATED");
    }

    pub fn certificate_count(&self) -> usize {
        self.cache.read().by_thumbprint.len()
    }

    pub fn needs_refresh(&self) -> bool {
        self.cache.read().needs_refresh(self.ttl)
    }

    /// Get cache age in seconds (for logging).
    pub fn cache_age_secs(&self) -> Option<u64> {
        self.cache.read().loaded_at.map(|t| t.elapsed().as_secs())
    }

    fn reload_into(&self, cache: &mut CertificateCache) -> Result<usize, RepositoryError> {
        match self.repository.load_certificates() {
            Ok(certificates) => {
                let count = certificates.len();
                cache.replace(certificates);
                log::info!("TRUST_CACHE_LOADED certificates={}", count);
                Ok(count)
            }
            Err(e) => {
                cache.failed_at = Some(Instant::now());
                log::warn!(
                    "TRUST_CACHE_REFRESH_FAILED error={} stale_certificates={}",
                    e,
                    cache.by_thumbprint.len()
                );
                Err(e)
            }
        }
    }

    fn ensure_fresh(&self) {
        if !self.cache.read().should_reload(self.ttl) {
            return;
        }

        let mut cache = self.cache.write();
        // Another reader may have refreshed while we waited for the lock.
        if cache.should_reload(self.ttl) {
            // Lookups keep serving the previous snapshot, or nothing.
            if self.reload_into(&mut cache).is_err() {
                log::debug!("TRUST_CACHE_RETRY_DEFERRED");
            }
        }
    }
}

impl<R: CertificateRepository> CertificateTrustStore for CachedTrustStore<R> {
    fn lookup(&self, thumbprint: &str, certificate_type: CertificateType) -> Option<TrustedCertificate> {
        self.ensure_fresh();
        let now = Utc::now();

        self.cache
            .read()
            .by_thumbprint
            .get(&(thumbprint.to_string(), certificate_type))
            .filter(|cert| cert.is_usable_at(now))
            .cloned()
    }

    fn certificates_for_country(
        &self,
        country: &str,
        certificate_type: CertificateType,
    ) -> Vec<TrustedCertificate> {
        self.ensure_fresh();
        let now = Utc::now();

        let mut certificates: Vec<TrustedCertificate> = self
            .cache
            .read()
            .by_thumbprint
            .values()
            .filter(|cert| {
                cert.certificate_type == certificate_type
                    && cert.country == country
                    && cert.is_usable_at(now)
            })
            .cloned()
            .collect();

        // Deterministic verification order.
        certificates.sort_by(|a, b| a.thumbprint.cmp(&b.thumbprint));
        certificates
    }
}
