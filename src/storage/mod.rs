//! Storage module.
//!
//! The `DiagnosisKeyStore` trait the pipeline writes through, an in-memory
//! implementation, and SQL builders for hosts that persist with their own
//! database driver.

pub mod memory;
pub mod models;
pub mod queries;

pub use memory::*;
pub use models::*;
pub use queries::*;

use std::sync::Arc;

use crate::error::StoreError;
use crate::model::DiagnosisKey;
use crate::pipeline::intake::UploadReport;

/// Result of an atomic batch insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A batch with the same (origin, batch tag) already exists; carries the
    /// outcome recorded for it.
    Duplicate(UploadReport),
}

/// Durable storage keyed by (origin, batch tag).
///
/// `insert_all` must be atomic per batch and must enforce uniqueness of
/// (origin, batch tag) itself (unique constraint or compare-and-swap), since
/// several gateway instances may race on the same retransmission.
pub trait DiagnosisKeyStore {
    fn exists(&self, origin: &str, batch_tag: &str) -> Result<bool, StoreError> {
        Ok(self.recorded_outcome(origin, batch_tag)?.is_some())
    }

    /// Outcome recorded when the batch was first accepted.
    fn recorded_outcome(
        &self,
        origin: &str,
        batch_tag: &str,
    ) -> Result<Option<UploadReport>, StoreError>;

    /// Store the accepted keys and the outcome report in one write.
    fn insert_all(
        &self,
        origin: &str,
        batch_tag: &str,
        keys: &[DiagnosisKey],
        report: &UploadReport,
    ) -> Result<InsertOutcome, StoreError>;
}

impl<S: DiagnosisKeyStore + ?Sized> DiagnosisKeyStore for &S {
    fn exists(&self, origin: &str, batch_tag: &str) -> Result<bool, StoreError> {
        (**self).exists(origin, batch_tag)
    }

    fn recorded_outcome(
        &self,
        origin: &str,
        batch_tag: &str,
    ) -> Result<Option<UploadReport>, StoreError> {
        (**self).recorded_outcome(origin, batch_tag)
    }

    fn insert_all(
        &self,
        origin: &str,
        batch_tag: &str,
        keys: &[DiagnosisKey],
        report: &UploadReport,
    ) -> Result<InsertOutcome, StoreError> {
        (**self).insert_all(origin, batch_tag, keys, report)
    }
}

impl<S: DiagnosisKeyStore + ?Sized> DiagnosisKeyStore for Arc<S> {
    fn exists(&self, origin: &str, batch_tag: &str) -> Result<bool, StoreError> {
        (**self).exists(origin, batch_tag)
    }

    fn recorded_outcome(
        &self,
        origin: &str,
        batch_tag: &str,
    ) -> Result<Option<UploadReport>, StoreError> {
        (**self).recorded_outcome(origin, batch_tag)
    }

    fn insert_all(
        &self,
        origin: &str,
        batch_tag: &str,
        keys: &[DiagnosisKey],
        report: &UploadReport,
    ) -> Result<InsertOutcome, StoreError> {
        (**self).insert_all(origin, batch_tag, keys, report)
    }
}
