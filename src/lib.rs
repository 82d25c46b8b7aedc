//! EFGS Intake - Diagnosis key batch intake for the federation gateway
//!
//! National backends upload signed batches of exposure-notification
//! diagnosis keys. This crate decides, per upload, whether the caller is
//! trusted, whether the batch was signed by that caller's country, and which
//! keys are valid enough to be stored. The implementation prioritizes:
//!
//! 1. **Trust** - Fail closed on authentication and signature checks
//! 2. **Logging** - Every decision point logged with full context
//! 3. **Partial acceptance** - One bad key never sinks its siblings
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Upload orchestrator and request parsing
//! - `trust` - Certificate trust store and caller identity resolution
//! - `validation` - Canonical batch bytes, signature verification, field rules
//! - `storage` - Key store trait, in-memory store, SQL builders
//! - `model` - Diagnosis keys, batches and certificates
//! - `config` - Gateway configuration
//! - `logging` - Structured logging with upload context
//!
//! With the `python` feature the crate also builds as a Python extension
//! module for the host web service.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod storage;
pub mod trust;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use config::GatewayConfig;
pub use error::{IntakeError, StoreError};
pub use pipeline::{BatchIntakePipeline, RequestHeaders, UploadReport, UploadRequest};
pub use storage::{DiagnosisKeyStore, InMemoryKeyStore};
pub use trust::{CachedTrustStore, CertificateRepository, CertificateTrustStore};
pub use validation::{FieldValidator, KeyRejection, ValidationOutcome};
