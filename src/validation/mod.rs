//! Validation module.
//!
//! Provides the checks an authenticated upload goes through:
//! - Canonical signable bytes for a batch
//! - Detached batch signature verification (Ed25519, ECDSA P-256)
//! - Per-key field rules

pub mod canonical;
pub mod rules;
pub mod signature;

pub use canonical::*;
pub use rules::*;
pub use signature::*;
