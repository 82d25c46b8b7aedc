//! Domain models.
//!
//! Diagnosis keys, batches and trusted certificates.

pub mod certificate;
pub mod key;

pub use certificate::*;
pub use key::*;
