//! Certificate trust module.
//!
//! Provides the cached certificate trust store and caller identity
//! resolution from proxy-injected certificate headers.

pub mod identity;
pub mod store;

pub use identity::*;
pub use store::*;
