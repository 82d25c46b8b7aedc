//! Pipeline orchestration module.
//!
//! Batch intake pipeline that coordinates:
//! - Caller authentication
//! - Payload parsing
//! - Batch signature verification
//! - Idempotent batch tag handling
//! - Per-key validation and persistence

pub mod context;
pub mod intake;
pub mod request;

pub use context::*;
pub use intake::*;
pub use request::*;
