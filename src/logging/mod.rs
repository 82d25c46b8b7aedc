//! Structured logging with upload context.
//!
//! Provides logging macros and utilities that include upload_id and
//! batch_tag in every log message for easy correlation.

pub mod structured;

pub use structured::*;
