//! Pipeline context management.
//!
//! Provides upload context for logging and state tracking.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Context for one upload request.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub upload_id: String,
    pub received_at: DateTime<Utc>,
}

impl Default for UploadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadContext {
    pub fn new() -> Self {
        let upload_id = format!("upload-{}", &Uuid::new_v4().simple().to_string()[..8]);

        Self {
            upload_id,
            received_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.upload_id)
    }
}
