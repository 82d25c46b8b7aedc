//! Structured logging utilities.
//!
//! Provides context-aware logging with upload_id, batch_tag and key index
//! included in every log message.

use std::fmt;

/// Logging context for one upload request.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub upload_id: String,
    pub batch_tag: Option<String>,
    pub key_index: Option<usize>,
}

impl LogContext {
    pub fn new(upload_id: &str) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            batch_tag: None,
            key_index: None,
        }
    }

    pub fn with_batch_tag(&self, batch_tag: &str) -> Self {
        Self {
            upload_id: self.upload_id.clone(),
            batch_tag: Some(batch_tag.to_string()),
            key_index: None,
        }
    }

    pub fn with_key(&self, index: usize) -> Self {
        Self {
            upload_id: self.upload_id.clone(),
            batch_tag: self.batch_tag.clone(),
            key_index: Some(index),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[upload={}]", self.upload_id)?;
        if let Some(tag) = &self.batch_tag {
            write!(f, " [batch_tag={}]", tag)?;
        }
        if let Some(index) = self.key_index {
            write!(f, " [key={}]", index)?;
        }
        Ok(())
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::info!(
            concat!("{} {} ", $(stringify!($key), "={:?} "),*),
            $ctx,
            $event,
            $($value),*
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::warn!(
            concat!("{} {} ", $(stringify!($key), "={:?} "),*),
            $ctx,
            $event,
            $($value),*
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::error!(
            concat!("{} {} ", $(stringify!($key), "={:?} "),*),
            $ctx,
            $event,
            $($value),*
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::debug!(
            concat!("{} {} ", $(stringify!($key), "={:?} "),*),
            $ctx,
            $event,
            $($value),*
        );
    };
}
