//! Upload request and payload parsing.

use std::collections::HashMap;

use crate::config::GatewayConfig;
use crate::error::IntakeError;
use crate::logging::structured::LogContext;
use crate::model::DiagnosisKeyBatch;

/// Request headers with case-insensitive names.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    values: HashMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name, value);
        }
        headers
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl From<HashMap<String, String>> for RequestHeaders {
    fn from(map: HashMap<String, String>) -> Self {
        let mut headers = Self::new();
        for (name, value) in &map {
            headers.insert(name, value);
        }
        headers
    }
}

/// One upload as handed over by the host's HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub headers: RequestHeaders,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UploadRequest {
    pub fn new(headers: RequestHeaders, content_type: Option<&str>, body: Vec<u8>) -> Self {
        Self {
            headers,
            content_type: content_type.map(str::to_string),
            body,
        }
    }
}

/// A parsed batch together with its request-level attributes.
#[derive(Debug, Clone)]
pub struct SignedBatch {
    pub batch_tag: String,
    pub signature: String,
    pub batch: DiagnosisKeyBatch,
}

/// Parse the payload of an authenticated request.
pub fn parse_upload(
    request: &UploadRequest,
    config: &GatewayConfig,
    ctx: &LogContext,
) -> Result<SignedBatch, IntakeError> {
    let content_type = request.content_type.as_deref().unwrap_or_default();
    if !content_type_matches(content_type, &config.content_type) {
        return Err(malformed(
            ctx,
            format!("unsupported content type {:?}", content_type),
        ));
    }

    let fields = &config.header_fields;
    let batch_tag = required_header(request, &fields.batch_tag)
        .ok_or_else(|| malformed(ctx, format!("missing header {}", fields.batch_tag)))?;
    let signature = required_header(request, &fields.batch_signature)
        .ok_or_else(|| malformed(ctx, format!("missing header {}", fields.batch_signature)))?;

    if request.body.is_empty() {
        return Err(malformed(ctx, "empty body".to_string()));
    }

    let batch: DiagnosisKeyBatch = serde_json::from_slice(&request.body)
        .map_err(|e| malformed(ctx, format!("JSON parse error: {}", e)))?;

    if batch.is_empty() {
        return Err(malformed(ctx, "batch contains no keys".to_string()));
    }

    log::debug!(
        "{} PAYLOAD_PARSED batch_tag={} keys={}",
        ctx,
        batch_tag,
        batch.len()
    );

    Ok(SignedBatch {
        batch_tag,
        signature,
        batch,
    })
}

fn required_header(request: &UploadRequest, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Compare media types ignoring case and whitespace around parameters.
fn content_type_matches(actual: &str, expected: &str) -> bool {
    let normalize = |value: &str| -> Vec<String> {
        value
            .split(';')
            .map(|part| part.trim().replace(' ', "").to_ascii_lowercase())
            .filter(|part| !part.is_empty())
            .collect()
    };
    normalize(actual) == normalize(expected)
}

fn malformed(ctx: &LogContext, reason: String) -> IntakeError {
    log::warn!("{} PAYLOAD_MALFORMED reason={:?}", ctx, reason);
    IntakeError::MalformedPayload(reason)
}
