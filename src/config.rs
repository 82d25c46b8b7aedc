//! Gateway configuration.
//!
//! Loaded from JSON supplied by the host service. Every field has a default
//! so a partial document only overrides what it names.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::SignatureAlgorithm;
use crate::validation::rules::RuleId;

/// Trust cache TTL - 5 minutes
pub const DEFAULT_TRUST_CACHE_TTL_SECS: u64 = 300;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json; version=1.0";

/// Names of the headers an upload request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFields {
    /// Injected by the TLS-terminating proxy.
    pub thumbprint: String,
    /// Injected by the TLS-terminating proxy.
    pub distinguished_name: String,
    pub batch_tag: String,
    pub batch_signature: String,
}

impl Default for HeaderFields {
    fn default() -> Self {
        Self {
            thumbprint: "X-SSL-Client-SHA256".to_string(),
            distinguished_name: "X-SSL-Client-DN".to_string(),
            batch_tag: "batchTag".to_string(),
            batch_signature: "batchSignature".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub header_fields: HeaderFields,
    /// Field rules to evaluate. Supplemental rules not listed are skipped;
    /// core rules always run.
    pub enabled_rules: Vec<RuleId>,
    /// Algorithms a signing certificate may use.
    pub signature_algorithms: Vec<SignatureAlgorithm>,
    pub trust_cache_ttl_secs: u64,
    pub content_type: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            header_fields: HeaderFields::default(),
            enabled_rules: RuleId::ALL.to_vec(),
            signature_algorithms: vec![
                SignatureAlgorithm::Ed25519,
                SignatureAlgorithm::EcdsaP256Sha256,
            ],
            trust_cache_ttl_secs: DEFAULT_TRUST_CACHE_TTL_SECS,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GatewayConfig =
            serde_json::from_str(json).context("failed to parse gateway configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let headers = &self.header_fields;
        for (name, value) in [
            ("thumbprint", &headers.thumbprint),
            ("distinguished_name", &headers.distinguished_name),
            ("batch_tag", &headers.batch_tag),
            ("batch_signature", &headers.batch_signature),
        ] {
            if value.trim().is_empty() {
                bail!("header field name '{}' must not be empty", name);
            }
        }

        if self.signature_algorithms.is_empty() {
            bail!("at least one signature algorithm must be enabled");
        }

        if self.trust_cache_ttl_secs == 0 {
            bail!("trust_cache_ttl_secs must be greater than zero");
        }

        if self.content_type.trim().is_empty() {
            bail!("content_type must not be empty");
        }

        Ok(())
    }

    pub fn enabled_rule_set(&self) -> HashSet<RuleId> {
        RuleId::CORE
            .into_iter()
            .chain(self.enabled_rules.iter().copied())
            .collect()
    }

    pub fn algorithm_enabled(&self, algorithm: SignatureAlgorithm) -> bool {
        self.signature_algorithms.contains(&algorithm)
    }
}
