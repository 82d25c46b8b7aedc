//! Caller identity resolution.
//!
//! The TLS-terminating proxy injects the client certificate thumbprint and
//! subject distinguished name as headers. Those headers are only meaningful
//! when the proxy is trusted; the gateway must never be reachable around it.

use crate::config::HeaderFields;
use crate::error::IntakeError;
use crate::logging::structured::LogContext;
use crate::model::{normalize_thumbprint, CertificateType};
use crate::pipeline::request::RequestHeaders;
use crate::trust::store::CertificateTrustStore;

/// Authenticated uploader. Lives for one request only.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    pub certificate_thumbprint: String,
    pub distinguished_name: String,
    pub country: String,
}

pub struct IdentityResolver<'a, T: ?Sized> {
    trust: &'a T,
    header_fields: &'a HeaderFields,
}

impl<'a, T: CertificateTrustStore + ?Sized> IdentityResolver<'a, T> {
    pub fn new(trust: &'a T, header_fields: &'a HeaderFields) -> Self {
        Self {
            trust,
            header_fields,
        }
    }

    /// Resolve the caller or fail with `AuthenticationFailed`.
    pub fn resolve(
        &self,
        headers: &RequestHeaders,
        ctx: &LogContext,
    ) -> Result<CallerIdentity, IntakeError> {
        let raw_thumbprint = headers
            .get(&self.header_fields.thumbprint)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| reject(ctx, "missing_thumbprint_header"))?;
        let raw_dn = headers
            .get(&self.header_fields.distinguished_name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| reject(ctx, "missing_distinguished_name_header"))?;

        let thumbprint = normalize_thumbprint(raw_thumbprint);
        let distinguished_name = percent_decode(raw_dn);

        let certificate = self
            .trust
            .lookup(&thumbprint, CertificateType::Authentication)
            .ok_or_else(|| {
                log::warn!(
                    "{} AUTH_CERT_LOOKUP thumbprint={} found=false",
                    ctx,
                    thumbprint
                );
                reject(ctx, "unknown_thumbprint")
            })?;

        let attributes = parse_distinguished_name(&distinguished_name);
        let countries: Vec<&str> = attributes
            .iter()
            .filter(|(name, _)| name == "C")
            .map(|(_, value)| value.as_str())
            .collect();
        let dn_country = match countries.as_slice() {
            [country] => *country,
            [] => return Err(reject(ctx, "distinguished_name_without_country")),
            _ => return Err(reject(ctx, "distinguished_name_ambiguous_country")),
        };

        if !dn_country.eq_ignore_ascii_case(&certificate.country) {
            log::warn!(
                "{} AUTH_COUNTRY_MISMATCH dn_country={} certificate_country={}",
                ctx,
                dn_country,
                certificate.country
            );
            return Err(reject(ctx, "country_mismatch"));
        }

        log::info!(
            "{} AUTH_SUCCESS country={} thumbprint={}",
            ctx,
            certificate.country,
            thumbprint
        );

        Ok(CallerIdentity {
            certificate_thumbprint: thumbprint,
            distinguished_name,
            country: certificate.country,
        })
    }
}

fn reject(ctx: &LogContext, reason: &str) -> IntakeError {
    log::warn!("{} AUTH_FAILED reason={}", ctx, reason);
    IntakeError::AuthenticationFailed(reason.to_string())
}

/// Split an RFC 2253 style DN (`C=DE,O=Example`) into attributes, in order.
///
/// A backslash escapes the next character, so `O=Foo\, C=FR` is a single
/// organization attribute. Names are upper-cased; values are trimmed.
/// Parts without `=` are dropped. Repeated names are all kept.
pub fn parse_distinguished_name(dn: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut name = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = dn.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if in_value {
                        value.push(escaped);
                    } else {
                        name.push(escaped);
                    }
                }
            }
            '=' if !in_value => in_value = true,
            ',' => {
                push_attribute(&mut attributes, &mut name, &mut value, in_value);
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => name.push(c),
        }
    }
    push_attribute(&mut attributes, &mut name, &mut value, in_value);

    attributes
}

fn push_attribute(
    attributes: &mut Vec<(String, String)>,
    name: &mut String,
    value: &mut String,
    has_value: bool,
) {
    let key = name.trim().to_uppercase();
    if has_value && !key.is_empty() {
        attributes.push((key, value.trim().to_string()));
    }
    name.clear();
    value.clear();
}

/// Decode `%XX` escapes and `+` as used by proxies that URL-encode the DN.
///
/// Invalid escapes are kept verbatim.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                (Some(high), Some(low)) => {
                    decoded.push(high << 4 | low);
                    i += 3;
                }
                _ => {
                    decoded.push(b'%');
                    i += 1;
                }
            },
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            other => {
                decoded.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|v| v as u8)
}
