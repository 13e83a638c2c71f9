//! Client fingerprint derivation for anonymous request identity.
//!
//! A fingerprint identifies a class of callers based on:
//! - Network origin (remote address or forwarded-for value)
//! - User-agent string
//! - Accept-Language and Accept-Encoding headers
//! - Two client-hint headers, when present
//!
//! Requests with the same fingerprint share a quota. The fingerprint is a
//! best-effort heuristic, not a security credential: a caller that changes
//! any contributing header gets a fresh identity, which is why the guard
//! pairs fingerprinting with burst-creation abuse detection.

use sha2::{Digest, Sha256};
use std::fmt;

/// Domain tag mixed into every fingerprint hash.
const DOMAIN_TAG: &[u8] = b"session-guard-fingerprint-v1";

/// Field separator. Keeps ("ab", "c") and ("a", "bc") distinct.
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// Metadata extracted from an inbound request.
///
/// The HTTP layer fills these from request headers; a header that is absent
/// stays empty. All fields contribute to the fingerprint in a fixed order,
/// so two requests with identical attribute sets always map to the same
/// identity regardless of header arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Network origin of the caller (e.g. remote IP).
    pub network_origin: String,
    /// User-agent header value.
    pub user_agent: String,
    /// Accept-Language header value.
    pub accept_language: String,
    /// Accept-Encoding header value.
    pub accept_encoding: String,
    /// `Sec-CH-UA` client hint, if the client sent one.
    pub ch_ua: Option<String>,
    /// `Sec-CH-UA-Platform` client hint, if the client sent one.
    pub ch_platform: Option<String>,
}

impl RequestMetadata {
    /// Create metadata from the two most common attributes.
    pub fn new(network_origin: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            network_origin: network_origin.into(),
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    /// Set the Accept-Language header value.
    pub fn with_accept_language(mut self, value: impl Into<String>) -> Self {
        self.accept_language = value.into();
        self
    }

    /// Set the Accept-Encoding header value.
    pub fn with_accept_encoding(mut self, value: impl Into<String>) -> Self {
        self.accept_encoding = value.into();
        self
    }

    /// Set the `Sec-CH-UA` client hint.
    pub fn with_ch_ua(mut self, value: impl Into<String>) -> Self {
        self.ch_ua = Some(value.into());
        self
    }

    /// Set the `Sec-CH-UA-Platform` client hint.
    pub fn with_ch_platform(mut self, value: impl Into<String>) -> Self {
        self.ch_platform = Some(value.into());
        self
    }

    /// Contributing fields in their fixed hashing order.
    fn fields(&self) -> [&str; 6] {
        [
            self.network_origin.as_str(),
            self.user_agent.as_str(),
            self.accept_language.as_str(),
            self.accept_encoding.as_str(),
            self.ch_ua.as_deref().unwrap_or(""),
            self.ch_platform.as_deref().unwrap_or(""),
        ]
    }

    /// True when no contributing field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|field| field.is_empty())
    }
}

/// Error returned when an identity cannot be derived because every
/// contributing field is empty or missing.
///
/// Exhaustion and abuse blocks are ordinary outcomes, never errors; this is
/// the only error the guard propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRequest;

impl fmt::Display for MalformedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request metadata carries no identity-contributing fields"
        )
    }
}

impl std::error::Error for MalformedRequest {}

/// A deterministic identity for an anonymous caller.
///
/// SHA-256 over the metadata fields in fixed order, hex-encoded. Derivation
/// is order-stable by construction: the field order lives in code, never in
/// map iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClientFingerprint(String);

impl ClientFingerprint {
    /// Derive a fingerprint from request metadata.
    ///
    /// # Errors
    /// Returns [`MalformedRequest`] when every contributing field is empty.
    pub fn derive(metadata: &RequestMetadata) -> Result<Self, MalformedRequest> {
        if metadata.is_empty() {
            return Err(MalformedRequest);
        }

        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        for field in metadata.fields() {
            hasher.update(FIELD_SEPARATOR);
            hasher.update(field.as_bytes());
        }

        Ok(ClientFingerprint(hex::encode(hasher.finalize())))
    }

    /// The full hex-encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading eight hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
