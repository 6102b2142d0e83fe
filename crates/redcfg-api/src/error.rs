use thiserror::Error;

/// Top-level error type for the `redcfg-api` crate.
///
/// Covers every failure mode of a Redfish round trip: authentication,
/// transport, TLS setup, service-reported errors, and payload decoding.
/// `redcfg-core` attaches reconciliation context on top of these.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected by the BMC (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Redfish service ─────────────────────────────────────────────
    /// Non-success status from the service. `message` carries the first
    /// `@Message.ExtendedInfo` entry when the body has one.
    #[error("Redfish error (HTTP {status}): {message}")]
    Redfish {
        status: u16,
        message: String,
        message_id: Option<String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A document decoded fine but lacks a field the caller depends on.
    #[error("Resource {resource} has no {field}")]
    MissingField {
        resource: String,
        field: &'static str,
    },
}

impl Error {
    /// Returns `true` if the credentials were rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// The client itself never retries; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Redfish { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Redfish { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Extract the Redfish `MessageId`, if the service supplied one.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Redfish { message_id, .. } => message_id.as_deref(),
            _ => None,
        }
    }
}
