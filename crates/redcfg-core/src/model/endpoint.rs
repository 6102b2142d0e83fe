// ── Managed endpoint ──
//
// Describes *which* BMC a reconciliation talks to and how to reach it.
// Built by the caller for every call; core never reads config files.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

pub const DEFAULT_SYSTEM_ID: &str = "System.Embedded.1";
pub const DEFAULT_MANAGER_ID: &str = "iDRAC.Embedded.1";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Default for BMCs.
    #[default]
    DangerAcceptInvalid,
}

/// One out-of-band controller plus the credentials to manage it.
#[derive(Debug, Clone)]
pub struct ManagedEndpoint {
    /// BMC base URL (e.g., `https://10.0.0.12`).
    pub address: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `Systems` member managed through this BMC.
    pub system_id: String,
    /// `Managers` member representing the BMC itself.
    pub manager_id: String,
}

impl ManagedEndpoint {
    pub fn new(address: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            address,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            system_id: DEFAULT_SYSTEM_ID.into(),
            manager_id: DEFAULT_MANAGER_ID.into(),
        }
    }

    pub fn with_tls(mut self, tls: TlsVerification) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The lock key for this endpoint.
    pub fn key(&self) -> EndpointKey {
        EndpointKey::from_url(&self.address)
    }
}

/// Normalized `scheme://host:port` of a BMC.
///
/// Two endpoints with the same key are the same physical controller, no
/// matter which path, credentials or letter case the caller used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        match url.port_or_known_default() {
            Some(port) => Self(format!("{}://{host}:{port}", url.scheme())),
            None => Self(format!("{}://{host}", url.scheme())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
