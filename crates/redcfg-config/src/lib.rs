//! Shared configuration for redcfg callers.
//!
//! TOML endpoint profiles, reconcile defaults, credential resolution
//! (env + keyring + plaintext), and translation to
//! `redcfg_core::ManagedEndpoint` / `ReconcileOptions`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use redcfg_core::{
    DEFAULT_MANAGER_ID, DEFAULT_SYSTEM_ID, ManagedEndpoint, ReconcileOptions, ResetType,
    TlsVerification,
};

const KEYRING_SERVICE: &str = "redcfg";
const ENV_PREFIX: &str = "REDCFG_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when the caller names none.
    pub default_profile: Option<String>,

    /// Reconcile defaults applied to every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named BMC profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, or the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Seconds between job and power polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Seconds to wait for a power transition.
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: u64,

    /// Seconds to wait for a configuration job.
    #[serde(default = "default_job_timeout")]
    pub job_timeout: u64,

    /// Reset used to apply `OnReset` changes.
    #[serde(default = "default_reset_type")]
    pub reset_type: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            reset_timeout: default_reset_timeout(),
            job_timeout: default_job_timeout(),
            reset_type: default_reset_type(),
            timeout: default_timeout(),
            insecure: false,
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
fn default_reset_timeout() -> u64 {
    120
}
fn default_job_timeout() -> u64 {
    1200
}
fn default_reset_type() -> String {
    "ForceRestart".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named BMC profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// BMC base URL (e.g., "https://10.0.0.12").
    pub address: String,

    pub username: String,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override per-request timeout.
    pub timeout: Option<u64>,

    #[serde(default = "default_system_id")]
    pub system_id: String,

    #[serde(default = "default_manager_id")]
    pub manager_id: String,
}

fn default_system_id() -> String {
    DEFAULT_SYSTEM_ID.into()
}
fn default_manager_id() -> String {
    DEFAULT_MANAGER_ID.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "redcfg", "redcfg").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("redcfg");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's password: env var, then keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env -> env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ManagedEndpoint` from a profile plus global defaults.
pub fn profile_to_endpoint(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ManagedEndpoint, ConfigError> {
    let address: url::Url = profile
        .address
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "address".into(),
            reason: format!("invalid URL: {}", profile.address),
        })?;
    if address.host_str().is_none() {
        return Err(ConfigError::Validation {
            field: "address".into(),
            reason: format!("no host in {}", profile.address),
        });
    }

    let password = resolve_password(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    let mut endpoint = ManagedEndpoint::new(address, profile.username.clone(), password)
        .with_tls(tls)
        .with_timeout(timeout);
    endpoint.system_id.clone_from(&profile.system_id);
    endpoint.manager_id.clone_from(&profile.manager_id);
    Ok(endpoint)
}

/// Build `ReconcileOptions` from the global defaults. The apply-time
/// policy stays at its default; callers pick it per reconciliation.
pub fn defaults_to_options(defaults: &Defaults) -> Result<ReconcileOptions, ConfigError> {
    let reset_type: ResetType =
        defaults
            .reset_type
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "reset_type".into(),
                reason: format!("unknown reset type '{}'", defaults.reset_type),
            })?;
    if defaults.poll_interval == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval".into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(ReconcileOptions {
        reset_type,
        reset_timeout: Duration::from_secs(defaults.reset_timeout),
        job_timeout: Duration::from_secs(defaults.job_timeout),
        poll_interval: Duration::from_secs(defaults.poll_interval),
        ..ReconcileOptions::default()
    })
}
