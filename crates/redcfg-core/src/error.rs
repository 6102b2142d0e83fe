// ── Core error types ──
//
// Every reconciliation failure is terminal: the lock is released, the
// re-read is skipped, and one of these reaches the caller. Messages carry
// attribute names, device messages and timeout parameters verbatim.
// Transport failures stay wrapped as `source` so callers can still ask
// `redcfg_api::Error::is_transient()`.

use strum::Display;
use thiserror::Error;

use crate::model::{ApplyTimePolicy, PowerState};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Locking ──────────────────────────────────────────────────────
    #[error("Endpoint {endpoint} is locked by another reconciliation")]
    LockUnavailable { endpoint: String },

    // ── Registry and coercion ────────────────────────────────────────
    #[error("Attribute registry {registry} not found on device")]
    RegistryNotFound { registry: String },

    #[error("Failed to fetch attribute registry {registry}: {source}")]
    RegistryFetch {
        registry: String,
        #[source]
        source: redcfg_api::Error,
    },

    #[error("Attribute {attribute} is not defined in registry {registry}")]
    UnknownAttribute { attribute: String, registry: String },

    #[error("Attribute {attribute}: cannot use {value:?} as {expected}")]
    TypeCoercion {
        attribute: String,
        value: String,
        expected: &'static str,
    },

    #[error("Attribute {attribute}: {message}")]
    ConstraintViolation { attribute: String, message: String },

    // ── Apply time ───────────────────────────────────────────────────
    #[error("Apply time {policy} is not supported for {group}")]
    UnsupportedApplyTime {
        policy: ApplyTimePolicy,
        group: String,
    },

    #[error("Apply time {policy} requires a non-empty maintenance window")]
    MissingMaintenanceWindow { policy: ApplyTimePolicy },

    // ── Business rules ───────────────────────────────────────────────
    #[error("{resource}: {message}")]
    ValidationRuleViolation { resource: String, message: String },

    // ── Device interaction ───────────────────────────────────────────
    #[error("Failed to read {resource}: {source}")]
    Read {
        resource: String,
        #[source]
        source: redcfg_api::Error,
    },

    #[error("Submission to {uri} failed: {source}")]
    Submission {
        uri: String,
        #[source]
        source: redcfg_api::Error,
    },

    #[error(
        "Host did not reach {target} within {timeout_secs}s (last observed state: {last})"
    )]
    PowerTimeout {
        target: PowerState,
        last: PowerState,
        timeout_secs: u64,
    },

    // ── Jobs and tasks ───────────────────────────────────────────────
    #[error("Job {job} failed: {message}")]
    JobFailed { job: String, message: String },

    #[error("Job {job} did not finish within {timeout_secs}s (polled every {interval_secs}s)")]
    JobTimedOut {
        job: String,
        timeout_secs: u64,
        interval_secs: u64,
    },

    #[error("Device accepted the change to {uri} but returned an empty Location header")]
    MissingJobLocation { uri: String },

    #[error("Location {location} is neither a job nor a task")]
    UnknownJobShape { location: String },

    #[error("Failed to encode the request body for {resource}: {source}")]
    Serialization {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    // ── Completion ───────────────────────────────────────────────────
    #[error("Re-reading {resource} after the change failed: {source}")]
    Reread {
        resource: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Cancelled while {phase}")]
    Cancelled { phase: &'static str },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Flat discriminant of [`CoreError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    LockUnavailable,
    RegistryNotFound,
    RegistryFetchError,
    UnknownAttribute,
    TypeCoercionError,
    ConstraintViolation,
    UnsupportedApplyTime,
    MissingMaintenanceWindow,
    ValidationRuleViolation,
    ReadError,
    SubmissionError,
    PowerTimeoutError,
    JobFailed,
    JobTimedOut,
    MissingJobLocation,
    UnknownJobShape,
    Serialization,
    RereadError,
    Cancelled,
    Config,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LockUnavailable { .. } => ErrorKind::LockUnavailable,
            Self::RegistryNotFound { .. } => ErrorKind::RegistryNotFound,
            Self::RegistryFetch { .. } => ErrorKind::RegistryFetchError,
            Self::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            Self::TypeCoercion { .. } => ErrorKind::TypeCoercionError,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::UnsupportedApplyTime { .. } => ErrorKind::UnsupportedApplyTime,
            Self::MissingMaintenanceWindow { .. } => ErrorKind::MissingMaintenanceWindow,
            Self::ValidationRuleViolation { .. } => ErrorKind::ValidationRuleViolation,
            Self::Read { .. } => ErrorKind::ReadError,
            Self::Submission { .. } => ErrorKind::SubmissionError,
            Self::PowerTimeout { .. } => ErrorKind::PowerTimeoutError,
            Self::JobFailed { .. } => ErrorKind::JobFailed,
            Self::JobTimedOut { .. } => ErrorKind::JobTimedOut,
            Self::MissingJobLocation { .. } => ErrorKind::MissingJobLocation,
            Self::UnknownJobShape { .. } => ErrorKind::UnknownJobShape,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Reread { .. } => ErrorKind::RereadError,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// The underlying transport error, if this failure came from one.
    pub fn api_error(&self) -> Option<&redcfg_api::Error> {
        match self {
            Self::RegistryFetch { source, .. }
            | Self::Read { source, .. }
            | Self::Submission { source, .. } => Some(source),
            Self::Reread { source, .. } => source.api_error(),
            _ => None,
        }
    }

    pub(crate) fn rule(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationRuleViolation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub(crate) fn read(resource: impl Into<String>, source: redcfg_api::Error) -> Self {
        Self::Read {
            resource: resource.into(),
            source,
        }
    }
}
