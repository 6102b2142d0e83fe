// ── Managed resources ──
//
// A resource knows how to read its state from a BMC, diff it against what
// the caller wants, enforce its own rules, and turn the diff into one or
// more submissions. The orchestrator owns everything around that: locking,
// power, polling and the final re-read.

pub mod attributes;
pub mod boot;
pub mod directory;
pub mod storage;

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::device::ManagementApi;
use crate::error::CoreError;
use crate::model::{ApplySettings, AttributeDiff};

pub use attributes::{AttributeGroup, AttributeGroupState};
pub use boot::{BootDesired, BootDiff, BootOverride, BootSettingsResource, BootState};
pub use directory::{
    DirectoryConfig, DirectoryDiff, DirectoryService, DirectoryState, LdapSearch, ProviderSettings,
};
pub use storage::{
    SecurityKeyOperation, SecurityKeyRequest, StorageController, StorageDesired, StorageDiff,
    StorageState,
};

/// What a diff must answer for the orchestrator.
pub trait ChangeSet {
    fn is_empty(&self) -> bool;

    /// Human-readable names of what changes, for logs and reports.
    fn summary(&self) -> Vec<String>;
}

impl ChangeSet for AttributeDiff {
    fn is_empty(&self) -> bool {
        AttributeDiff::is_empty(self)
    }

    fn summary(&self) -> Vec<String> {
        self.names().map(str::to_owned).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Patch,
    Post,
}

/// Whether the orchestrator waits on the job a submission creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Poll the returned job, if any.
    Await,
    /// Scheduled for later (maintenance windows); never polled.
    Deferred,
}

/// One request to send.
#[derive(Debug, Clone)]
pub struct Submission {
    pub label: String,
    pub method: Method,
    pub uri: String,
    pub body: Value,
    pub completion: Completion,
}

/// Everything a reconciliation submits, in order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub submissions: Vec<Submission>,
    /// Reboot the host after submitting so pending settings apply.
    pub reboot: bool,
}

/// A reconcilable piece of BMC configuration.
#[async_trait]
pub trait Resource: Send + Sync {
    type Desired: Send + Sync;
    type State: Send + Sync + Debug;
    type Diff: ChangeSet + Send + Sync + Debug;

    /// Short name used in logs and errors (`BIOS`, `Storage RAID.Integrated.1-1`).
    fn describe(&self) -> String;

    /// Read current state. Called once before diffing and once at the end.
    async fn read(&self, api: &dyn ManagementApi) -> Result<Self::State, CoreError>;

    /// Compute what must change. May fetch the attribute registry.
    async fn diff(
        &self,
        api: &dyn ManagementApi,
        desired: &Self::Desired,
        current: &Self::State,
    ) -> Result<Self::Diff, CoreError>;

    /// Business rules and apply-time checks. Runs before anything is sent.
    fn validate(
        &self,
        diff: &Self::Diff,
        current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<(), CoreError>;

    /// Turn a validated, non-empty diff into submissions.
    fn build(
        &self,
        diff: &Self::Diff,
        current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<Plan, CoreError>;
}

/// Completion mode implied by an apply-time policy.
pub(crate) fn completion_for(apply: &ApplySettings) -> Completion {
    if apply.policy.awaits_completion() {
        Completion::Await
    } else {
        Completion::Deferred
    }
}

/// Walk a JSON pointer and collect the scalar members of the object there.
pub(crate) fn attributes_at(
    doc: &Value,
    pointer: &str,
    field: &'static str,
    resource: &str,
) -> Result<crate::model::CurrentAttributes, CoreError> {
    let object = doc.pointer(pointer).and_then(Value::as_object).ok_or_else(|| {
        CoreError::read(
            resource,
            redcfg_api::Error::MissingField {
                resource: resource.to_owned(),
                field,
            },
        )
    })?;
    Ok(object
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect())
}

/// Copy of a request body with secrets masked, for logging.
pub(crate) fn redact(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let hidden = matches!(k.as_str(), "Key" | "OldKey" | "NewKey" | "Password");
                    (k.clone(), if hidden { json!("***") } else { redact(v) })
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
