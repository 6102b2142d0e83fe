// ── Storage controller ──
//
// Dell RAID controller settings live under `Oem.Dell.DellStorageController`
// of the storage resource and have no device registry, so a built-in one
// stands in. Security-key operations are separate `DellRaidService`
// actions that always run as jobs, and never share a call with attribute
// changes.

use async_trait::async_trait;
use redcfg_api::models::Manager;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use strum::Display;
use tracing::{debug, warn};

use super::{
    ChangeSet, Completion, Method, Plan, Resource, Submission, attributes_at, completion_for,
};
use crate::convert::controller_generation;
use crate::device::{ManagementApi, fetch_document};
use crate::diff::compute_diff;
use crate::error::CoreError;
use crate::model::{
    ApplySettings, ApplyTimePolicy, AttributeDiff, ControllerGeneration, CurrentAttributes,
    DesiredAttributes,
};
use crate::payload::{self, ApplyTimeSupport};
use crate::registry::{AttributeRegistry, AttributeSpec};

pub const CONTROLLER_MODE: &str = "ControllerMode";
const KEY_PATH: &str = "Oem.Dell.DellStorageController";
const SECURITY_STATUS: &str = "SecurityStatus";
const KEY_ASSIGNED: &str = "SecurityKeyAssigned";
const KEY_ID: &str = "KeyID";

const MODERN_SUPPORT: ApplyTimeSupport = ApplyTimeSupport {
    supported: &[ApplyTimePolicy::Immediate, ApplyTimePolicy::OnReset],
    implicit_default: ApplyTimePolicy::OnReset,
};

/// Attribute schema of `DellStorageController`.
pub fn builtin_registry() -> AttributeRegistry {
    let rate = |name: &str| AttributeSpec::int(name).with_bounds(0, 100);
    AttributeRegistry::new(
        "DellStorageController",
        [
            AttributeSpec::enumeration(CONTROLLER_MODE, &["RAID", "HBA", "EnhancedHBA"]),
            AttributeSpec::enumeration("CheckConsistencyMode", &["Normal", "StopOnError"]),
            AttributeSpec::enumeration("CopybackMode", &["On", "OnWithSMART", "Off"]),
            AttributeSpec::enumeration("LoadBalanceMode", &["Automatic", "Disabled"]),
            AttributeSpec::enumeration(
                "EnhancedAutoImportForeignConfigurationMode",
                &["Enabled", "Disabled"],
            ),
            AttributeSpec::enumeration("PatrolReadUnconfiguredAreaMode", &["Enabled", "Disabled"]),
            AttributeSpec::enumeration("PatrolReadMode", &["Automatic", "Manual", "Disabled"]),
            rate("BackgroundInitializationRatePercent"),
            rate("CheckConsistencyRatePercent"),
            rate("RebuildRatePercent"),
            rate("ReconstructRatePercent"),
            AttributeSpec::string(SECURITY_STATUS).read_only(),
            AttributeSpec::string(KEY_ID).read_only(),
        ],
    )
}

// ── Security keys ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SecurityKeyOperation {
    SetControllerKey,
    ReKey,
    RemoveControllerKey,
}

/// A key action plus the fields it may need. Which fields are required
/// depends on the operation and is checked before anything is sent.
#[derive(Debug, Clone)]
pub struct SecurityKeyRequest {
    pub operation: SecurityKeyOperation,
    pub key: Option<SecretString>,
    pub old_key: Option<SecretString>,
    pub key_id: Option<String>,
}

impl SecurityKeyRequest {
    pub fn set(key: SecretString, key_id: impl Into<String>) -> Self {
        Self {
            operation: SecurityKeyOperation::SetControllerKey,
            key: Some(key),
            old_key: None,
            key_id: Some(key_id.into()),
        }
    }

    pub fn rekey(old_key: SecretString, new_key: SecretString, key_id: impl Into<String>) -> Self {
        Self {
            operation: SecurityKeyOperation::ReKey,
            key: Some(new_key),
            old_key: Some(old_key),
            key_id: Some(key_id.into()),
        }
    }

    pub fn remove() -> Self {
        Self {
            operation: SecurityKeyOperation::RemoveControllerKey,
            key: None,
            old_key: None,
            key_id: None,
        }
    }

    fn check_fields(&self) -> Result<(), String> {
        let has_key = self.key.is_some();
        let has_old = self.old_key.is_some();
        let has_id = self.key_id.as_deref().is_some_and(|id| !id.trim().is_empty());
        match self.operation {
            SecurityKeyOperation::SetControllerKey if !(has_key && has_id) => {
                Err("SetControllerKey requires a key and a key id".into())
            }
            SecurityKeyOperation::ReKey if !(has_key && has_old && has_id) => {
                Err("ReKey requires the old key, the new key and a key id".into())
            }
            SecurityKeyOperation::RemoveControllerKey if has_key || has_old || has_id => {
                Err("RemoveControllerKey takes no key fields".into())
            }
            _ => Ok(()),
        }
    }

    fn body(&self, controller_id: &str) -> Value {
        let secret = |s: &Option<SecretString>| {
            s.as_ref()
                .map(|k| Value::from(k.expose_secret()))
                .unwrap_or(Value::Null)
        };
        match self.operation {
            SecurityKeyOperation::SetControllerKey => json!({
                "TargetFQDD": controller_id,
                "Key": secret(&self.key),
                "Keyid": self.key_id,
            }),
            SecurityKeyOperation::ReKey => json!({
                "TargetFQDD": controller_id,
                "OldKey": secret(&self.old_key),
                "NewKey": secret(&self.key),
                "Keyid": self.key_id,
                "Mode": "LKM",
            }),
            SecurityKeyOperation::RemoveControllerKey => json!({ "TargetFQDD": controller_id }),
        }
    }
}

// ── Resource ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StorageDesired {
    pub attributes: DesiredAttributes,
    pub key_action: Option<SecurityKeyRequest>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageState {
    pub attributes: CurrentAttributes,
    pub generation: Option<ControllerGeneration>,
}

impl StorageState {
    pub fn key_assigned(&self) -> bool {
        self.attributes.get(SECURITY_STATUS).and_then(Value::as_str) == Some(KEY_ASSIGNED)
    }

    /// Identifier of the key the controller currently holds, if reported.
    pub fn key_id(&self) -> Option<&str> {
        self.attributes
            .get(KEY_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    fn is_modern(&self) -> bool {
        self.generation.is_some_and(ControllerGeneration::is_modern)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageDiff {
    pub attributes: AttributeDiff,
    pub key_action: Option<SecurityKeyRequest>,
}

impl ChangeSet for StorageDiff {
    fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.key_action.is_none()
    }

    fn summary(&self) -> Vec<String> {
        let mut out: Vec<String> = self.attributes.names().map(str::to_owned).collect();
        if let Some(action) = &self.key_action {
            out.push(action.operation.to_string());
        }
        out
    }
}

/// One RAID controller, e.g. `RAID.Integrated.1-1`.
#[derive(Debug, Clone)]
pub struct StorageController {
    system_id: String,
    manager_id: String,
    controller_id: String,
}

impl StorageController {
    pub fn new(
        system_id: impl Into<String>,
        manager_id: impl Into<String>,
        controller_id: impl Into<String>,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            manager_id: manager_id.into(),
            controller_id: controller_id.into(),
        }
    }

    fn storage_uri(&self) -> String {
        format!(
            "/redfish/v1/Systems/{}/Storage/{}",
            self.system_id, self.controller_id
        )
    }

    /// Older controllers take changes on the settings object; 17G and
    /// later on the controller resource itself.
    pub fn settings_uri(&self, generation: Option<ControllerGeneration>) -> String {
        if generation.is_some_and(ControllerGeneration::is_modern) {
            format!("{}/Controllers/{}", self.storage_uri(), self.controller_id)
        } else {
            format!("{}/Settings", self.storage_uri())
        }
    }

    fn action_uri(&self, operation: SecurityKeyOperation) -> String {
        format!(
            "/redfish/v1/Dell/Systems/{}/DellRaidService/Actions/DellRaidService.{operation}",
            self.system_id
        )
    }

    fn support(state: &StorageState) -> ApplyTimeSupport {
        if state.is_modern() {
            MODERN_SUPPORT
        } else {
            ApplyTimeSupport::ALL
        }
    }
}

#[async_trait]
impl Resource for StorageController {
    type Desired = StorageDesired;
    type State = StorageState;
    type Diff = StorageDiff;

    fn describe(&self) -> String {
        format!("Storage {}", self.controller_id)
    }

    async fn read(&self, api: &dyn ManagementApi) -> Result<Self::State, CoreError> {
        let label = self.describe();
        let doc = api
            .get_resource(&self.storage_uri())
            .await
            .map_err(|e| CoreError::read(label.clone(), e))?;
        let attributes = attributes_at(
            &doc,
            "/Oem/Dell/DellStorageController",
            "Oem.Dell.DellStorageController",
            &label,
        )?;

        let manager_uri = format!("/redfish/v1/Managers/{}", self.manager_id);
        let manager: Manager = fetch_document(api, &manager_uri)
            .await
            .map_err(|e| CoreError::read(format!("manager {}", self.manager_id), e))?;
        let generation = controller_generation(&manager);
        if generation.is_none() {
            warn!(model = ?manager.model, "cannot tell controller generation, assuming pre-17G");
        }
        debug!(controller = %self.controller_id, ?generation, "read storage controller");

        Ok(StorageState {
            attributes,
            generation,
        })
    }

    async fn diff(
        &self,
        _api: &dyn ManagementApi,
        desired: &Self::Desired,
        current: &Self::State,
    ) -> Result<Self::Diff, CoreError> {
        let attributes = compute_diff(&builtin_registry(), &desired.attributes, &current.attributes)?;

        let key_action = desired.key_action.as_ref().and_then(|req| {
            let already = match req.operation {
                SecurityKeyOperation::SetControllerKey => current.key_assigned(),
                SecurityKeyOperation::RemoveControllerKey => !current.key_assigned(),
                // Done once the controller holds the new key id.
                SecurityKeyOperation::ReKey => {
                    current.key_assigned() && current.key_id() == req.key_id.as_deref()
                }
            };
            if already {
                debug!(operation = %req.operation, "security key already in requested state");
                None
            } else {
                Some(req.clone())
            }
        });

        Ok(StorageDiff {
            attributes,
            key_action,
        })
    }

    fn validate(
        &self,
        diff: &Self::Diff,
        current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<(), CoreError> {
        let label = self.describe();

        if let Some(action) = &diff.key_action {
            action
                .check_fields()
                .map_err(|message| CoreError::rule(label.clone(), message))?;
            if !diff.attributes.is_empty() {
                return Err(CoreError::rule(
                    label,
                    format!(
                        "{} cannot run together with controller setting changes",
                        action.operation
                    ),
                ));
            }
            if action.operation == SecurityKeyOperation::ReKey && !current.key_assigned() {
                return Err(CoreError::rule(
                    label,
                    "ReKey requires a controller that already holds a key",
                ));
            }
        }

        if diff.attributes.contains(CONTROLLER_MODE) {
            if diff.attributes.len() > 1 || diff.key_action.is_some() {
                return Err(CoreError::rule(
                    label,
                    "ControllerMode cannot change together with other controller settings or a security-key action",
                ));
            }
            if apply.policy != ApplyTimePolicy::OnReset {
                return Err(CoreError::rule(
                    label,
                    format!("ControllerMode changes require OnReset, not {}", apply.policy),
                ));
            }
        }

        if !diff.attributes.is_empty() {
            payload::validate_apply_time(&label, &Self::support(current), apply)?;
        }
        Ok(())
    }

    fn build(
        &self,
        diff: &Self::Diff,
        current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<Plan, CoreError> {
        let label = self.describe();
        let mut plan = Plan::default();

        if let Some(action) = &diff.key_action {
            plan.submissions.push(Submission {
                label: format!("{label} {}", action.operation),
                method: Method::Post,
                uri: self.action_uri(action.operation),
                body: action.body(&self.controller_id),
                completion: Completion::Await,
            });
        }

        if !diff.attributes.is_empty() {
            let body = payload::build(
                &label,
                &Self::support(current),
                KEY_PATH,
                &diff.attributes,
                apply,
            )?;
            plan.submissions.push(Submission {
                label,
                method: Method::Patch,
                uri: self.settings_uri(current.generation),
                body,
                completion: completion_for(apply),
            });
            plan.reboot = apply.policy.requires_reboot();
        }

        Ok(plan)
    }
}
