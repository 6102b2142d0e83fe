// ── Registry-backed attribute groups ──
//
// BIOS, iDRAC manager and NIC function attributes share one shape: a flat
// `Attributes` object validated by a device registry and changed through a
// settings resource.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Method, Plan, Resource, Submission, attributes_at, completion_for};
use crate::device::ManagementApi;
use crate::diff::compute_diff;
use crate::error::CoreError;
use crate::model::{ApplySettings, AttributeDiff, CurrentAttributes, DesiredAttributes};
use crate::payload::{self, ApplyTimeSupport};
use crate::registry::AttributeRegistry;

/// A flat attribute set behind a registry.
#[derive(Debug, Clone)]
pub struct AttributeGroup {
    label: String,
    read_uri: String,
    settings_uri: String,
    /// Registry used when the document does not name one.
    fallback_registry: &'static str,
    support: ApplyTimeSupport,
}

/// Current attributes plus the registry the device says they follow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeGroupState {
    pub attributes: CurrentAttributes,
    pub registry: Option<String>,
}

impl AttributeGroup {
    /// `Systems/{sys}/Bios`, changed through `Bios/Settings`.
    pub fn bios(system_id: &str) -> Self {
        let read_uri = format!("/redfish/v1/Systems/{system_id}/Bios");
        Self {
            label: "BIOS".into(),
            settings_uri: format!("{read_uri}/Settings"),
            read_uri,
            fallback_registry: "BiosAttributeRegistry",
            support: ApplyTimeSupport::ALL,
        }
    }

    /// iDRAC attributes. Applied immediately, never through a job.
    pub fn manager(manager_id: &str) -> Self {
        let read_uri =
            format!("/redfish/v1/Managers/{manager_id}/Oem/Dell/DellAttributes/{manager_id}");
        Self {
            label: format!("Manager {manager_id}"),
            settings_uri: read_uri.clone(),
            read_uri,
            fallback_registry: "ManagerAttributeRegistry",
            support: ApplyTimeSupport::IMMEDIATE_ONLY,
        }
    }

    /// Dell network attributes of one NIC port function.
    pub fn network_function(system_id: &str, adapter_id: &str, function_id: &str) -> Self {
        let read_uri = format!(
            "/redfish/v1/Chassis/{system_id}/NetworkAdapters/{adapter_id}/NetworkDeviceFunctions/{function_id}/Oem/Dell/DellNetworkAttributes/{function_id}"
        );
        Self {
            label: format!("NetworkDeviceFunction {function_id}"),
            settings_uri: format!("{read_uri}/Settings"),
            read_uri,
            fallback_registry: "NetworkAttributesRegistry",
            support: ApplyTimeSupport::DEFERRED_ONLY,
        }
    }

    pub fn read_uri(&self) -> &str {
        &self.read_uri
    }

    pub fn settings_uri(&self) -> &str {
        &self.settings_uri
    }
}

#[async_trait]
impl Resource for AttributeGroup {
    type Desired = DesiredAttributes;
    type State = AttributeGroupState;
    type Diff = AttributeDiff;

    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn read(&self, api: &dyn ManagementApi) -> Result<Self::State, CoreError> {
        let doc = api
            .get_resource(&self.read_uri)
            .await
            .map_err(|e| CoreError::read(self.label.clone(), e))?;
        let attributes = attributes_at(&doc, "/Attributes", "Attributes", &self.label)?;
        let registry = doc
            .get("AttributeRegistry")
            .and_then(Value::as_str)
            .map(str::to_owned);
        debug!(group = %self.label, count = attributes.len(), ?registry, "read attributes");
        Ok(AttributeGroupState {
            attributes,
            registry,
        })
    }

    async fn diff(
        &self,
        api: &dyn ManagementApi,
        desired: &Self::Desired,
        current: &Self::State,
    ) -> Result<Self::Diff, CoreError> {
        let name = current.registry.as_deref().unwrap_or(self.fallback_registry);
        let registry = AttributeRegistry::fetch(api, name).await?;
        compute_diff(&registry, desired, &current.attributes)
    }

    fn validate(
        &self,
        _diff: &Self::Diff,
        _current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<(), CoreError> {
        payload::validate_apply_time(&self.label, &self.support, apply)
    }

    fn build(
        &self,
        diff: &Self::Diff,
        _current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<Plan, CoreError> {
        let body = payload::build(&self.label, &self.support, "Attributes", diff, apply)?;
        Ok(Plan {
            submissions: vec![Submission {
                label: self.label.clone(),
                method: Method::Patch,
                uri: self.settings_uri.clone(),
                body,
                completion: completion_for(apply),
            }],
            reboot: apply.policy.requires_reboot(),
        })
    }
}
