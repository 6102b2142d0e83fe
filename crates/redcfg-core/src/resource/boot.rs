// ── Boot settings ──
//
// Boot order plus the one-shot/continuous boot-source override of the
// computer system. The order can only be rearranged: every reference must
// already exist on the device.

use std::collections::HashSet;

use async_trait::async_trait;
use redcfg_api::models::BootSettings;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ChangeSet, Method, Plan, Resource, Submission, completion_for};
use crate::device::ManagementApi;
use crate::error::CoreError;
use crate::model::{ApplySettings, ApplyTimePolicy};
use crate::payload::{self, ApplyTimeSupport};

/// Boot-source override fields. `None` leaves a field unmanaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootOverride {
    pub enabled: Option<String>,
    pub target: Option<String>,
    pub mode: Option<String>,
}

impl BootOverride {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.target.is_none() && self.mode.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootDesired {
    pub boot_order: Option<Vec<String>>,
    pub boot_override: BootOverride,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootState {
    pub boot_order: Vec<String>,
    pub boot_override: BootOverride,
}

/// Only the fields that differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootDiff {
    pub boot_order: Option<Vec<String>>,
    pub boot_override: BootOverride,
}

impl ChangeSet for BootDiff {
    fn is_empty(&self) -> bool {
        self.boot_order.is_none() && self.boot_override.is_empty()
    }

    fn summary(&self) -> Vec<String> {
        let fields = [
            ("BootOrder", self.boot_order.is_some()),
            ("BootSourceOverrideEnabled", self.boot_override.enabled.is_some()),
            ("BootSourceOverrideTarget", self.boot_override.target.is_some()),
            ("BootSourceOverrideMode", self.boot_override.mode.is_some()),
        ];
        fields
            .into_iter()
            .filter(|(_, changed)| *changed)
            .map(|(name, _)| name.to_owned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BootSettingsResource {
    system_id: String,
}

impl BootSettingsResource {
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
        }
    }

    fn system_uri(&self) -> String {
        format!("/redfish/v1/Systems/{}", self.system_id)
    }

    /// Immediate changes go to the system itself; anything scheduled goes
    /// through its settings object.
    pub fn target_uri(&self, policy: ApplyTimePolicy) -> String {
        if policy == ApplyTimePolicy::Immediate {
            self.system_uri()
        } else {
            format!("{}/Settings", self.system_uri())
        }
    }
}

fn changed(wanted: Option<&String>, have: Option<&String>) -> Option<String> {
    wanted.filter(|w| Some(*w) != have).cloned()
}

#[async_trait]
impl Resource for BootSettingsResource {
    type Desired = BootDesired;
    type State = BootState;
    type Diff = BootDiff;

    fn describe(&self) -> String {
        format!("Boot settings {}", self.system_id)
    }

    async fn read(&self, api: &dyn ManagementApi) -> Result<Self::State, CoreError> {
        let system = api
            .get_system(&self.system_id)
            .await
            .map_err(|e| CoreError::read(self.describe(), e))?;
        let state = system.boot.map(BootState::from).unwrap_or_default();
        debug!(system = %self.system_id, order = ?state.boot_order, "read boot settings");
        Ok(state)
    }

    async fn diff(
        &self,
        _api: &dyn ManagementApi,
        desired: &Self::Desired,
        current: &Self::State,
    ) -> Result<Self::Diff, CoreError> {
        let boot_order = desired
            .boot_order
            .as_ref()
            .filter(|order| **order != current.boot_order)
            .cloned();
        let want = &desired.boot_override;
        let have = &current.boot_override;
        Ok(BootDiff {
            boot_order,
            boot_override: BootOverride {
                enabled: changed(want.enabled.as_ref(), have.enabled.as_ref()),
                target: changed(want.target.as_ref(), have.target.as_ref()),
                mode: changed(want.mode.as_ref(), have.mode.as_ref()),
            },
        })
    }

    fn validate(
        &self,
        diff: &Self::Diff,
        current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<(), CoreError> {
        if let Some(order) = &diff.boot_order {
            check_permutation(order, &current.boot_order)
                .map_err(|message| CoreError::rule(self.describe(), message))?;
        }
        payload::validate_apply_time(&self.describe(), &ApplyTimeSupport::ALL, apply)
    }

    fn build(
        &self,
        diff: &Self::Diff,
        _current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<Plan, CoreError> {
        let settings = BootSettings {
            boot_order: diff.boot_order.clone().unwrap_or_default(),
            boot_source_override_enabled: diff.boot_override.enabled.clone(),
            boot_source_override_target: diff.boot_override.target.clone(),
            boot_source_override_mode: diff.boot_override.mode.clone(),
        };
        let mut boot =
            serde_json::to_value(&settings).map_err(|source| CoreError::Serialization {
                resource: self.describe(),
                source,
            })?;
        if let (None, Some(map)) = (&diff.boot_order, boot.as_object_mut()) {
            map.remove("BootOrder");
        }

        let mut body = Map::new();
        body.insert("Boot".into(), boot);
        let body = if apply.policy == ApplyTimePolicy::Immediate {
            body
        } else {
            payload::with_apply_time(body, &ApplyTimeSupport::ALL, apply)
        };

        Ok(Plan {
            submissions: vec![Submission {
                label: self.describe(),
                method: Method::Patch,
                uri: self.target_uri(apply.policy),
                body: Value::Object(body),
                completion: completion_for(apply),
            }],
            reboot: apply.policy.requires_reboot(),
        })
    }
}

/// `wanted` must reorder `current` exactly: same references, no extras,
/// no repeats.
fn check_permutation(wanted: &[String], current: &[String]) -> Result<(), String> {
    let known: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for reference in wanted {
        if !known.contains(reference.as_str()) {
            return Err(format!("boot order references unknown device {reference}"));
        }
        if !seen.insert(reference.as_str()) {
            return Err(format!("boot order lists {reference} more than once"));
        }
    }
    if seen.len() != known.len() {
        let missing: Vec<&str> = current
            .iter()
            .map(String::as_str)
            .filter(|r| !seen.contains(r))
            .collect();
        return Err(format!("boot order omits {}", missing.join(", ")));
    }
    Ok(())
}
