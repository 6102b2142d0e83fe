// ── Patch payload builder ──
//
// Pure functions from (diff, apply settings) to a vendor request body.
// Validation of the apply time happens here too so nothing is submitted
// with a policy the target cannot honor.

use serde_json::{Map, Value, json};

use crate::error::CoreError;
use crate::model::{ApplySettings, ApplyTimePolicy, AttributeDiff, MaintenanceWindow};

pub const SETTINGS_APPLY_TIME: &str = "@Redfish.SettingsApplyTime";

/// Apply-time policies a target accepts, and the one it uses when the body
/// carries no `@Redfish.SettingsApplyTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyTimeSupport {
    pub supported: &'static [ApplyTimePolicy],
    pub implicit_default: ApplyTimePolicy,
}

impl ApplyTimeSupport {
    pub const ALL: Self = Self {
        supported: &[
            ApplyTimePolicy::Immediate,
            ApplyTimePolicy::OnReset,
            ApplyTimePolicy::AtMaintenanceWindowStart,
            ApplyTimePolicy::InMaintenanceWindowOnReset,
        ],
        implicit_default: ApplyTimePolicy::OnReset,
    };

    pub const IMMEDIATE_ONLY: Self = Self {
        supported: &[ApplyTimePolicy::Immediate],
        implicit_default: ApplyTimePolicy::Immediate,
    };

    pub const DEFERRED_ONLY: Self = Self {
        supported: &[
            ApplyTimePolicy::OnReset,
            ApplyTimePolicy::AtMaintenanceWindowStart,
            ApplyTimePolicy::InMaintenanceWindowOnReset,
        ],
        implicit_default: ApplyTimePolicy::OnReset,
    };

    pub fn supports(&self, policy: ApplyTimePolicy) -> bool {
        self.supported.contains(&policy)
    }
}

/// Reject policies the target does not accept, then maintenance policies
/// without a window or with a zero-length one.
pub fn validate_apply_time(
    group: &str,
    support: &ApplyTimeSupport,
    apply: &ApplySettings,
) -> Result<(), CoreError> {
    if !support.supports(apply.policy) {
        return Err(CoreError::UnsupportedApplyTime {
            policy: apply.policy,
            group: group.to_owned(),
        });
    }
    if apply.policy.is_maintenance_window()
        && apply.window.as_ref().is_none_or(MaintenanceWindow::is_empty)
    {
        return Err(CoreError::MissingMaintenanceWindow {
            policy: apply.policy,
        });
    }
    Ok(())
}

/// Add `@Redfish.SettingsApplyTime` to `body` unless the policy is the
/// target's implicit default.
pub fn with_apply_time(
    mut body: Map<String, Value>,
    support: &ApplyTimeSupport,
    apply: &ApplySettings,
) -> Map<String, Value> {
    if apply.policy == support.implicit_default {
        return body;
    }

    let mut settings = Map::new();
    settings.insert("ApplyTime".into(), json!(apply.policy.to_string()));
    if let Some(window) = apply
        .window
        .as_ref()
        .filter(|_| apply.policy.is_maintenance_window())
    {
        settings.insert(
            "MaintenanceWindowStartTime".into(),
            json!(window.start_time()),
        );
        settings.insert(
            "MaintenanceWindowDurationInSeconds".into(),
            json!(window.duration_secs()),
        );
    }
    body.insert(SETTINGS_APPLY_TIME.into(), Value::Object(settings));
    body
}

/// Nest `inner` under a dotted key path (`Oem.Dell.DellStorageController`).
pub fn nest(key_path: &str, inner: Value) -> Map<String, Value> {
    let mut value = inner;
    for key in key_path.rsplit('.') {
        let mut wrapper = Map::new();
        wrapper.insert(key.to_owned(), value);
        value = Value::Object(wrapper);
    }
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert(key_path.to_owned(), other);
            map
        }
    }
}

/// Validate, then build the PATCH body for an attribute diff.
pub fn build(
    group: &str,
    support: &ApplyTimeSupport,
    key_path: &str,
    diff: &AttributeDiff,
    apply: &ApplySettings,
) -> Result<Value, CoreError> {
    validate_apply_time(group, support, apply)?;
    let body = nest(key_path, Value::Object(diff.to_json_map()));
    Ok(Value::Object(with_apply_time(body, support, apply)))
}
