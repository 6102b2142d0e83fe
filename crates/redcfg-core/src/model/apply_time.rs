// ── Apply-time policy ──
//
// When a settings change takes effect on the device. Mirrors the Redfish
// `@Redfish.SettingsApplyTime.ApplyTime` enumeration.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum ApplyTimePolicy {
    Immediate,
    #[default]
    OnReset,
    AtMaintenanceWindowStart,
    InMaintenanceWindowOnReset,
}

impl ApplyTimePolicy {
    pub fn is_maintenance_window(self) -> bool {
        matches!(
            self,
            Self::AtMaintenanceWindowStart | Self::InMaintenanceWindowOnReset
        )
    }

    /// Only `OnReset` makes the engine reboot the host itself.
    pub fn requires_reboot(self) -> bool {
        self == Self::OnReset
    }

    /// Maintenance-window changes are deferred and never waited on.
    pub fn awaits_completion(self) -> bool {
        !self.is_maintenance_window()
    }
}

/// A scheduled time range in which deferred changes may apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub start: DateTime<FixedOffset>,
    pub duration: Duration,
}

impl MaintenanceWindow {
    pub fn new(start: DateTime<FixedOffset>, duration: Duration) -> Self {
        Self { start, duration }
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }

    /// Start time in the RFC 3339 form Redfish expects.
    pub fn start_time(&self) -> String {
        self.start.to_rfc3339()
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

/// Policy plus the window it may need.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplySettings {
    pub policy: ApplyTimePolicy,
    pub window: Option<MaintenanceWindow>,
}

impl ApplySettings {
    pub fn immediate() -> Self {
        Self {
            policy: ApplyTimePolicy::Immediate,
            window: None,
        }
    }

    pub fn on_reset() -> Self {
        Self {
            policy: ApplyTimePolicy::OnReset,
            window: None,
        }
    }

    pub fn in_window(policy: ApplyTimePolicy, window: MaintenanceWindow) -> Self {
        Self {
            policy,
            window: Some(window),
        }
    }
}
