// ── Power model ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Host power state as reported by `ComputerSystem.PowerState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum PowerState {
    On,
    Off,
    PoweringOn,
    PoweringOff,
    Paused,
    #[serde(other)]
    Unknown,
}

impl PowerState {
    /// Parse a Redfish `PowerState` string; anything unrecognized is `Unknown`.
    pub fn from_redfish(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Unknown)
    }

    /// Whether the host is on its way to `target`.
    pub fn is_transitioning_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PoweringOn, Self::On) | (Self::PoweringOff, Self::Off)
        )
    }
}

/// `ComputerSystem.Reset` action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ResetType {
    On,
    ForceOff,
    GracefulShutdown,
    GracefulRestart,
    ForceRestart,
    PowerCycle,
    PushPowerButton,
    Nmi,
}

impl ResetType {
    /// The power state the host settles in once the reset completes.
    pub fn target_state(self) -> PowerState {
        match self {
            Self::ForceOff | Self::GracefulShutdown => PowerState::Off,
            Self::On
            | Self::GracefulRestart
            | Self::ForceRestart
            | Self::PowerCycle
            | Self::PushPowerButton
            | Self::Nmi => PowerState::On,
        }
    }

    /// Restarts pass through Off, so an On host is not already "done".
    pub fn is_restart(self) -> bool {
        matches!(
            self,
            Self::GracefulRestart | Self::ForceRestart | Self::PowerCycle
        )
    }
}
