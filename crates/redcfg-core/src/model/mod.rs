// ── Domain model ──
//
// Caller-facing types for reconciliation. Wire documents live in
// `redcfg_api::models`; these are the typed forms the engine reasons about.

pub mod apply_time;
pub mod attribute;
pub mod endpoint;
pub mod generation;
pub mod power;

pub use apply_time::{ApplySettings, ApplyTimePolicy, MaintenanceWindow};
pub use attribute::{
    AttributeDiff, AttributeValue, CurrentAttributes, DesiredAttributes, TypedValue,
};
pub use endpoint::{
    DEFAULT_MANAGER_ID, DEFAULT_SYSTEM_ID, EndpointKey, ManagedEndpoint, TlsVerification,
};
pub use generation::ControllerGeneration;
pub use power::{PowerState, ResetType};
