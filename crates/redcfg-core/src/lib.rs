//! Reconciliation engine between `redcfg-api` and callers that manage BMC
//! configuration declaratively.
//!
//! - **[`Orchestrator`]** — Drives one resource on one endpoint through
//!   lock, read, diff, validate, submit, power cycle, job polling and
//!   re-read. Calls against the same BMC are serialized by
//!   [`EndpointLocks`]; calls against different BMCs run concurrently.
//!
//! - **[`Resource`]** — Implemented by each managed area: attribute groups
//!   ([`AttributeGroup`] for BIOS, iDRAC and NIC functions), storage
//!   controllers ([`StorageController`]), boot settings
//!   ([`BootSettingsResource`]) and directory services
//!   ([`DirectoryService`]).
//!
//! - **[`AttributeRegistry`]** — Typed attribute schema fetched from the
//!   device, used to coerce desired and current values before comparing.
//!
//! - **[`PowerController`]** and **[`JobPoller`]** — Bounded polling for
//!   power transitions and asynchronous jobs/tasks.
//!
//! - **Domain model** ([`model`]) — Endpoints, attribute values, apply-time
//!   policies, power states.

pub mod convert;
pub mod device;
pub mod diff;
pub mod error;
pub mod job;
pub mod lock;
pub mod model;
pub mod orchestrator;
pub mod payload;
pub mod poll;
pub mod power;
pub mod registry;
pub mod resource;

// ── Primary re-exports ──────────────────────────────────────────────
pub use device::{Connector, ManagementApi, RedfishConnector};
pub use error::{CoreError, ErrorKind};
pub use job::{JobHandle, JobKind, JobOutcome, JobPoller};
pub use lock::{EndpointGuard, EndpointLocks};
pub use orchestrator::{
    Orchestrator, PhaseEvent, ReconcileOptions, ReconcilePhase, ReconcileReport,
};
pub use poll::PollSchedule;
pub use power::PowerController;
pub use registry::{AttributeKind, AttributeRegistry, AttributeSpec};
pub use resource::{
    AttributeGroup, AttributeGroupState, BootDesired, BootOverride, BootSettingsResource,
    BootState, ChangeSet, DirectoryConfig, DirectoryService, DirectoryState, LdapSearch, Plan,
    ProviderSettings, Resource, SecurityKeyOperation, SecurityKeyRequest, StorageController,
    StorageDesired, StorageState,
};

pub use model::{
    ApplySettings, ApplyTimePolicy, AttributeDiff, AttributeValue, ControllerGeneration,
    CurrentAttributes, DEFAULT_MANAGER_ID, DEFAULT_SYSTEM_ID, DesiredAttributes, EndpointKey,
    MaintenanceWindow, ManagedEndpoint, PowerState, ResetType, TlsVerification, TypedValue,
};
