// In-memory Dell BMC for orchestrator tests.
//
// Serves documents by URI, records every submission, and plays back
// scripted power and job state sequences. Shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redcfg_api::SubmitResponse;
use redcfg_api::models::{
    AttributeRegistryDocument, ComputerSystem, JobDocument, RegistryFile, TaskDocument,
};
use redcfg_core::{Connector, CoreError, ManagedEndpoint, ManagementApi};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

type ApiResult<T> = Result<T, redcfg_api::Error>;

// ── Well-known URIs ─────────────────────────────────────────────────

pub const SYSTEM_ID: &str = "System.Embedded.1";
pub const MANAGER_ID: &str = "iDRAC.Embedded.1";
pub const CONTROLLER_ID: &str = "RAID.Integrated.1-1";

pub const BIOS_URI: &str = "/redfish/v1/Systems/System.Embedded.1/Bios";
pub const BIOS_SETTINGS_URI: &str = "/redfish/v1/Systems/System.Embedded.1/Bios/Settings";
pub const MANAGER_URI: &str = "/redfish/v1/Managers/iDRAC.Embedded.1";
pub const MANAGER_ATTRS_URI: &str =
    "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/iDRAC.Embedded.1";
pub const STORAGE_URI: &str = "/redfish/v1/Systems/System.Embedded.1/Storage/RAID.Integrated.1-1";
pub const RESET_URI: &str =
    "/redfish/v1/Systems/System.Embedded.1/Actions/ComputerSystem.Reset";
pub const JOB_URI: &str = "/redfish/v1/Managers/iDRAC.Embedded.1/Jobs/JID_000000000001";

const BIOS_REGISTRY_MEMBER: &str = "/redfish/v1/Registries/BiosAttributeRegistry.v1_0_3";
const BIOS_REGISTRY_DOC: &str = "/redfish/v1/Systems/System.Embedded.1/Bios/BiosRegistry";
const MANAGER_REGISTRY_MEMBER: &str = "/redfish/v1/Registries/ManagerAttributeRegistry.v1_0_0";
const MANAGER_REGISTRY_DOC: &str = "/redfish/v1/Registries/ManagerAttributeRegistry/en";

// ── Call counters ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Calls {
    pub reads: AtomicUsize,
    pub submissions: AtomicUsize,
    pub job_polls: AtomicUsize,
    pub resets: AtomicUsize,
    pub system_reads: AtomicUsize,
    pub registry_lists: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// One recorded PATCH or POST.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub uri: String,
    pub body: Value,
}

// ── Device ──────────────────────────────────────────────────────────

struct State {
    documents: HashMap<String, Value>,
    registry_members: Vec<String>,
    power: String,
    /// States reported after a reset, one per system read. The last sticks.
    power_after_reset: VecDeque<String>,
    reset_issued: bool,
    location: Option<String>,
    /// `JobState` values returned by successive polls. The last sticks.
    job_states: VecDeque<String>,
    submissions: Vec<Recorded>,
    /// Number of successful resource reads before every later read fails.
    fail_reads_after: Option<usize>,
    fail_submissions: bool,
    fail_registry_fetches: bool,
    /// Location returned only for submissions to this URI.
    location_for: Option<(String, String)>,
    submit_delay: Duration,
    /// Settings URI -> read URI whose `Attributes` absorb a submission.
    apply_targets: HashMap<String, String>,
    in_flight: usize,
    max_in_flight: usize,
}

pub struct FakeDevice {
    state: Mutex<State>,
    pub calls: Calls,
}

impl FakeDevice {
    /// A 16G-class server with BIOS, iDRAC and RAID documents in place.
    pub fn dell() -> Self {
        let mut documents = HashMap::new();
        documents.insert(
            BIOS_URI.to_owned(),
            json!({
                "Id": "Bios",
                "AttributeRegistry": "BiosAttributeRegistry.v1_0_3",
                "Attributes": {
                    "LogicalProc": "Enabled",
                    "AcPwrRcvryUserDelay": 120,
                    "WorkloadProfile": "NotAvailable",
                    "SystemServiceTag": "ABC1234"
                }
            }),
        );
        documents.insert(
            BIOS_REGISTRY_MEMBER.to_owned(),
            json!({
                "Id": "BiosAttributeRegistry.v1_0_3",
                "Registry": "BiosAttributeRegistry.1.0",
                "Location": [{"Language": "en", "Uri": BIOS_REGISTRY_DOC}]
            }),
        );
        documents.insert(
            BIOS_REGISTRY_DOC.to_owned(),
            json!({
                "Id": "BiosAttributeRegistry.v1_0_3",
                "RegistryVersion": "1.0.3",
                "RegistryEntries": {"Attributes": [
                    {"AttributeName": "LogicalProc", "Type": "Enumeration",
                     "Value": [{"ValueName": "Enabled"}, {"ValueName": "Disabled"}]},
                    {"AttributeName": "AcPwrRcvryUserDelay", "Type": "Integer",
                     "LowerBound": 60, "UpperBound": 600},
                    {"AttributeName": "WorkloadProfile", "Type": "String"},
                    {"AttributeName": "SystemServiceTag", "Type": "String", "ReadOnly": true}
                ]}
            }),
        );
        documents.insert(
            MANAGER_URI.to_owned(),
            json!({"Id": MANAGER_ID, "Model": "16G Monolithic", "FirmwareVersion": "7.00.00.00"}),
        );
        documents.insert(
            MANAGER_ATTRS_URI.to_owned(),
            json!({
                "Id": MANAGER_ID,
                "AttributeRegistry": "ManagerAttributeRegistry.v1_0_0",
                "Attributes": {"IPMILan.1.Enable": "Disabled", "Time.1.Timezone": "UTC"}
            }),
        );
        documents.insert(
            MANAGER_REGISTRY_MEMBER.to_owned(),
            json!({
                "Id": "ManagerAttributeRegistry.v1_0_0",
                "Location": [{"Language": "en", "Uri": MANAGER_REGISTRY_DOC}]
            }),
        );
        documents.insert(
            MANAGER_REGISTRY_DOC.to_owned(),
            json!({
                "Id": "ManagerAttributeRegistry.v1_0_0",
                "RegistryEntries": {"Attributes": [
                    {"AttributeName": "IPMILan.1.Enable", "Type": "Enumeration",
                     "Value": [{"ValueName": "Enabled"}, {"ValueName": "Disabled"}]},
                    {"AttributeName": "Time.1.Timezone", "Type": "String"}
                ]}
            }),
        );
        documents.insert(
            STORAGE_URI.to_owned(),
            json!({
                "Id": CONTROLLER_ID,
                "Oem": {"Dell": {"DellStorageController": {
                    "ControllerMode": "RAID",
                    "PatrolReadMode": "Automatic",
                    "RebuildRatePercent": 30,
                    "SecurityStatus": "EncryptionCapable"
                }}}
            }),
        );

        let mut apply_targets = HashMap::new();
        apply_targets.insert(BIOS_SETTINGS_URI.to_owned(), BIOS_URI.to_owned());
        apply_targets.insert(MANAGER_ATTRS_URI.to_owned(), MANAGER_ATTRS_URI.to_owned());

        Self {
            state: Mutex::new(State {
                documents,
                registry_members: vec![
                    BIOS_REGISTRY_MEMBER.to_owned(),
                    MANAGER_REGISTRY_MEMBER.to_owned(),
                ],
                power: "On".into(),
                power_after_reset: VecDeque::new(),
                reset_issued: false,
                location: None,
                job_states: VecDeque::from(["Completed".to_owned()]),
                submissions: Vec::new(),
                fail_reads_after: None,
                fail_submissions: false,
                fail_registry_fetches: false,
                location_for: None,
                submit_delay: Duration::ZERO,
                apply_targets,
                in_flight: 0,
                max_in_flight: 0,
            }),
            calls: Calls::default(),
        }
    }

    // ── Scripting ───────────────────────────────────────────────────

    pub fn with_power(self, state: &str) -> Self {
        self.state.lock().unwrap().power = state.to_owned();
        self
    }

    pub fn with_power_after_reset(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().power_after_reset =
            states.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    /// Location header returned by every submission.
    pub fn with_location(self, location: &str) -> Self {
        self.state.lock().unwrap().location = Some(location.to_owned());
        self
    }

    pub fn with_job_states(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().job_states = states.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn with_document(self, uri: &str, doc: Value) -> Self {
        self.state.lock().unwrap().documents.insert(uri.to_owned(), doc);
        self
    }

    pub fn failing_reads_after(self, successes: usize) -> Self {
        self.state.lock().unwrap().fail_reads_after = Some(successes);
        self
    }

    pub fn failing_submissions(self) -> Self {
        self.state.lock().unwrap().fail_submissions = true;
        self
    }

    /// Registry files and documents answer 503.
    pub fn failing_registry_fetches(self) -> Self {
        self.state.lock().unwrap().fail_registry_fetches = true;
        self
    }

    /// Fail submissions to every URI except `uri`, which is accepted.
    pub fn accepting_only(self, uri: &str, location: &str) -> Self {
        self.state.lock().unwrap().location_for = Some((uri.to_owned(), location.to_owned()));
        self
    }

    pub fn with_submit_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().submit_delay = delay;
        self
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn submissions(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn document(&self, uri: &str) -> Value {
        self.state.lock().unwrap().documents[uri].clone()
    }

    pub fn power(&self) -> String {
        self.state.lock().unwrap().power.clone()
    }

    /// Highest number of submissions seen in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn reads(&self) -> usize {
        Calls::get(&self.calls.reads)
    }

    pub fn job_polls(&self) -> usize {
        Calls::get(&self.calls.job_polls)
    }

    pub fn resets(&self) -> usize {
        Calls::get(&self.calls.resets)
    }

    pub fn registry_lists(&self) -> usize {
        Calls::get(&self.calls.registry_lists)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn lookup(&self, uri: &str) -> ApiResult<Value> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(uri)
            .cloned()
            .ok_or_else(|| not_found(uri))
    }

    fn registry_lookup<T: serde::de::DeserializeOwned>(&self, uri: &str) -> ApiResult<T> {
        if self.state.lock().unwrap().fail_registry_fetches {
            return Err(unavailable());
        }
        decode(self.lookup(uri)?)
    }

    async fn submit(&self, method: &'static str, uri: &str, body: &Value) -> ApiResult<SubmitResponse> {
        self.calls.submissions.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.submit_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        state.submissions.push(Recorded {
            method,
            uri: uri.to_owned(),
            body: body.clone(),
        });
        if let Some((accepted, location)) = state.location_for.clone() {
            if accepted == uri {
                return Ok(SubmitResponse {
                    status: 202,
                    location: Some(location),
                });
            }
            return Err(rejected());
        }
        if state.fail_submissions {
            return Err(rejected());
        }

        if let Some(target) = state.apply_targets.get(uri).cloned() {
            if let (Some(changes), Some(doc)) = (
                body.get("Attributes").and_then(Value::as_object).cloned(),
                state.documents.get_mut(&target),
            ) {
                if let Some(attrs) = doc.get_mut("Attributes").and_then(Value::as_object_mut) {
                    attrs.extend(changes);
                }
            }
        }

        Ok(SubmitResponse {
            status: if state.location.is_some() { 202 } else { 200 },
            location: state.location.clone(),
        })
    }
}

fn rejected() -> redcfg_api::Error {
    redcfg_api::Error::Redfish {
        status: 400,
        message: "The value for the property is not valid".into(),
        message_id: Some("Base.1.12.PropertyValueNotInList".into()),
    }
}

fn unavailable() -> redcfg_api::Error {
    redcfg_api::Error::Redfish {
        status: 503,
        message: "Service temporarily unavailable".into(),
        message_id: None,
    }
}

fn not_found(uri: &str) -> redcfg_api::Error {
    redcfg_api::Error::Redfish {
        status: 404,
        message: format!("{uri} not found"),
        message_id: Some("Base.1.12.ResourceMissingAtURI".into()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| redcfg_api::Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

#[async_trait]
impl ManagementApi for FakeDevice {
    async fn get_resource(&self, uri: &str) -> ApiResult<Value> {
        let n = self.calls.reads.fetch_add(1, Ordering::SeqCst);
        let limit = self.state.lock().unwrap().fail_reads_after;
        if limit.is_some_and(|limit| n >= limit) {
            return Err(unavailable());
        }
        self.lookup(uri)
    }

    async fn patch(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse> {
        self.submit("PATCH", uri, body).await
    }

    async fn post(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse> {
        self.submit("POST", uri, body).await
    }

    async fn get_job(&self, uri: &str) -> ApiResult<JobDocument> {
        self.calls.job_polls.fetch_add(1, Ordering::SeqCst);
        let job_state = {
            let mut state = self.state.lock().unwrap();
            if state.job_states.len() > 1 {
                state.job_states.pop_front()
            } else {
                state.job_states.front().cloned()
            }
        };
        let id = uri.rsplit('/').next().unwrap_or(uri);
        let message = match job_state.as_deref() {
            Some("Failed") => "Unable to apply the configuration changes",
            _ => "Task successfully scheduled.",
        };
        decode(json!({"Id": id, "JobState": job_state, "Message": message}))
    }

    async fn get_task(&self, uri: &str) -> ApiResult<TaskDocument> {
        self.calls.job_polls.fetch_add(1, Ordering::SeqCst);
        let id = uri.rsplit('/').next().unwrap_or(uri);
        decode(json!({"Id": id, "TaskState": "Completed", "TaskStatus": "OK"}))
    }

    async fn get_system(&self, system_id: &str) -> ApiResult<ComputerSystem> {
        self.calls.system_reads.fetch_add(1, Ordering::SeqCst);
        let power = {
            let mut state = self.state.lock().unwrap();
            if state.reset_issued {
                if let Some(next) = state.power_after_reset.pop_front() {
                    state.power = next;
                }
            }
            state.power.clone()
        };
        decode(json!({
            "Id": system_id,
            "PowerState": power,
            "Boot": {
                "BootOrder": ["Boot0001", "Boot0002", "Boot0003"],
                "BootSourceOverrideEnabled": "Disabled",
                "BootSourceOverrideTarget": "None",
                "BootSourceOverrideMode": "UEFI"
            }
        }))
    }

    async fn reset_system(&self, _system_id: &str, reset_type: &str) -> ApiResult<()> {
        self.calls.resets.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.reset_issued = true;
        state.submissions.push(Recorded {
            method: "POST",
            uri: RESET_URI.to_owned(),
            body: json!({"ResetType": reset_type}),
        });
        // Without a script the host settles immediately.
        if state.power_after_reset.is_empty() {
            state.power = match reset_type {
                "ForceOff" | "GracefulShutdown" | "PushPowerButton" => "Off".into(),
                _ => "On".into(),
            };
        }
        Ok(())
    }

    async fn list_registries(&self) -> ApiResult<Vec<String>> {
        self.calls.registry_lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().registry_members.clone())
    }

    async fn get_registry_file(&self, uri: &str) -> ApiResult<RegistryFile> {
        self.registry_lookup(uri)
    }

    async fn get_attribute_registry(&self, uri: &str) -> ApiResult<AttributeRegistryDocument> {
        self.registry_lookup(uri)
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Hands out the same device for every endpoint.
pub struct FakeConnector(pub Arc<FakeDevice>);

impl Connector for FakeConnector {
    fn connect(&self, _endpoint: &ManagedEndpoint) -> Result<Arc<dyn ManagementApi>, CoreError> {
        let api: Arc<dyn ManagementApi> = self.0.clone();
        Ok(api)
    }
}

pub fn endpoint(address: &str) -> ManagedEndpoint {
    ManagedEndpoint::new(
        Url::parse(address).unwrap(),
        "root",
        SecretString::from("calvin".to_string()),
    )
}
