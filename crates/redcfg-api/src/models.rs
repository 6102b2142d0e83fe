// Redfish wire documents
//
// Only the fields reconciliation reads are modelled. Everything else in a
// document is ignored on decode; attribute payloads stay as raw JSON maps
// because their shape is defined by the device's own registry.

use serde::{Deserialize, Serialize};

/// `{"@odata.id": "..."}` navigation link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ODataLink {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// Any Redfish resource collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    #[serde(rename = "Members", default)]
    pub members: Vec<ODataLink>,
    #[serde(rename = "Members@odata.count")]
    pub count: Option<u64>,
}

/// Response to a PATCH or POST. Asynchronous operations surface their job
/// or task through the `Location` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    /// `None` when the header is absent; `Some("")` when it is present but
    /// empty, which callers must treat differently.
    pub location: Option<String>,
}

// ── Registries ──────────────────────────────────────────────────────

/// Entry of `/redfish/v1/Registries`: where the registry document lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryFile {
    pub id: String,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub location: Vec<RegistryLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryLocation {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl RegistryFile {
    /// URI of the registry document, preferring the English copy.
    pub fn document_uri(&self) -> Option<&str> {
        let english = self
            .location
            .iter()
            .find(|l| l.language.as_deref() == Some("en"))
            .and_then(|l| l.uri.as_deref());
        english.or_else(|| self.location.iter().find_map(|l| l.uri.as_deref()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeRegistryDocument {
    pub id: String,
    #[serde(default)]
    pub registry_version: Option<String>,
    pub registry_entries: RegistryEntries,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryEntries {
    #[serde(default)]
    pub attributes: Vec<RegistryAttribute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryAttribute {
    pub attribute_name: String,
    #[serde(rename = "Type")]
    pub attribute_type: String,
    #[serde(default)]
    pub value: Vec<RegistryValue>,
    #[serde(default)]
    pub lower_bound: Option<i64>,
    #[serde(default)]
    pub upper_bound: Option<i64>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryValue {
    pub value_name: String,
    #[serde(default)]
    pub value_display_name: Option<String>,
}

// ── Jobs and tasks ──────────────────────────────────────────────────

/// Dell job document (`/Managers/{id}/Jobs/JID_...`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobDocument {
    pub id: String,
    #[serde(default)]
    pub job_state: Option<String>,
    #[serde(default)]
    pub percent_complete: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// DMTF task document (`/TaskService/Tasks/{id}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDocument {
    pub id: String,
    #[serde(default)]
    pub task_state: Option<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub percent_complete: Option<u32>,
    #[serde(default)]
    pub messages: Vec<RedfishMessage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedfishMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

// ── Systems ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputerSystem {
    pub id: String,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub boot: Option<BootSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootSettings {
    #[serde(default)]
    pub boot_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_source_override_enabled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_source_override_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_source_override_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manager {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

// ── Account service ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountService {
    #[serde(rename = "ActiveDirectory", default)]
    pub active_directory: Option<ExternalAccountProvider>,
    #[serde(rename = "LDAP", default)]
    pub ldap: Option<ExternalAccountProvider>,
}

/// Shared shape of the `ActiveDirectory` and `LDAP` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExternalAccountProvider {
    #[serde(default)]
    pub service_enabled: Option<bool>,
    #[serde(default)]
    pub service_addresses: Vec<String>,
    #[serde(default)]
    pub authentication: Option<ProviderAuthentication>,
    #[serde(default)]
    pub remote_role_mapping: Vec<RoleMapping>,
    #[serde(rename = "LDAPService", default)]
    pub ldap_service: Option<LdapService>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderAuthentication {
    #[serde(default)]
    pub authentication_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleMapping {
    pub remote_group: String,
    pub local_role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LdapService {
    #[serde(default)]
    pub search_settings: Option<LdapSearchSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LdapSearchSettings {
    #[serde(default)]
    pub base_distinguished_names: Vec<String>,
    #[serde(default)]
    pub username_attribute: Option<String>,
    #[serde(default)]
    pub groups_attribute: Option<String>,
}
