// ── Directory services ──
//
// Active Directory and LDAP account providers on `AccountService`. The
// two are alternatives: one call may change at most one of them.
// Bind passwords are write-only; they never take part in the diff and are
// only sent along with a provider that changes for other reasons.

use async_trait::async_trait;
use redcfg_api::models::{AccountService, RoleMapping};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{ChangeSet, Completion, Method, Plan, Resource, Submission};
use crate::device::{ManagementApi, fetch_document};
use crate::error::CoreError;
use crate::model::ApplySettings;
use crate::payload::{self, ApplyTimeSupport};

pub const ACCOUNT_SERVICE_PATH: &str = "/redfish/v1/AccountService";

/// LDAP search settings. `None` fields are unmanaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapSearch {
    pub base_distinguished_names: Option<Vec<String>>,
    pub username_attribute: Option<String>,
    pub groups_attribute: Option<String>,
}

/// Settings shared by both providers. `None` fields are unmanaged.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub service_enabled: Option<bool>,
    pub service_addresses: Option<Vec<String>>,
    pub username: Option<String>,
    /// Write-only.
    pub password: Option<SecretString>,
    pub role_mappings: Option<Vec<RoleMapping>>,
    /// LDAP only.
    pub search: Option<LdapSearch>,
}

impl ProviderSettings {
    /// Managed fields of `self` that differ from `current`.
    fn differing_fields(&self, current: &Self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.service_enabled.is_some() && self.service_enabled != current.service_enabled {
            out.push("ServiceEnabled");
        }
        if self.service_addresses.is_some() && self.service_addresses != current.service_addresses
        {
            out.push("ServiceAddresses");
        }
        if self.username.is_some() && self.username != current.username {
            out.push("Username");
        }
        if self.role_mappings.is_some() && self.role_mappings != current.role_mappings {
            out.push("RemoteRoleMapping");
        }
        if let Some(search) = &self.search {
            let have = current.search.clone().unwrap_or_default();
            let changed = (search.base_distinguished_names.is_some()
                && search.base_distinguished_names != have.base_distinguished_names)
                || (search.username_attribute.is_some()
                    && search.username_attribute != have.username_attribute)
                || (search.groups_attribute.is_some()
                    && search.groups_attribute != have.groups_attribute);
            if changed {
                out.push("SearchSettings");
            }
        }
        out
    }

    fn to_body(&self) -> Value {
        let mut body = Map::new();
        if let Some(enabled) = self.service_enabled {
            body.insert("ServiceEnabled".into(), json!(enabled));
        }
        if let Some(addresses) = &self.service_addresses {
            body.insert("ServiceAddresses".into(), json!(addresses));
        }
        let mut auth = Map::new();
        if let Some(username) = &self.username {
            auth.insert("Username".into(), json!(username));
        }
        if let Some(password) = &self.password {
            auth.insert("Password".into(), json!(password.expose_secret()));
        }
        if !auth.is_empty() {
            body.insert("Authentication".into(), Value::Object(auth));
        }
        if let Some(mappings) = &self.role_mappings {
            body.insert("RemoteRoleMapping".into(), json!(mappings));
        }
        if let Some(search) = &self.search {
            let mut settings = Map::new();
            if let Some(dns) = &search.base_distinguished_names {
                settings.insert("BaseDistinguishedNames".into(), json!(dns));
            }
            if let Some(attr) = &search.username_attribute {
                settings.insert("UsernameAttribute".into(), json!(attr));
            }
            if let Some(attr) = &search.groups_attribute {
                settings.insert("GroupsAttribute".into(), json!(attr));
            }
            body.insert(
                "LDAPService".into(),
                json!({ "SearchSettings": Value::Object(settings) }),
            );
        }
        Value::Object(body)
    }
}

/// Desired configuration of one provider.
#[derive(Debug, Clone)]
pub enum DirectoryConfig {
    ActiveDirectory(ProviderSettings),
    Ldap(ProviderSettings),
}

impl DirectoryConfig {
    /// Property name on `AccountService`.
    pub fn property(&self) -> &'static str {
        match self {
            Self::ActiveDirectory(_) => "ActiveDirectory",
            Self::Ldap(_) => "LDAP",
        }
    }

    pub fn settings(&self) -> &ProviderSettings {
        match self {
            Self::ActiveDirectory(s) | Self::Ldap(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryState {
    pub active_directory: ProviderSettings,
    pub ldap: ProviderSettings,
}

impl DirectoryState {
    fn provider(&self, config: &DirectoryConfig) -> &ProviderSettings {
        match config {
            DirectoryConfig::ActiveDirectory(_) => &self.active_directory,
            DirectoryConfig::Ldap(_) => &self.ldap,
        }
    }
}

/// Providers that change, with the fields that made them change.
#[derive(Debug, Clone, Default)]
pub struct DirectoryDiff {
    pub changes: Vec<(DirectoryConfig, Vec<&'static str>)>,
}

impl ChangeSet for DirectoryDiff {
    fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn summary(&self) -> Vec<String> {
        self.changes
            .iter()
            .flat_map(|(config, fields)| {
                fields
                    .iter()
                    .map(move |f| format!("{}.{f}", config.property()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryService;

#[async_trait]
impl Resource for DirectoryService {
    type Desired = Vec<DirectoryConfig>;
    type State = DirectoryState;
    type Diff = DirectoryDiff;

    fn describe(&self) -> String {
        "Directory service".into()
    }

    async fn read(&self, api: &dyn ManagementApi) -> Result<Self::State, CoreError> {
        let service: AccountService = fetch_document(api, ACCOUNT_SERVICE_PATH)
            .await
            .map_err(|e| CoreError::read(self.describe(), e))?;
        let state = DirectoryState::from(service);
        debug!(
            ad = ?state.active_directory.service_enabled,
            ldap = ?state.ldap.service_enabled,
            "read directory settings"
        );
        Ok(state)
    }

    async fn diff(
        &self,
        _api: &dyn ManagementApi,
        desired: &Self::Desired,
        current: &Self::State,
    ) -> Result<Self::Diff, CoreError> {
        let mut seen = Vec::new();
        let mut changes = Vec::new();
        for config in desired {
            if seen.contains(&config.property()) {
                return Err(CoreError::rule(
                    self.describe(),
                    format!("{} is configured more than once", config.property()),
                ));
            }
            seen.push(config.property());

            let fields = config.settings().differing_fields(current.provider(config));
            if !fields.is_empty() {
                changes.push((config.clone(), fields));
            }
        }
        Ok(DirectoryDiff { changes })
    }

    fn validate(
        &self,
        diff: &Self::Diff,
        _current: &Self::State,
        apply: &ApplySettings,
    ) -> Result<(), CoreError> {
        if diff.changes.len() > 1 {
            return Err(CoreError::rule(
                self.describe(),
                "ActiveDirectory and LDAP cannot both change in one call",
            ));
        }
        payload::validate_apply_time(&self.describe(), &ApplyTimeSupport::IMMEDIATE_ONLY, apply)
    }

    fn build(
        &self,
        diff: &Self::Diff,
        _current: &Self::State,
        _apply: &ApplySettings,
    ) -> Result<Plan, CoreError> {
        let mut body = Map::new();
        for (config, _) in &diff.changes {
            body.insert(config.property().into(), config.settings().to_body());
        }
        Ok(Plan {
            submissions: vec![Submission {
                label: self.describe(),
                method: Method::Patch,
                uri: ACCOUNT_SERVICE_PATH.into(),
                body: Value::Object(body),
                completion: Completion::Await,
            }],
            reboot: false,
        })
    }
}
