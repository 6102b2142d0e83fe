// ── API-to-domain type conversions ──
//
// Bridges raw `redcfg_api::models` documents into the typed forms the
// engine reasons about. Missing optional data becomes "unset", never an
// invented default.

use redcfg_api::models::{
    AccountService, AttributeRegistryDocument, BootSettings, ExternalAccountProvider, Manager,
    RegistryAttribute,
};

use crate::model::ControllerGeneration;
use crate::registry::{AttributeKind, AttributeRegistry, AttributeSpec};
use crate::resource::{BootOverride, BootState, DirectoryState, LdapSearch, ProviderSettings};

// ── Registries ─────────────────────────────────────────────────────

impl From<RegistryAttribute> for AttributeSpec {
    fn from(attr: RegistryAttribute) -> Self {
        Self {
            name: attr.attribute_name,
            kind: AttributeKind::from_redfish(&attr.attribute_type),
            allowed_values: attr.value.into_iter().map(|v| v.value_name).collect(),
            lower_bound: attr.lower_bound,
            upper_bound: attr.upper_bound,
            read_only: attr.read_only,
        }
    }
}

impl From<AttributeRegistryDocument> for AttributeRegistry {
    fn from(doc: AttributeRegistryDocument) -> Self {
        AttributeRegistry::new(
            doc.id,
            doc.registry_entries
                .attributes
                .into_iter()
                .map(AttributeSpec::from),
        )
    }
}

// ── Managers ───────────────────────────────────────────────────────

/// Platform generation of the manager, when its model string carries one.
pub fn controller_generation(manager: &Manager) -> Option<ControllerGeneration> {
    manager
        .model
        .as_deref()
        .and_then(ControllerGeneration::from_model)
}

// ── Boot ───────────────────────────────────────────────────────────

impl From<BootSettings> for BootState {
    fn from(boot: BootSettings) -> Self {
        Self {
            boot_order: boot.boot_order,
            boot_override: BootOverride {
                enabled: boot.boot_source_override_enabled,
                target: boot.boot_source_override_target,
                mode: boot.boot_source_override_mode,
            },
        }
    }
}

// ── Directory services ─────────────────────────────────────────────

impl From<ExternalAccountProvider> for ProviderSettings {
    fn from(provider: ExternalAccountProvider) -> Self {
        let search = provider
            .ldap_service
            .and_then(|svc| svc.search_settings)
            .map(|s| LdapSearch {
                base_distinguished_names: Some(s.base_distinguished_names),
                username_attribute: s.username_attribute,
                groups_attribute: s.groups_attribute,
            });
        Self {
            service_enabled: provider.service_enabled,
            service_addresses: Some(provider.service_addresses),
            username: provider.authentication.and_then(|a| a.username),
            password: None,
            role_mappings: Some(provider.remote_role_mapping),
            search,
        }
    }
}

impl From<AccountService> for DirectoryState {
    fn from(service: AccountService) -> Self {
        Self {
            active_directory: service
                .active_directory
                .map(ProviderSettings::from)
                .unwrap_or_default(),
            ldap: service.ldap.map(ProviderSettings::from).unwrap_or_default(),
        }
    }
}
