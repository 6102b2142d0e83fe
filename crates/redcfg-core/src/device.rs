// ── Device seam ──
//
// Everything the engine asks of a BMC goes through `ManagementApi`, so the
// orchestrator can be driven against `RedfishClient` in production and an
// in-memory device in tests. `Connector` turns a `ManagedEndpoint` into a
// live session.

use std::sync::Arc;

use async_trait::async_trait;
use redcfg_api::models::{
    AttributeRegistryDocument, ComputerSystem, JobDocument, RegistryFile, TaskDocument,
};
use redcfg_api::{Credentials, RedfishClient, SubmitResponse, TlsMode, TransportConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{ManagedEndpoint, TlsVerification};

type ApiResult<T> = Result<T, redcfg_api::Error>;

/// The remote management operations reconciliation needs.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// GET any resource as raw JSON.
    async fn get_resource(&self, uri: &str) -> ApiResult<Value>;

    async fn patch(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse>;

    async fn post(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse>;

    async fn get_job(&self, uri: &str) -> ApiResult<JobDocument>;

    async fn get_task(&self, uri: &str) -> ApiResult<TaskDocument>;

    async fn get_system(&self, system_id: &str) -> ApiResult<ComputerSystem>;

    async fn reset_system(&self, system_id: &str, reset_type: &str) -> ApiResult<()>;

    async fn list_registries(&self) -> ApiResult<Vec<String>>;

    async fn get_registry_file(&self, uri: &str) -> ApiResult<RegistryFile>;

    async fn get_attribute_registry(&self, uri: &str) -> ApiResult<AttributeRegistryDocument>;
}

#[async_trait]
impl ManagementApi for RedfishClient {
    async fn get_resource(&self, uri: &str) -> ApiResult<Value> {
        self.get_json(uri).await
    }

    async fn patch(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse> {
        RedfishClient::patch(self, uri, body).await
    }

    async fn post(&self, uri: &str, body: &Value) -> ApiResult<SubmitResponse> {
        RedfishClient::post(self, uri, body).await
    }

    async fn get_job(&self, uri: &str) -> ApiResult<JobDocument> {
        RedfishClient::get_job(self, uri).await
    }

    async fn get_task(&self, uri: &str) -> ApiResult<TaskDocument> {
        RedfishClient::get_task(self, uri).await
    }

    async fn get_system(&self, system_id: &str) -> ApiResult<ComputerSystem> {
        RedfishClient::get_system(self, system_id).await
    }

    async fn reset_system(&self, system_id: &str, reset_type: &str) -> ApiResult<()> {
        RedfishClient::reset_system(self, system_id, reset_type).await
    }

    async fn list_registries(&self) -> ApiResult<Vec<String>> {
        RedfishClient::list_registries(self).await
    }

    async fn get_registry_file(&self, uri: &str) -> ApiResult<RegistryFile> {
        RedfishClient::get_registry_file(self, uri).await
    }

    async fn get_attribute_registry(&self, uri: &str) -> ApiResult<AttributeRegistryDocument> {
        RedfishClient::get_attribute_registry(self, uri).await
    }
}

/// GET a resource and decode it into a typed document.
pub async fn fetch_document<T: DeserializeOwned>(
    api: &dyn ManagementApi,
    uri: &str,
) -> ApiResult<T> {
    let value = api.get_resource(uri).await?;
    serde_json::from_value(value).map_err(|e| redcfg_api::Error::Deserialization {
        message: format!("{uri}: {e}"),
        body: String::new(),
    })
}

// ── Connecting ──────────────────────────────────────────────────────

/// Opens a management session for an endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &ManagedEndpoint) -> Result<Arc<dyn ManagementApi>, CoreError>;
}

/// Production connector: one `RedfishClient` per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedfishConnector;

impl Connector for RedfishConnector {
    fn connect(&self, endpoint: &ManagedEndpoint) -> Result<Arc<dyn ManagementApi>, CoreError> {
        let transport = build_transport(endpoint);
        let credentials = Credentials::new(endpoint.username.clone(), endpoint.password.clone());
        let client = RedfishClient::new(endpoint.address.clone(), credentials, &transport)
            .map_err(|e| CoreError::Config {
                message: format!("cannot build client for {}: {e}", endpoint.address),
            })?;
        debug!(endpoint = %endpoint.key(), "management session ready");
        Ok(Arc::new(client))
    }
}

fn build_transport(endpoint: &ManagedEndpoint) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&endpoint.tls),
        timeout: endpoint.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
