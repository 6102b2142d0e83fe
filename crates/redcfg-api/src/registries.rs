// Registry endpoints
//
// `/redfish/v1/Registries` lists registry files; each file points at the
// actual registry document through its `Location` entries.

use tracing::debug;

use crate::client::RedfishClient;
use crate::error::Error;
use crate::models::{AttributeRegistryDocument, Collection, RegistryFile};

pub const REGISTRIES_PATH: &str = "/redfish/v1/Registries";

impl RedfishClient {
    /// List the `@odata.id` of every registry file the service exposes.
    pub async fn list_registries(&self) -> Result<Vec<String>, Error> {
        let collection: Collection = self.get(REGISTRIES_PATH).await?;
        debug!(count = collection.members.len(), "listed registries");
        Ok(collection.members.into_iter().map(|m| m.odata_id).collect())
    }

    /// Fetch one registry file entry.
    pub async fn get_registry_file(&self, uri: &str) -> Result<RegistryFile, Error> {
        self.get(uri).await
    }

    /// Fetch an attribute registry document.
    pub async fn get_attribute_registry(
        &self,
        uri: &str,
    ) -> Result<AttributeRegistryDocument, Error> {
        self.get(uri).await
    }
}
