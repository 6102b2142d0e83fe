// Computer system endpoints
//
// Power state read and the `ComputerSystem.Reset` action.

use serde_json::json;
use tracing::info;

use crate::client::RedfishClient;
use crate::error::Error;
use crate::models::ComputerSystem;

/// `/redfish/v1/Systems/{id}`
pub fn system_path(system_id: &str) -> String {
    format!("/redfish/v1/Systems/{system_id}")
}

impl RedfishClient {
    pub async fn get_system(&self, system_id: &str) -> Result<ComputerSystem, Error> {
        self.get(&system_path(system_id)).await
    }

    /// Invoke `ComputerSystem.Reset` with the given Redfish `ResetType`.
    pub async fn reset_system(&self, system_id: &str, reset_type: &str) -> Result<(), Error> {
        let path = format!(
            "{}/Actions/ComputerSystem.Reset",
            system_path(system_id)
        );
        info!(system = system_id, reset_type, "issuing reset");
        self.post(&path, &json!({ "ResetType": reset_type })).await?;
        Ok(())
    }
}
