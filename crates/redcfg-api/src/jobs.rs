// Job and task endpoints
//
// Dell services report configuration jobs under `/Managers/{id}/Jobs`,
// standard services report tasks under `/TaskService/Tasks`. Both are
// fetched by the URI the submission returned.

use crate::client::RedfishClient;
use crate::error::Error;
use crate::models::{JobDocument, TaskDocument};

impl RedfishClient {
    pub async fn get_job(&self, uri: &str) -> Result<JobDocument, Error> {
        self.get(uri).await
    }

    pub async fn get_task(&self, uri: &str) -> Result<TaskDocument, Error> {
        self.get(uri).await
    }
}
