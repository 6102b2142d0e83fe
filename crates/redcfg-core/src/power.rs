// ── Power operation controller ──
//
// Issues `ComputerSystem.Reset` once and then only watches `PowerState`
// until the host settles where the reset type says it should.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::device::ManagementApi;
use crate::error::CoreError;
use crate::model::{PowerState, ResetType};
use crate::poll::PollSchedule;

pub struct PowerController<'a> {
    api: &'a dyn ManagementApi,
    system_id: &'a str,
}

impl<'a> PowerController<'a> {
    pub fn new(api: &'a dyn ManagementApi, system_id: &'a str) -> Self {
        Self { api, system_id }
    }

    pub async fn current_state(&self) -> Result<PowerState, CoreError> {
        let system = self
            .api
            .get_system(self.system_id)
            .await
            .map_err(|e| CoreError::read(format!("system {}", self.system_id), e))?;
        Ok(system
            .power_state
            .as_deref()
            .map_or(PowerState::Unknown, PowerState::from_redfish))
    }

    /// Reset the host and wait for the implied power state.
    ///
    /// Non-restart resets whose target already holds issue nothing.
    pub async fn operate(
        &self,
        reset_type: ResetType,
        schedule: &PollSchedule,
    ) -> Result<PowerState, CoreError> {
        let target = reset_type.target_state();
        let before = self.current_state().await?;
        if before == target && !reset_type.is_restart() {
            debug!(system = self.system_id, %before, %reset_type, "already in target power state");
            return Ok(before);
        }

        self.issue(reset_type).await?;
        self.wait_for(target, schedule).await
    }

    /// Restart the host so pending settings apply. An Off host is
    /// powered on instead, which applies them just the same.
    pub async fn reboot_to_apply(
        &self,
        reset_type: ResetType,
        schedule: &PollSchedule,
    ) -> Result<PowerState, CoreError> {
        let effective = if self.current_state().await? == PowerState::Off {
            info!(system = self.system_id, "host is off, powering on to apply settings");
            ResetType::On
        } else {
            reset_type
        };
        self.issue(effective).await?;
        self.wait_for(effective.target_state(), schedule).await
    }

    async fn issue(&self, reset_type: ResetType) -> Result<(), CoreError> {
        let reset = reset_type.to_string();
        self.api
            .reset_system(self.system_id, &reset)
            .await
            .map_err(|source| CoreError::Submission {
                uri: format!(
                    "/redfish/v1/Systems/{}/Actions/ComputerSystem.Reset",
                    self.system_id
                ),
                source,
            })
    }

    async fn wait_for(
        &self,
        target: PowerState,
        schedule: &PollSchedule,
    ) -> Result<PowerState, CoreError> {
        let started = Instant::now();
        let expires = schedule.expires_at(started);
        loop {
            schedule.tick(expires, "waiting for power state").await?;
            let last = self.current_state().await?;
            debug!(system = self.system_id, state = %last, %target, "polled power state");

            if last == target || last.is_transitioning_to(target) {
                info!(system = self.system_id, state = %last, "power operation complete");
                return Ok(last);
            }
            if Instant::now() >= expires {
                return Err(CoreError::PowerTimeout {
                    target,
                    last,
                    timeout_secs: schedule.bound_from(started).as_secs(),
                });
            }
        }
    }
}
