// ── Job / task poller ──
//
// A submission's `Location` header points at either a Dell configuration
// job (`.../Jobs/JID_...`) or a DMTF task (`.../TaskService/Tasks/...`).
// Both collapse to one outcome type.

use std::fmt;

use redcfg_api::models::{JobDocument, TaskDocument};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::device::ManagementApi;
use crate::error::CoreError;
use crate::poll::PollSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Job,
    Task,
}

/// Where to poll and how to read what comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub uri: String,
    pub kind: JobKind,
}

impl JobHandle {
    /// Classify a `Location` header value. Absolute URLs are reduced to
    /// their path so they resolve against the session's base URL.
    pub fn from_location(location: &str) -> Result<Self, CoreError> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(CoreError::MissingJobLocation {
                uri: location.to_owned(),
            });
        }

        let uri = match Url::parse(trimmed) {
            Ok(url) => url.path().to_owned(),
            Err(_) => trimmed.to_owned(),
        };

        let kind = if uri.contains("/Jobs/") {
            JobKind::Job
        } else if uri.contains("/Tasks/") {
            JobKind::Task
        } else {
            return Err(CoreError::UnknownJobShape {
                location: trimmed.to_owned(),
            });
        };
        Ok(Self { uri, kind })
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Final state of a job or task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    TimedOut,
}

/// Classify a Dell job document. `None` means still running.
pub fn classify_job(doc: &JobDocument) -> Option<JobOutcome> {
    let message = || doc.message.clone().unwrap_or_else(|| "no message".into());
    match doc.job_state.as_deref()? {
        "Completed" => Some(JobOutcome::Completed),
        "Failed" | "CompletedWithErrors" => Some(JobOutcome::Failed(message())),
        _ => None,
    }
}

/// Classify a task document. `None` means still running.
pub fn classify_task(doc: &TaskDocument) -> Option<JobOutcome> {
    let message = || {
        doc.messages
            .iter()
            .find_map(|m| m.message.clone())
            .unwrap_or_else(|| "no message".into())
    };
    let critical = doc.task_status.as_deref() == Some("Critical");
    match doc.task_state.as_deref()? {
        "Completed" if critical => Some(JobOutcome::Failed(message())),
        "Completed" => Some(JobOutcome::Completed),
        "Exception" | "Killed" | "Cancelled" => Some(JobOutcome::Failed(message())),
        _ => None,
    }
}

pub struct JobPoller<'a> {
    api: &'a dyn ManagementApi,
}

impl<'a> JobPoller<'a> {
    pub fn new(api: &'a dyn ManagementApi) -> Self {
        Self { api }
    }

    /// Poll until the job reaches a terminal state or the schedule expires.
    ///
    /// Fetch failures and cancellation are errors; a job that simply does
    /// not finish in time is `JobOutcome::TimedOut`.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        schedule: &PollSchedule,
    ) -> Result<JobOutcome, CoreError> {
        let expires = schedule.expires_at(Instant::now());
        let mut polls = 0_u32;

        loop {
            schedule.tick(expires, "waiting for job").await?;
            polls += 1;

            let outcome = match handle.kind {
                JobKind::Job => {
                    let doc = self
                        .api
                        .get_job(&handle.uri)
                        .await
                        .map_err(|e| CoreError::read(handle.uri.clone(), e))?;
                    debug!(job = %handle, state = ?doc.job_state, percent = ?doc.percent_complete, "polled job");
                    classify_job(&doc)
                }
                JobKind::Task => {
                    let doc = self
                        .api
                        .get_task(&handle.uri)
                        .await
                        .map_err(|e| CoreError::read(handle.uri.clone(), e))?;
                    debug!(job = %handle, state = ?doc.task_state, status = ?doc.task_status, "polled task");
                    classify_task(&doc)
                }
            };

            match outcome {
                Some(JobOutcome::Completed) => {
                    info!(job = %handle, polls, "job completed");
                    return Ok(JobOutcome::Completed);
                }
                Some(failed) => {
                    warn!(job = %handle, ?failed, "job did not succeed");
                    return Ok(failed);
                }
                None if Instant::now() >= expires => {
                    warn!(job = %handle, polls, "job still running at timeout");
                    return Ok(JobOutcome::TimedOut);
                }
                None => {}
            }
        }
    }
}
