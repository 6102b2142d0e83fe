// ── Reconciliation orchestrator ──
//
// Drives one resource through lock -> read -> diff -> validate -> submit
// -> (power cycle) -> poll -> re-read -> release. Every exit path drops
// the endpoint guard before the result reaches the caller, and a failure
// anywhere skips the re-read.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::device::{Connector, ManagementApi, RedfishConnector};
use crate::error::CoreError;
use crate::job::{JobHandle, JobOutcome, JobPoller};
use crate::lock::{EndpointGuard, EndpointLocks};
use crate::model::{ApplySettings, EndpointKey, ManagedEndpoint, PowerState, ResetType};
use crate::poll::PollSchedule;
use crate::power::PowerController;
use crate::resource::{ChangeSet, Completion, Method, Plan, Resource, redact};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── Options ──────────────────────────────────────────────────────

/// Per-call knobs. Defaults suit a Dell iDRAC.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub apply: ApplySettings,
    /// Reset used when a change needs a reboot to apply.
    pub reset_type: ResetType,
    pub reset_timeout: Duration,
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    /// Absolute cut-off for the whole call, lock wait included.
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            apply: ApplySettings::default(),
            reset_type: ResetType::ForceRestart,
            reset_timeout: Duration::from_secs(120),
            job_timeout: Duration::from_secs(1200),
            poll_interval: Duration::from_secs(5),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl ReconcileOptions {
    pub fn with_apply(mut self, apply: ApplySettings) -> Self {
        self.apply = apply;
        self
    }

    pub fn power_schedule(&self) -> PollSchedule {
        self.schedule(self.reset_timeout)
    }

    pub fn job_schedule(&self) -> PollSchedule {
        self.schedule(self.job_timeout)
    }

    fn schedule(&self, timeout: Duration) -> PollSchedule {
        PollSchedule::new(self.poll_interval, timeout)
            .with_deadline(self.deadline)
            .with_cancel(self.cancel.clone())
    }
}

// ── Phases ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ReconcilePhase {
    Locked,
    Read,
    Diffed,
    Validated,
    Submitted,
    PowerCycling,
    Polling,
    Reread,
    Released,
    Failed,
}

/// Progress notification for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEvent {
    pub endpoint: EndpointKey,
    pub resource: String,
    pub phase: ReconcilePhase,
}

/// What a successful reconciliation did, plus the final device state.
#[derive(Debug, Clone)]
pub struct ReconcileReport<S> {
    pub state: S,
    /// Names of what changed; empty when the device already matched.
    pub changes: Vec<String>,
    /// Jobs that were polled to completion.
    pub jobs: Vec<String>,
    /// Jobs scheduled for a maintenance window and left pending.
    pub deferred_jobs: Vec<String>,
    pub power_cycled: bool,
}

impl<S> ReconcileReport<S> {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────

/// Entry point for reconciliations and standalone power operations.
///
/// Cheaply cloneable. Orchestrators sharing an [`EndpointLocks`] never
/// work on the same BMC at the same time.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    connector: Arc<dyn Connector>,
    locks: EndpointLocks,
    events: broadcast::Sender<PhaseEvent>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Arc::new(RedfishConnector))
    }
}

impl Orchestrator {
    /// Orchestrator on the process-wide lock registry.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_locks(connector, EndpointLocks::global())
    }

    pub fn with_locks(connector: Arc<dyn Connector>, locks: EndpointLocks) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(OrchestratorInner {
                connector,
                locks,
                events,
            }),
        }
    }

    pub fn locks(&self) -> &EndpointLocks {
        &self.inner.locks
    }

    /// Subscribe to phase transitions of every call on this orchestrator.
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.inner.events.subscribe()
    }

    // ── Reconcile ────────────────────────────────────────────────

    /// Bring `resource` on `endpoint` to `desired`.
    pub async fn reconcile<R: Resource>(
        &self,
        endpoint: &ManagedEndpoint,
        resource: &R,
        desired: &R::Desired,
        options: &ReconcileOptions,
    ) -> Result<ReconcileReport<R::State>, CoreError> {
        let key = endpoint.key();
        let label = resource.describe();

        let guard = self.lock(&key, options).await?;
        self.emit(&key, &label, ReconcilePhase::Locked);

        let result = match self.inner.connector.connect(endpoint) {
            Ok(api) => {
                self.run(api.as_ref(), endpoint, resource, desired, options)
                    .await
            }
            Err(e) => Err(e),
        };

        self.release(guard, &label, &result);
        result
    }

    async fn run<R: Resource>(
        &self,
        api: &dyn ManagementApi,
        endpoint: &ManagedEndpoint,
        resource: &R,
        desired: &R::Desired,
        options: &ReconcileOptions,
    ) -> Result<ReconcileReport<R::State>, CoreError> {
        let key = endpoint.key();
        let label = resource.describe();

        let current = resource.read(api).await?;
        self.emit(&key, &label, ReconcilePhase::Read);

        let diff = resource.diff(api, desired, &current).await?;
        self.emit(&key, &label, ReconcilePhase::Diffed);

        if diff.is_empty() {
            info!(endpoint = %key, resource = %label, "already in desired state");
            let state = self.reread(api, resource, &key).await?;
            return Ok(ReconcileReport {
                state,
                changes: Vec::new(),
                jobs: Vec::new(),
                deferred_jobs: Vec::new(),
                power_cycled: false,
            });
        }

        let changes = diff.summary();
        debug!(endpoint = %key, resource = %label, ?changes, "computed diff");

        resource.validate(&diff, &current, &options.apply)?;
        let plan = resource.build(&diff, &current, &options.apply)?;
        self.emit(&key, &label, ReconcilePhase::Validated);

        let (handles, deferred_jobs) = Self::submit(api, &key, &plan).await?;
        self.emit(&key, &label, ReconcilePhase::Submitted);

        let power_cycled = plan.reboot;
        if plan.reboot {
            self.emit(&key, &label, ReconcilePhase::PowerCycling);
            let state = PowerController::new(api, &endpoint.system_id)
                .reboot_to_apply(options.reset_type, &options.power_schedule())
                .await?;
            info!(endpoint = %key, %state, "host power cycled to apply settings");
        }

        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            self.emit(&key, &label, ReconcilePhase::Polling);
            let schedule = options.job_schedule();
            let started = Instant::now();
            match JobPoller::new(api).wait(&handle, &schedule).await? {
                JobOutcome::Completed => jobs.push(handle.uri),
                JobOutcome::Failed(message) => {
                    return Err(CoreError::JobFailed {
                        job: handle.uri,
                        message,
                    });
                }
                JobOutcome::TimedOut => {
                    return Err(CoreError::JobTimedOut {
                        job: handle.uri,
                        timeout_secs: schedule.bound_from(started).as_secs(),
                        interval_secs: schedule.interval.as_secs(),
                    });
                }
            }
        }

        let state = self.reread(api, resource, &key).await?;
        info!(endpoint = %key, resource = %label, ?changes, "reconciled");
        Ok(ReconcileReport {
            state,
            changes,
            jobs,
            deferred_jobs,
            power_cycled,
        })
    }

    /// Send every submission in order. Returns the jobs to wait on and
    /// the jobs left scheduled.
    async fn submit(
        api: &dyn ManagementApi,
        key: &EndpointKey,
        plan: &Plan,
    ) -> Result<(Vec<JobHandle>, Vec<String>), CoreError> {
        let mut handles = Vec::new();
        let mut deferred = Vec::new();

        for submission in &plan.submissions {
            info!(endpoint = %key, target = %submission.label, uri = %submission.uri, "submitting change");
            trace!(body = %redact(&submission.body), "request body");

            let response = match submission.method {
                Method::Patch => api.patch(&submission.uri, &submission.body).await,
                Method::Post => api.post(&submission.uri, &submission.body).await,
            }
            .map_err(|source| CoreError::Submission {
                uri: submission.uri.clone(),
                source,
            })?;

            let Some(location) = response.location else {
                debug!(uri = %submission.uri, status = response.status, "applied without a job");
                continue;
            };
            if location.trim().is_empty() {
                return Err(CoreError::MissingJobLocation {
                    uri: submission.uri.clone(),
                });
            }

            match submission.completion {
                Completion::Await => handles.push(JobHandle::from_location(&location)?),
                Completion::Deferred => {
                    info!(job = %location, "change scheduled for the maintenance window");
                    deferred.push(location);
                }
            }
        }

        Ok((handles, deferred))
    }

    async fn reread<R: Resource>(
        &self,
        api: &dyn ManagementApi,
        resource: &R,
        key: &EndpointKey,
    ) -> Result<R::State, CoreError> {
        let label = resource.describe();
        let state = resource
            .read(api)
            .await
            .map_err(|source| CoreError::Reread {
                resource: label.clone(),
                source: Box::new(source),
            })?;
        self.emit(key, &label, ReconcilePhase::Reread);
        Ok(state)
    }

    // ── Power ────────────────────────────────────────────────────

    /// Standalone power operation, serialized with reconciliations on
    /// the same endpoint.
    pub async fn power(
        &self,
        endpoint: &ManagedEndpoint,
        reset_type: ResetType,
        options: &ReconcileOptions,
    ) -> Result<PowerState, CoreError> {
        let key = endpoint.key();
        let label = format!("Power {}", endpoint.system_id);

        let guard = self.lock(&key, options).await?;
        self.emit(&key, &label, ReconcilePhase::Locked);

        let result = match self.inner.connector.connect(endpoint) {
            Ok(api) => {
                PowerController::new(api.as_ref(), &endpoint.system_id)
                    .operate(reset_type, &options.power_schedule())
                    .await
            }
            Err(e) => Err(e),
        };

        self.release(guard, &label, &result);
        result
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn lock(
        &self,
        key: &EndpointKey,
        options: &ReconcileOptions,
    ) -> Result<EndpointGuard, CoreError> {
        let deadline = async {
            match options.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = options.cancel.cancelled() => Err(CoreError::Cancelled {
                phase: "waiting for the endpoint lock",
            }),
            guard = self.inner.locks.acquire(key) => Ok(guard),
            () = deadline => {
                warn!(endpoint = %key, "deadline passed while waiting for endpoint lock");
                Err(CoreError::LockUnavailable {
                    endpoint: key.to_string(),
                })
            }
        }
    }

    fn release<T>(&self, guard: EndpointGuard, label: &str, result: &Result<T, CoreError>) {
        let key = guard.key().clone();
        drop(guard);
        match result {
            Ok(_) => self.emit(&key, label, ReconcilePhase::Released),
            Err(e) => {
                warn!(endpoint = %key, resource = label, kind = %e.kind(), error = %e, "reconciliation failed");
                self.emit(&key, label, ReconcilePhase::Failed);
            }
        }
    }

    fn emit(&self, key: &EndpointKey, resource: &str, phase: ReconcilePhase) {
        trace!(endpoint = %key, resource, %phase, "phase");
        // No receivers is fine.
        let _ = self.inner.events.send(PhaseEvent {
            endpoint: key.clone(),
            resource: resource.to_owned(),
            phase,
        });
    }
}
