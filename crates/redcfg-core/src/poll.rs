// ── Bounded polling ──
//
// Shared by the power controller and the job poller: fixed interval, hard
// timeout, optional caller deadline, cooperative cancellation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
    /// Absolute cut-off from the caller; wins over `timeout` when earlier.
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl PollSchedule {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// When a poll loop started at `start` must give up.
    pub fn expires_at(&self, start: Instant) -> Instant {
        let by_timeout = start + self.timeout;
        match self.deadline {
            Some(deadline) if deadline < by_timeout => deadline,
            _ => by_timeout,
        }
    }

    /// How long a poll loop started at `start` may run, deadline included.
    pub fn bound_from(&self, start: Instant) -> Duration {
        self.expires_at(start).saturating_duration_since(start)
    }

    /// Sleep one interval (never past `expires`), or fail if cancelled.
    pub async fn tick(&self, expires: Instant, phase: &'static str) -> Result<(), CoreError> {
        let wake = (Instant::now() + self.interval).min(expires);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled { phase }),
            () = tokio::time::sleep_until(wake) => Ok(()),
        }
    }
}
