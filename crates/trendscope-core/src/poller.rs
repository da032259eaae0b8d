use std::time::Duration;

use crate::{
    client::JobService,
    error::{Result, TrendscopeError},
    types::{JobHandle, JobState, JobStatus},
};

/// How often and how long to wait on a scraping job.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Stop after this many status checks. `None` waits until the job is ready or failed.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    /// Treats `Some(0)` as unbounded.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }
}

/// Poll `handle` until the job is ready or failed.
///
/// Every observed status is passed to `on_status` together with its attempt number.
/// Returns the ready status; a failed job becomes [`TrendscopeError::JobFailed`]. With a
/// `max_attempts` bound, running out becomes [`TrendscopeError::PollTimeout`].
pub async fn wait_for_job<S, F>(
    service: &S,
    handle: &JobHandle,
    policy: &PollPolicy,
    mut on_status: F,
) -> Result<JobStatus>
where
    S: JobService + ?Sized,
    F: FnMut(u32, &JobStatus),
{
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        let status = service.poll(handle).await?;
        on_status(attempt, &status);

        match status.state {
            JobState::Ready => {
                tracing::info!(snapshot_id = %handle, attempt, "Scraping job ready");
                return Ok(status);
            }
            JobState::Failed => {
                tracing::warn!(snapshot_id = %handle, payload = %status.payload, "Scraping job failed");
                return Err(TrendscopeError::JobFailed {
                    snapshot_id: handle.to_string(),
                    payload: status.payload,
                });
            }
            JobState::Running => {
                tracing::debug!(snapshot_id = %handle, attempt, status = %status.status, "Job still in progress");
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(TrendscopeError::PollTimeout {
                        snapshot_id: handle.to_string(),
                        attempts: attempt,
                        last_status: status.status,
                    });
                }
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
