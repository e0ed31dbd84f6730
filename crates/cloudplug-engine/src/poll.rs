//! Poll-until-converged primitive
//!
//! Cloud control planes answer mutations before the resource has settled.
//! [`poll_until`] turns that eventual consistency into a bounded synchronous
//! wait: query, judge the observation, sleep a fixed interval, repeat.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-interval polling budget for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two consecutive queries
    pub interval: Duration,

    /// Maximum number of queries, including the first one
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Longest time a single wait can block (no sleep follows the last query)
    pub fn worst_case(&self) -> Duration {
        self.interval * self.attempts().saturating_sub(1)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), 20)
    }
}

/// Verdict on a single observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Target state reached
    Converged,
    /// Not there yet; carries the observed state for diagnostics
    Pending(String),
    /// The control plane reported a terminal failure
    Failed(String),
}

/// Query `query` until `assess` reports convergence or the budget runs out.
///
/// A failing query is returned immediately and is never retried. A
/// [`Progress::Failed`] observation ends the wait with
/// [`CloudError::ExplicitFailure`]; exhausting `policy.max_attempts` ends it
/// with [`CloudError::ConvergenceTimeout`].
pub async fn poll_until<S, Q, Fut, A>(
    subject: &str,
    policy: PollPolicy,
    mut query: Q,
    assess: A,
) -> Result<S>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
    A: Fn(&S) -> Progress,
{
    let max_attempts = policy.attempts();
    let mut last_observed = String::from("unknown");

    for attempt in 1..=max_attempts {
        let state = query().await?;

        match assess(&state) {
            Progress::Converged => {
                tracing::debug!(resource = subject, attempt, "converged");
                return Ok(state);
            }
            Progress::Failed(observed) => {
                tracing::error!(
                    resource = subject,
                    attempt,
                    %observed,
                    "control plane reported failure"
                );
                return Err(CloudError::ExplicitFailure {
                    resource: subject.to_string(),
                    observed,
                });
            }
            Progress::Pending(observed) => {
                tracing::debug!(resource = subject, attempt, %observed, "not converged yet");
                last_observed = observed;
            }
        }

        if attempt < max_attempts {
            sleep(policy.interval).await;
        }
    }

    tracing::warn!(
        resource = subject,
        attempts = max_attempts,
        %last_observed,
        "gave up waiting for convergence"
    );
    Err(CloudError::ConvergenceTimeout {
        resource: subject.to_string(),
        attempts: max_attempts,
        last_observed,
    })
}

/// A remote resource snapshot as seen by the reconciliation engine
pub trait Observed {
    /// Lifecycle state reported by the control plane (e.g. "ATTACHED")
    fn state(&self) -> &str;

    /// What the resource is bound to, when that matters (e.g. the instance a disk is attached to)
    fn holder(&self) -> Option<&str> {
        None
    }

    /// Whether the reported state is a terminal failure
    fn is_failed(&self) -> bool {
        false
    }
}

/// Convergence target for resources queried as `Option<R>` (absent = `None`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Resource exists and reports exactly this state
    State(&'a str),
    /// Resource existence equals the expected value
    Exists(bool),
}

const ABSENT: &str = "absent";

impl Target<'_> {
    pub fn assess<R: Observed>(&self, observed: &Option<R>) -> Progress {
        match (self, observed) {
            (_, Some(resource)) if resource.is_failed() => {
                Progress::Failed(resource.state().to_string())
            }
            (Target::State(want), Some(resource)) if resource.state() == *want => {
                Progress::Converged
            }
            (Target::State(_), Some(resource)) => Progress::Pending(resource.state().to_string()),
            (Target::State(_), None) => Progress::Pending(ABSENT.to_string()),
            (Target::Exists(true), Some(_)) | (Target::Exists(false), None) => Progress::Converged,
            (Target::Exists(true), None) => Progress::Pending(ABSENT.to_string()),
            (Target::Exists(false), Some(resource)) => {
                Progress::Pending(resource.state().to_string())
            }
        }
    }
}

/// [`poll_until`] specialised to an [`Observed`] resource and a [`Target`]
pub async fn await_target<R, Q, Fut>(
    subject: &str,
    policy: PollPolicy,
    query: Q,
    target: Target<'_>,
) -> Result<Option<R>>
where
    R: Observed,
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<R>>>,
{
    poll_until(subject, policy, query, |observed| target.assess(observed)).await
}
