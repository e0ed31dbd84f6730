//! Idempotent mutation guard
//!
//! Every create, attach, detach and terminate starts by asking the control
//! plane what already exists. Caller-supplied identifiers are never trusted
//! blindly, and resubmitting an operation that half-succeeded is safe.

use crate::error::{CloudError, Result};
use crate::poll::Observed;
use std::future::Future;

/// State the caller is about to establish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desired<'a> {
    /// The resource should exist (create)
    Present,
    /// The resource should exist in `state`, optionally bound to `holder` (attach/detach)
    InState {
        state: &'a str,
        holder: Option<&'a str>,
    },
    /// The resource should be gone (terminate)
    Absent,
}

/// Outcome of [`ensure_state`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard<R> {
    /// Nothing to do, the remote state already matches
    Satisfied(Option<R>),
    /// The mutation is needed; carries the current observation, if any
    Proceed(Option<R>),
}

impl<R> Guard<R> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Guard::Satisfied(_))
    }
}

/// Query `resource_id` and decide whether a mutation towards `desired` is needed.
///
/// Returns [`CloudError::Conflict`] when the resource is in the desired state
/// but bound to a different holder, and [`CloudError::ResourceNotFound`] when
/// an in-state target does not exist at all.
pub async fn ensure_state<R, Q, Fut>(
    resource_id: &str,
    query: Q,
    desired: Desired<'_>,
) -> Result<Guard<R>>
where
    R: Observed,
    Q: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<R>>>,
{
    let observed = query().await?;

    let guard = match (desired, observed) {
        (Desired::Present, Some(resource)) => Guard::Satisfied(Some(resource)),
        (Desired::Present, None) => Guard::Proceed(None),

        (Desired::Absent, None) => Guard::Satisfied(None),
        (Desired::Absent, Some(resource)) => Guard::Proceed(Some(resource)),

        (Desired::InState { .. }, None) => {
            return Err(CloudError::ResourceNotFound(resource_id.to_string()));
        }
        (Desired::InState { state, holder }, Some(resource)) => {
            if resource.state() != state {
                Guard::Proceed(Some(resource))
            } else {
                match (holder, resource.holder()) {
                    (Some(wanted), Some(actual)) if wanted != actual => {
                        return Err(CloudError::Conflict {
                            resource: resource_id.to_string(),
                            reason: format!("already {} to {}", state.to_lowercase(), actual),
                        });
                    }
                    _ => Guard::Satisfied(Some(resource)),
                }
            }
        }
    };

    tracing::debug!(
        resource = resource_id,
        satisfied = guard.is_satisfied(),
        "checked remote state before mutation"
    );
    Ok(guard)
}
