//! Reconciliation error types

use thiserror::Error;

/// Errors produced while validating, mutating, or reconciling a resource
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to decode input: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid connection parameters: {0}")]
    InvalidConnection(String),

    #[error("Remote call rejected: {0}")]
    RemoteRejection(String),

    #[error("State query failed: {0}")]
    QueryFailed(String),

    #[error(
        "Timed out waiting for {resource} after {attempts} attempts (last observed: {last_observed})"
    )]
    ConvergenceTimeout {
        resource: String,
        attempts: u32,
        last_observed: String,
    },

    #[error("{resource} reported failure ({observed}), resubmit the operation to retry")]
    ExplicitFailure { resource: String, observed: String },

    #[error("Conflict on {resource}: {reason}")]
    Conflict { resource: String, reason: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("{plugin} plugin, action = {action} not found")]
    ActionNotFound { plugin: String, action: String },
}

impl CloudError {
    pub fn validation(message: impl Into<String>) -> Self {
        CloudError::Validation(message.into())
    }

    pub fn rejected(message: impl ToString) -> Self {
        CloudError::RemoteRejection(message.to_string())
    }

    pub fn query_failed(message: impl ToString) -> Self {
        CloudError::QueryFailed(message.to_string())
    }

    /// Whether the orchestration layer should resubmit the same operation.
    ///
    /// Explicit failures and timeouts leave the remote resource in an
    /// intermediate state; resubmission is safe because every mutation is
    /// preceded by a state query.
    pub fn requires_resubmit(&self) -> bool {
        matches!(
            self,
            CloudError::ExplicitFailure { .. } | CloudError::ConvergenceTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
