//! Batch execution and per-item result aggregation

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// How a batch reacts to a failing item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing item and return what succeeded before it
    AbortOnFirstFailure,
    /// Process every item; each output carries its own result code
    ContinueOnFailure,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::AbortOnFirstFailure => write!(f, "abort_on_first_failure"),
            FailurePolicy::ContinueOnFailure => write!(f, "continue_on_failure"),
        }
    }
}

/// Per-item result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "0")]
    Success,
    #[serde(rename = "1")]
    Error,
}

/// Result code and diagnostic attached to a batch item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResultCode>,

    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ItemStatus {
    pub fn success() -> Self {
        Self {
            code: Some(ResultCode::Success),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: Some(ResultCode::Error),
            message: Some(message.into()),
        }
    }
}

/// Output of a single batch item
pub trait BatchOutput {
    fn status_mut(&mut self) -> &mut ItemStatus;
}

/// A failed item: whatever output was produced before the failure, and the cause
#[derive(Debug)]
pub struct ItemFailure<O> {
    pub output: O,
    pub error: CloudError,
}

impl<O> ItemFailure<O> {
    pub fn new(output: O, error: CloudError) -> Self {
        Self { output, error }
    }
}

/// Aggregated batch result
///
/// `outputs` mirrors input order. `error` is set whenever at least one item
/// failed: the first failure under [`FailurePolicy::AbortOnFirstFailure`],
/// the last one under [`FailurePolicy::ContinueOnFailure`].
#[derive(Debug)]
pub struct BatchReport<O> {
    pub outputs: Vec<O>,
    pub error: Option<CloudError>,
}

impl<O> BatchReport<O> {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            error: None,
        }
    }

    /// A report for a batch rejected before any item ran
    pub fn rejected(error: CloudError) -> Self {
        Self {
            outputs: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<O>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.outputs),
        }
    }
}

impl<O> Default for BatchReport<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs batch items strictly one after another in input order
#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
    policy: FailurePolicy,
}

impl BatchExecutor {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run `handle` on every item of `items` and aggregate the outcomes.
    pub async fn execute<I, O, F, Fut>(
        &self,
        kind: &str,
        items: Vec<I>,
        mut handle: F,
    ) -> BatchReport<O>
    where
        O: BatchOutput,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = std::result::Result<O, ItemFailure<O>>>,
    {
        let total = items.len();
        let mut report = BatchReport::new();

        for (index, item) in items.into_iter().enumerate() {
            tracing::info!(kind, item = index + 1, total, "processing batch item");

            match (handle(item).await, self.policy) {
                (Ok(output), FailurePolicy::AbortOnFirstFailure) => {
                    report.outputs.push(output);
                }
                (Ok(mut output), FailurePolicy::ContinueOnFailure) => {
                    *output.status_mut() = ItemStatus::success();
                    report.outputs.push(output);
                }
                (Err(failure), FailurePolicy::AbortOnFirstFailure) => {
                    tracing::error!(
                        kind,
                        item = index + 1,
                        total,
                        error = %failure.error,
                        "batch item failed, skipping the remaining items"
                    );
                    report.error = Some(failure.error);
                    return report;
                }
                (Err(failure), FailurePolicy::ContinueOnFailure) => {
                    tracing::error!(
                        kind,
                        item = index + 1,
                        total,
                        error = %failure.error,
                        "batch item failed"
                    );
                    let ItemFailure { mut output, error } = failure;
                    *output.status_mut() = ItemStatus::error(error.to_string());
                    report.outputs.push(output);
                    report.error = Some(error);
                }
            }
        }

        tracing::info!(
            kind,
            total,
            failed = report.error.is_some(),
            "batch finished"
        );
        report
    }
}
