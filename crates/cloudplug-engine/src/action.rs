//! Action contract between the orchestration layer and resource handlers

use crate::batch::BatchReport;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Batch request envelope: `{ "inputs": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInput<I> {
    #[serde(default = "Vec::new")]
    pub inputs: Vec<I>,
}

/// Batch response envelope: `{ "outputs": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutputs<O> {
    pub outputs: Vec<O>,
}

/// One operation ("create", "terminate") on one resource kind
#[async_trait]
pub trait Action: Send + Sync {
    /// A single request item
    type Item: DeserializeOwned + Send + Sync + 'static;

    /// A single result item
    type Output: Serialize + Send;

    /// Decode the raw request payload
    fn read_param(&self, raw: &str) -> Result<BatchInput<Self::Item>> {
        serde_json::from_str(raw).map_err(CloudError::Decode)
    }

    /// Reject malformed requests before any remote call is made
    fn check_param(&self, items: &[Self::Item]) -> Result<()>;

    /// Execute the batch
    async fn run(&self, items: Vec<Self::Item>) -> BatchReport<Self::Output>;
}

/// Type-erased result of an action invocation
#[derive(Debug)]
pub struct ActionReport {
    /// The `{ "outputs": [...] }` envelope, present even when the batch failed
    pub output: serde_json::Value,

    pub error: Option<CloudError>,
}

impl ActionReport {
    pub fn failed(error: CloudError) -> Self {
        Self {
            output: serde_json::json!({ "outputs": [] }),
            error: Some(error),
        }
    }

    pub fn from_batch<O: Serialize>(report: BatchReport<O>) -> Self {
        let BatchReport { outputs, error } = report;
        match serde_json::to_value(BatchOutputs { outputs }) {
            Ok(output) => Self { output, error },
            Err(err) => Self::failed(CloudError::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Object-safe view of an [`Action`], used by the registry
#[async_trait]
pub trait DynAction: Send + Sync {
    async fn invoke(&self, raw: &str) -> ActionReport;
}

#[async_trait]
impl<A: Action> DynAction for A {
    async fn invoke(&self, raw: &str) -> ActionReport {
        let input = match self.read_param(raw) {
            Ok(input) => input,
            Err(err) => return ActionReport::failed(err),
        };

        if let Err(err) = self.check_param(&input.inputs) {
            tracing::warn!(error = %err, "rejected batch before any remote call");
            return ActionReport::failed(err);
        }

        ActionReport::from_batch(self.run(input.inputs).await)
    }
}
