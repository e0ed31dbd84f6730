//! NAT gateway lifecycle

use super::{KindOptions, NAT_GATEWAY, finish, query_failed, rejected};
use crate::connection::{ClientFactory, Connection};
use crate::vpc::{CreateNatGateway, NAT_STATE_AVAILABLE, NatGateway, NatGatewayApi, VpcTaskStatus};
use async_trait::async_trait;
use cloudplug_engine::{
    Action, BatchExecutor, BatchOutput, BatchReport, CloudError, ConnectionSource, Desired,
    ItemFailure, ItemStatus, Progress, Result, Target, await_target, ensure_state, poll_until,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NatGatewayInput {
    pub guid: String,
    #[serde(flatten)]
    pub connection: ConnectionSource,
    pub name: String,
    pub vpc_id: String,
    pub max_concurrent: u64,
    pub bandwidth: u64,
    /// Comma-separated elastic IPs to bind
    pub assigned_eip_set: String,
    pub auto_alloc_eip_num: u64,
    pub id: String,
}

impl NatGatewayInput {
    fn assigned_eips(&self) -> Vec<String> {
        self.assigned_eip_set
            .split(',')
            .map(str::trim)
            .filter(|eip| !eip.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NatGatewayOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub guid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl NatGatewayOutput {
    fn for_input(input: &NatGatewayInput) -> Self {
        Self {
            guid: input.guid.clone(),
            id: input.id.clone(),
            ..Default::default()
        }
    }
}

impl BatchOutput for NatGatewayOutput {
    fn status_mut(&mut self) -> &mut ItemStatus {
        &mut self.status
    }
}

async fn describe(client: &dyn NatGatewayApi, id: &str) -> Result<Option<NatGateway>> {
    client.describe(id).await.map_err(query_failed)
}

async fn task_status(client: &dyn NatGatewayApi, task_id: &str) -> Result<VpcTaskStatus> {
    client.task_status(task_id).await.map_err(query_failed)
}

pub struct CreateAction {
    factory: Arc<dyn ClientFactory>,
    options: KindOptions,
}

impl CreateAction {
    pub fn new(factory: Arc<dyn ClientFactory>, options: KindOptions) -> Self {
        Self { factory, options }
    }

    async fn create_one(
        &self,
        input: NatGatewayInput,
    ) -> std::result::Result<NatGatewayOutput, ItemFailure<NatGatewayOutput>> {
        let mut output = NatGatewayOutput::for_input(&input);
        let result = self.create(&input, &mut output).await;
        finish(output, result)
    }

    async fn create(&self, input: &NatGatewayInput, output: &mut NatGatewayOutput) -> Result<()> {
        let connection = Connection::resolve(&input.connection)?;
        let client = self.factory.nat_gateways(&connection);
        let client = client.as_ref();

        if !input.id.is_empty() {
            let id = input.id.as_str();
            let guard = ensure_state(id, move || describe(client, id), Desired::Present).await?;
            if guard.is_satisfied() {
                // An existing gateway still has to settle as AVAILABLE
                self.wait_available(client, id).await?;
                tracing::info!(id, "NAT gateway already exists, skipping creation");
                return Ok(());
            }
        }

        let request = CreateNatGateway {
            vpc_id: input.vpc_id.clone(),
            name: input.name.clone(),
            max_concurrent: input.max_concurrent,
            bandwidth: input.bandwidth,
            assigned_eips: input.assigned_eips(),
            auto_alloc_eip_num: input.auto_alloc_eip_num,
        };
        let ack = client.create(&request).await.map_err(rejected)?;
        output.request_id = ack.request_id;
        output.id = ack.id;

        self.wait_available(client, &output.id).await?;
        tracing::info!(id = %output.id, "NAT gateway is available");
        Ok(())
    }

    async fn wait_available(&self, client: &dyn NatGatewayApi, id: &str) -> Result<()> {
        await_target(
            &format!("NAT gateway {}", id),
            self.options.poll,
            move || describe(client, id),
            Target::State(NAT_STATE_AVAILABLE),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Action for CreateAction {
    type Item = NatGatewayInput;
    type Output = NatGatewayOutput;

    fn check_param(&self, items: &[NatGatewayInput]) -> Result<()> {
        for input in items {
            input.connection.check()?;
            if input.vpc_id.is_empty() {
                return Err(CloudError::validation("vpc_id is empty"));
            }
            if input.name.is_empty() {
                return Err(CloudError::validation("name is empty"));
            }
        }
        Ok(())
    }

    async fn run(&self, items: Vec<NatGatewayInput>) -> BatchReport<NatGatewayOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(NAT_GATEWAY, items, |input| self.create_one(input))
            .await
    }
}

pub struct TerminateAction {
    factory: Arc<dyn ClientFactory>,
    options: KindOptions,
}

impl TerminateAction {
    pub fn new(factory: Arc<dyn ClientFactory>, options: KindOptions) -> Self {
        Self { factory, options }
    }

    async fn terminate_one(
        &self,
        input: NatGatewayInput,
    ) -> std::result::Result<NatGatewayOutput, ItemFailure<NatGatewayOutput>> {
        let mut output = NatGatewayOutput::for_input(&input);
        let result = self.terminate(&input, &mut output).await;
        finish(output, result)
    }

    async fn terminate(
        &self,
        input: &NatGatewayInput,
        output: &mut NatGatewayOutput,
    ) -> Result<()> {
        let connection = Connection::resolve(&input.connection)?;
        let client = self.factory.nat_gateways(&connection);
        let client = client.as_ref();
        let id = input.id.as_str();

        let guard = ensure_state(id, move || describe(client, id), Desired::Absent).await?;
        if guard.is_satisfied() {
            tracing::info!(id, "NAT gateway already gone");
            return Ok(());
        }

        let ack = client.delete(id).await.map_err(rejected)?;
        output.request_id = ack.request_id;

        match ack.task_id {
            Some(task_id) => {
                let task_id = task_id.as_str();
                poll_until(
                    &format!("NAT gateway {} deletion task {}", id, task_id),
                    self.options.poll,
                    move || task_status(client, task_id),
                    |status| match status {
                        VpcTaskStatus::Success => Progress::Converged,
                        VpcTaskStatus::Failed => Progress::Failed("FAILED".to_string()),
                        VpcTaskStatus::Running => Progress::Pending("RUNNING".to_string()),
                    },
                )
                .await?;
            }
            None => {
                await_target(
                    &format!("NAT gateway {}", id),
                    self.options.poll,
                    move || describe(client, id),
                    Target::Exists(false),
                )
                .await?;
            }
        }

        tracing::info!(id, "NAT gateway deleted");
        Ok(())
    }
}

#[async_trait]
impl Action for TerminateAction {
    type Item = NatGatewayInput;
    type Output = NatGatewayOutput;

    fn check_param(&self, items: &[NatGatewayInput]) -> Result<()> {
        for input in items {
            input.connection.check()?;
            if input.id.is_empty() {
                return Err(CloudError::validation("id is empty"));
            }
        }
        Ok(())
    }

    async fn run(&self, items: Vec<NatGatewayInput>) -> BatchReport<NatGatewayOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(NAT_GATEWAY, items, |input| self.terminate_one(input))
            .await
    }
}
