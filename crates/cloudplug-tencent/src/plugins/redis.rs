//! Redis cache instance lifecycle
//!
//! Creation resolves the zone name to its numeric id, buys the instances and
//! waits for the purchase deal to be delivered. Termination clears the
//! instance with its password and waits for the resulting task.

use super::{KindOptions, REDIS, finish, query_failed, rejected};
use crate::connection::{ClientFactory, Connection};
use crate::redis::{
    BILLING_POSTPAID, BILLING_PREPAID, CreateRedisInstances, DealDetail, INSTANCE_STATE_RUNNING,
    RedisApi, RedisInstance, RedisTaskStatus,
};
use async_trait::async_trait;
use cloudplug_engine::{
    Action, BatchExecutor, BatchOutput, BatchReport, CloudError, ConnectionSource, Desired, Guard,
    ItemFailure, ItemStatus, Observed, Result, Target, await_target, ensure_state, poll_until,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisInput {
    pub guid: String,
    #[serde(flatten)]
    pub connection: ConnectionSource,
    pub type_id: u64,
    pub mem_size: u64,
    pub goods_num: u64,
    pub period: u64,
    pub password: String,
    pub billing_mode: i64,
    pub vpc_id: String,
    pub subnet_id: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedisOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub guid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl RedisOutput {
    fn for_input(input: &RedisInput) -> Self {
        Self {
            guid: input.guid.clone(),
            id: input.id.clone(),
            ..Default::default()
        }
    }
}

impl BatchOutput for RedisOutput {
    fn status_mut(&mut self) -> &mut ItemStatus {
        &mut self.status
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

async fn describe(client: &dyn RedisApi, id: &str) -> Result<Option<RedisInstance>> {
    client.describe(id).await.map_err(query_failed)
}

async fn deal(client: &dyn RedisApi, deal_id: &str) -> Result<DealDetail> {
    client
        .deal(deal_id)
        .await
        .map_err(query_failed)?
        .ok_or_else(|| CloudError::ResourceNotFound(format!("redis deal {}", deal_id)))
}

async fn task(client: &dyn RedisApi, task_id: u64) -> Result<RedisTaskStatus> {
    client.task(task_id).await.map_err(query_failed)
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
        input: RedisInput,
    ) -> std::result::Result<RedisOutput, ItemFailure<RedisOutput>> {
        let mut output = RedisOutput::for_input(&input);
        let result = self.create(&input, &mut output).await;
        finish(output, result)
    }

    async fn create(&self, input: &RedisInput, output: &mut RedisOutput) -> Result<()> {
        let connection = Connection::resolve(&input.connection)?;
        let client = self.factory.redis(&connection);
        let client = client.as_ref();

        if !input.id.is_empty() && self.already_delivered(client, &input.id).await? {
            tracing::info!(id = %input.id, "redis instances already exist, skipping purchase");
            return Ok(());
        }

        let zone = connection.require_zone()?;
        let zone_id = client
            .zone_id(zone)
            .await
            .map_err(query_failed)?
            .ok_or_else(|| CloudError::validation(format!("available zone {} not found", zone)))?;

        let request = CreateRedisInstances {
            zone_id,
            type_id: input.type_id,
            mem_size: input.mem_size,
            goods_num: input.goods_num,
            period: input.period,
            password: input.password.clone(),
            billing_mode: input.billing_mode,
            vpc_id: non_empty(&input.vpc_id),
            subnet_id: non_empty(&input.subnet_id),
        };
        let ack = client.create(&request).await.map_err(rejected)?;
        output.request_id = ack.request_id;
        output.deal_id = ack.deal_id;

        let deal_id = output.deal_id.as_str();
        let delivered = poll_until(
            &format!("redis deal {}", deal_id),
            self.options.poll,
            move || deal(client, deal_id),
            DealDetail::progress,
        )
        .await?;

        output.id = delivered.instance_ids.join(",");
        tracing::info!(deal_id = %output.deal_id, id = %output.id, "redis instances delivered");
        Ok(())
    }

    /// Whether every instance of a previously returned `id` list exists and runs.
    /// A partial set is a conflict.
    async fn already_delivered(&self, client: &dyn RedisApi, ids: &str) -> Result<bool> {
        let ids = instance_ids(ids);
        let mut existing = Vec::with_capacity(ids.len());
        for &id in &ids {
            if let Guard::Satisfied(Some(instance)) =
                ensure_state(id, move || describe(client, id), Desired::Present).await?
            {
                existing.push(instance);
            }
        }

        if existing.is_empty() {
            return Ok(false);
        }
        if existing.len() < ids.len() {
            return Err(CloudError::Conflict {
                resource: format!("redis instances {}", ids.join(",")),
                reason: format!("only {} of {} instances exist", existing.len(), ids.len()),
            });
        }
        if let Some(instance) = existing.iter().find(|instance| instance.is_reclaimed()) {
            return Err(CloudError::Conflict {
                resource: format!("redis instance {}", instance.instance_id),
                reason: format!("instance is {}", instance.state().to_lowercase()),
            });
        }

        for &id in &ids {
            await_target(
                &format!("redis instance {}", id),
                self.options.poll,
                move || describe(client, id),
                Target::State(INSTANCE_STATE_RUNNING),
            )
            .await?;
        }
        Ok(true)
    }
}

/// Split a comma-joined instance id list, ignoring blanks
fn instance_ids(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect()
}

#[async_trait]
impl Action for CreateAction {
    type Item = RedisInput;
    type Output = RedisOutput;

    fn check_param(&self, items: &[RedisInput]) -> Result<()> {
        for input in items {
            input.connection.check()?;
            if input.goods_num == 0 {
                return Err(CloudError::validation("goods_num is invalid"));
            }
            if input.mem_size == 0 {
                return Err(CloudError::validation("mem_size is invalid"));
            }
            if input.password.is_empty() {
                return Err(CloudError::validation("password is empty"));
            }
            if input.billing_mode != BILLING_POSTPAID && input.billing_mode != BILLING_PREPAID {
                return Err(CloudError::validation(format!(
                    "billing_mode {} is invalid",
                    input.billing_mode
                )));
            }
        }
        Ok(())
    }

    async fn run(&self, items: Vec<RedisInput>) -> BatchReport<RedisOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(REDIS, items, |input| self.create_one(input))
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
        input: RedisInput,
    ) -> std::result::Result<RedisOutput, ItemFailure<RedisOutput>> {
        let mut output = RedisOutput::for_input(&input);
        let result = self.terminate(&input, &mut output).await;
        finish(output, result)
    }

    async fn terminate(&self, input: &RedisInput, output: &mut RedisOutput) -> Result<()> {
        let connection = Connection::resolve(&input.connection)?;
        let client = self.factory.redis(&connection);
        let client = client.as_ref();

        // A create output may name several instances
        for id in instance_ids(&input.id) {
            self.terminate_instance(client, id, &input.password, output).await?;
        }
        Ok(())
    }

    async fn terminate_instance(
        &self,
        client: &dyn RedisApi,
        id: &str,
        password: &str,
        output: &mut RedisOutput,
    ) -> Result<()> {
        let guard = ensure_state(id, move || describe(client, id), Desired::Absent).await?;
        if guard.is_satisfied() {
            tracing::info!(id, "redis instance already gone");
            return Ok(());
        }

        let ack = client.clear(id, password).await.map_err(rejected)?;
        output.request_id = ack.request_id;
        output.task_id = Some(ack.task_id);

        let task_id = ack.task_id;
        poll_until(
            &format!("redis instance {} task {}", id, task_id),
            self.options.poll,
            move || task(client, task_id),
            RedisTaskStatus::progress,
        )
        .await?;

        tracing::info!(id, task_id, "redis instance cleared");
        Ok(())
    }
}

#[async_trait]
impl Action for TerminateAction {
    type Item = RedisInput;
    type Output = RedisOutput;

    fn check_param(&self, items: &[RedisInput]) -> Result<()> {
        for input in items {
            input.connection.check()?;
            if instance_ids(&input.id).is_empty() {
                return Err(CloudError::validation("id is empty"));
            }
            if input.password.is_empty() {
                return Err(CloudError::validation("password is empty"));
            }
        }
        Ok(())
    }

    async fn run(&self, items: Vec<RedisInput>) -> BatchReport<RedisOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(REDIS, items, |input| self.terminate_one(input))
            .await
    }
}
