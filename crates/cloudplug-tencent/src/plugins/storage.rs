//! CBS volume lifecycle
//!
//! Volumes are validated and processed one by one: a bad item is reported in
//! its own output and the rest of the batch still runs (under the default
//! collect-all discipline). Creation attaches the volume to the requested
//! instance; termination detaches it first when needed.

use super::{KindOptions, STORAGE, finish, query_failed, rejected};
use crate::cbs::{
    CHARGE_TYPE_POSTPAID_BY_HOUR, CHARGE_TYPE_PREPAID, CreateDisks, DISK_STATE_ATTACHED,
    DISK_STATE_ATTACHING, DISK_STATE_DETACHING, DISK_STATE_UNATTACHED, Disk, DiskApi,
};
use crate::connection::{ClientFactory, Connection};
use async_trait::async_trait;
use cloudplug_engine::{
    Action, BatchExecutor, BatchOutput, BatchReport, CloudError, ConnectionSource, Desired, Guard,
    ItemFailure, ItemStatus, Observed, Result, Target, await_target, ensure_state,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageInput {
    /// Opaque value echoed back for the orchestration layer
    #[serde(rename = "callbackParameter")]
    pub callback_parameter: String,
    pub guid: String,
    #[serde(flatten)]
    pub connection: ConnectionSource,
    pub disk_type: String,
    pub disk_size: String,
    pub disk_name: String,
    pub id: String,
    pub disk_charge_type: String,
    pub disk_charge_period: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageOutput {
    #[serde(rename = "callbackParameter", skip_serializing_if = "String::is_empty")]
    pub callback_parameter: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub guid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl StorageOutput {
    fn for_input(input: &StorageInput) -> Self {
        Self {
            callback_parameter: input.callback_parameter.clone(),
            guid: input.guid.clone(),
            id: input.id.clone(),
            ..Default::default()
        }
    }
}

impl BatchOutput for StorageOutput {
    fn status_mut(&mut self) -> &mut ItemStatus {
        &mut self.status
    }
}

fn positive(field: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CloudError::validation(format!("wrong {} {:?}", field, value))),
    }
}

impl StorageInput {
    fn validate_create(&self) -> Result<()> {
        if self.guid.is_empty() {
            return Err(CloudError::validation("Guid is empty"));
        }
        self.connection.check()?;
        if self.disk_type.is_empty() {
            return Err(CloudError::validation("DiskType is empty"));
        }
        if self.disk_size.is_empty() {
            return Err(CloudError::validation("DiskSize is empty"));
        }
        positive("DiskSize", &self.disk_size)?;
        match self.disk_charge_type.as_str() {
            "" => return Err(CloudError::validation("DiskChargeType is empty")),
            CHARGE_TYPE_PREPAID => {
                positive("DiskChargePeriod", &self.disk_charge_period)?;
            }
            CHARGE_TYPE_POSTPAID_BY_HOUR => {}
            other => {
                return Err(CloudError::validation(format!(
                    "DiskChargeType {} is invalid",
                    other
                )));
            }
        }
        if self.instance_id.is_empty() {
            return Err(CloudError::validation("InstanceId is empty"));
        }
        Ok(())
    }

    fn validate_terminate(&self) -> Result<()> {
        if self.guid.is_empty() {
            return Err(CloudError::validation("Guid is empty"));
        }
        self.connection.check()?;
        if self.id.is_empty() {
            return Err(CloudError::validation("Id is empty"));
        }
        Ok(())
    }

    fn create_request(&self, zone: &str) -> Result<CreateDisks> {
        let prepaid_period = if self.disk_charge_type == CHARGE_TYPE_PREPAID {
            Some(positive("DiskChargePeriod", &self.disk_charge_period)?)
        } else {
            None
        };
        Ok(CreateDisks {
            zone: zone.to_string(),
            disk_type: self.disk_type.clone(),
            disk_size: positive("DiskSize", &self.disk_size)?,
            disk_name: (!self.disk_name.is_empty()).then(|| self.disk_name.clone()),
            charge_type: self.disk_charge_type.clone(),
            prepaid_period,
        })
    }
}

async fn describe(client: &dyn DiskApi, id: &str) -> Result<Option<Disk>> {
    client.describe(id).await.map_err(query_failed)
}

async fn wait_for(
    client: &dyn DiskApi,
    options: &KindOptions,
    id: &str,
    target: Target<'_>,
) -> Result<()> {
    await_target(
        &format!("volume {}", id),
        options.poll,
        move || describe(client, id),
        target,
    )
    .await?;
    Ok(())
}

async fn attach(
    client: &dyn DiskApi,
    options: &KindOptions,
    id: &str,
    instance_id: &str,
) -> Result<()> {
    let desired = Desired::InState {
        state: DISK_STATE_ATTACHED,
        holder: Some(instance_id),
    };
    if ensure_state(id, move || describe(client, id), desired)
        .await?
        .is_satisfied()
    {
        tracing::info!(id, instance_id, "volume already attached");
        return Ok(());
    }

    client.attach(id, instance_id).await.map_err(rejected)?;
    wait_for(client, options, id, Target::State(DISK_STATE_ATTACHED)).await?;
    tracing::info!(id, instance_id, "volume attached");
    Ok(())
}

async fn detach(client: &dyn DiskApi, options: &KindOptions, id: &str) -> Result<()> {
    let desired = Desired::InState {
        state: DISK_STATE_UNATTACHED,
        holder: None,
    };
    if ensure_state(id, move || describe(client, id), desired)
        .await?
        .is_satisfied()
    {
        return Ok(());
    }

    client.detach(id).await.map_err(rejected)?;
    wait_for(client, options, id, Target::State(DISK_STATE_UNATTACHED)).await?;
    tracing::info!(id, "volume detached");
    Ok(())
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
        input: StorageInput,
    ) -> std::result::Result<StorageOutput, ItemFailure<StorageOutput>> {
        let mut output = StorageOutput::for_input(&input);
        let result = self.create(&input, &mut output).await;
        finish(output, result)
    }

    async fn create(&self, input: &StorageInput, output: &mut StorageOutput) -> Result<()> {
        input.validate_create()?;
        let connection = Connection::resolve(&input.connection)?;
        let zone = connection.require_zone()?;
        let client = self.factory.disks(&connection);
        let client = client.as_ref();

        let existing = if input.id.is_empty() {
            false
        } else {
            let id = input.id.as_str();
            ensure_state(id, move || describe(client, id), Desired::Present)
                .await?
                .is_satisfied()
        };

        if existing {
            tracing::info!(id = %input.id, "volume already exists, skipping creation");
        } else {
            let request = input.create_request(zone)?;
            let ack = client.create(&request).await.map_err(rejected)?;
            output.request_id = ack.request_id;
            output.id = ack.id;
            wait_for(
                client,
                &self.options,
                &output.id,
                Target::State(DISK_STATE_UNATTACHED),
            )
            .await?;
        }

        attach(client, &self.options, &output.id, &input.instance_id).await
    }
}

#[async_trait]
impl Action for CreateAction {
    type Item = StorageInput;
    type Output = StorageOutput;

    // Items are validated one by one in `run` so a bad item does not sink the batch
    fn check_param(&self, _items: &[StorageInput]) -> Result<()> {
        Ok(())
    }

    async fn run(&self, items: Vec<StorageInput>) -> BatchReport<StorageOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(STORAGE, items, |input| self.create_one(input))
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
        input: StorageInput,
    ) -> std::result::Result<StorageOutput, ItemFailure<StorageOutput>> {
        let mut output = StorageOutput::for_input(&input);
        let result = self.terminate(&input, &mut output).await;
        finish(output, result)
    }

    async fn terminate(&self, input: &StorageInput, output: &mut StorageOutput) -> Result<()> {
        input.validate_terminate()?;
        let connection = Connection::resolve(&input.connection)?;
        let client = self.factory.disks(&connection);
        let client = client.as_ref();
        let id = input.id.as_str();

        let disk = match ensure_state(id, move || describe(client, id), Desired::Absent).await? {
            Guard::Satisfied(_) => {
                tracing::info!(id, "volume already terminated");
                return Ok(());
            }
            Guard::Proceed(disk) => disk,
        };

        // TerminateDisks only accepts an unattached volume
        match disk.as_ref().map(|disk| disk.state()) {
            Some(DISK_STATE_ATTACHING) => {
                wait_for(client, &self.options, id, Target::State(DISK_STATE_ATTACHED)).await?;
                detach(client, &self.options, id).await?;
            }
            Some(DISK_STATE_ATTACHED) => detach(client, &self.options, id).await?,
            Some(DISK_STATE_DETACHING) => {
                wait_for(client, &self.options, id, Target::State(DISK_STATE_UNATTACHED)).await?;
            }
            _ => {}
        }

        output.request_id = client.terminate(id).await.map_err(rejected)?;
        wait_for(client, &self.options, id, Target::Exists(false)).await?;
        tracing::info!(id, "volume terminated");
        Ok(())
    }
}

#[async_trait]
impl Action for TerminateAction {
    type Item = StorageInput;
    type Output = StorageOutput;

    fn check_param(&self, _items: &[StorageInput]) -> Result<()> {
        Ok(())
    }

    async fn run(&self, items: Vec<StorageInput>) -> BatchReport<StorageOutput> {
        BatchExecutor::new(self.options.failure_policy)
            .execute(STORAGE, items, |input| self.terminate_one(input))
            .await
    }
}
