//! In-memory Tencent Cloud control plane for lifecycle tests
//!
//! Every resource is a timeline of observations: each describe returns the
//! current one and advances, the last one sticks. New resources report
//! `pending_polls` intermediate states before they settle.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudplug_engine::{ActionReport, Registry};
use cloudplug_tencent::api::{MutationAck, TaskAck};
use cloudplug_tencent::cbs::{
    CreateDisks, DISK_STATE_ATTACHED, DISK_STATE_UNATTACHED, Disk, DiskApi,
};
use cloudplug_tencent::connection::{ClientFactory, Connection};
use cloudplug_tencent::error::{Result, TencentError};
use cloudplug_tencent::redis::{
    CreateRedisInstances, DEAL_STATUS_DELIVERED, DealAck, DealDetail, RedisApi, RedisInstance,
    RedisTaskAck, RedisTaskStatus,
};
use cloudplug_tencent::vpc::{
    CreateNatGateway, NAT_STATE_AVAILABLE, NAT_STATE_PENDING, NatGateway, NatGatewayApi,
    VpcTaskStatus,
};
use cloudplug_tencent::{PluginOptions, register_plugins};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const PROVIDER_PARAMS: &str =
    "Region=ap-guangzhou;AvailableZone=ap-guangzhou-3;SecretID=AKIDtest;SecretKey=secret";

pub const ZONE_ID: u64 = 100003;

#[derive(Debug, Clone)]
struct Timeline<T> {
    steps: VecDeque<Option<T>>,
}

impl<T: Clone> Timeline<T> {
    fn settled(value: T) -> Self {
        Self {
            steps: VecDeque::from([Some(value)]),
        }
    }

    fn converging(pending: T, pending_polls: usize, settled: Option<T>) -> Self {
        let mut steps: VecDeque<Option<T>> =
            std::iter::repeat_n(Some(pending), pending_polls).collect();
        steps.push_back(settled);
        Self { steps }
    }

    fn observe(&mut self) -> Option<T> {
        let current = self.steps.front().cloned().flatten();
        if self.steps.len() > 1 {
            self.steps.pop_front();
        }
        current
    }

    fn peek(&self) -> Option<T> {
        self.steps.front().cloned().flatten()
    }

    fn then(&mut self, pending: T, pending_polls: usize, settled: Option<T>) {
        *self = Self::converging(pending, pending_polls, settled);
    }
}

#[derive(Debug, Default)]
struct World {
    calls: Vec<String>,
    counter: u32,
    pending_polls: usize,
    rejections: HashMap<String, usize>,
    regions: Vec<String>,

    gateways: HashMap<String, Timeline<NatGateway>>,
    gateway_settles_as: Option<String>,
    vpc_delete_tasks: bool,
    vpc_tasks: HashMap<String, Timeline<VpcTaskStatus>>,

    zones: HashMap<String, u64>,
    deals: HashMap<String, Timeline<DealDetail>>,
    deal_settles_as: Option<i64>,
    redis: HashMap<String, Timeline<RedisInstance>>,
    redis_tasks: HashMap<u64, Timeline<RedisTaskStatus>>,

    disks: HashMap<String, Timeline<Disk>>,
}

impl World {
    fn call(&mut self, op: &str) -> Result<()> {
        self.calls.push(op.to_string());
        match self.rejections.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(TencentError::Api {
                    code: "FailedOperation".to_string(),
                    message: format!("{} refused", op),
                    request_id: "req-refused".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn next(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }
}

/// Shared fake control plane; clones observe the same world
#[derive(Debug, Clone)]
pub struct FakeCloud {
    world: Arc<Mutex<World>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        let world = World {
            pending_polls: 1,
            zones: HashMap::from([("ap-guangzhou-3".to_string(), ZONE_ID)]),
            ..Default::default()
        };
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// Registry with every plugin wired to this fake
    pub fn registry(&self) -> Registry {
        self.registry_with(&PluginOptions::default())
    }

    pub fn registry_with(&self, options: &PluginOptions) -> Registry {
        register_plugins(Registry::builder(), Arc::new(self.clone()), options).build()
    }

    /// Fail the next `times` calls of `op` (e.g. "vpc.CreateNatGateway")
    pub fn reject(&self, op: &str, times: usize) -> &Self {
        self.world().rejections.insert(op.to_string(), times);
        self
    }

    /// Intermediate observations reported before a new resource settles
    pub fn pending_polls(&self, polls: usize) -> &Self {
        self.world().pending_polls = polls;
        self
    }

    pub fn gateway_settles_as(&self, state: &str) -> &Self {
        self.world().gateway_settles_as = Some(state.to_string());
        self
    }

    pub fn deal_settles_as(&self, status: i64) -> &Self {
        self.world().deal_settles_as = Some(status);
        self
    }

    pub fn vpc_delete_tasks(&self) -> &Self {
        self.world().vpc_delete_tasks = true;
        self
    }

    pub fn with_gateway(&self, id: &str, state: &str) -> &Self {
        self.world()
            .gateways
            .insert(id.to_string(), Timeline::settled(gateway(id, state)));
        self
    }

    /// A gateway still PENDING for `pending_polls` observations, then `settled`
    pub fn with_settling_gateway(&self, id: &str, settled: &str) -> &Self {
        let mut world = self.world();
        let polls = world.pending_polls;
        world.gateways.insert(
            id.to_string(),
            Timeline::converging(gateway(id, NAT_STATE_PENDING), polls, Some(gateway(id, settled))),
        );
        self
    }

    pub fn with_redis(&self, id: &str) -> &Self {
        self.with_redis_status(id, 2)
    }

    pub fn with_redis_status(&self, id: &str, status: i64) -> &Self {
        let mut instance = redis_instance(id);
        instance.status = status;
        self.world()
            .redis
            .insert(id.to_string(), Timeline::settled(instance));
        self
    }

    /// An instance still initializing for `pending_polls` observations, then running
    pub fn with_settling_redis(&self, id: &str) -> &Self {
        let mut world = self.world();
        let polls = world.pending_polls;
        let mut pending = redis_instance(id);
        pending.status = 0;
        world.redis.insert(
            id.to_string(),
            Timeline::converging(pending, polls, Some(redis_instance(id))),
        );
        self
    }

    pub fn redis_instance(&self, id: &str) -> Option<RedisInstance> {
        self.world().redis.get(id).and_then(Timeline::peek)
    }

    pub fn with_disk(&self, id: &str, state: &str, instance_id: &str) -> &Self {
        self.world()
            .disks
            .insert(id.to_string(), Timeline::settled(disk(id, state, instance_id)));
        self
    }

    /// A volume in a transient `state` that settles as `settled` after `pending_polls`
    pub fn with_moving_disk(
        &self,
        id: &str,
        state: &str,
        settled: &str,
        instance_id: &str,
    ) -> &Self {
        let settled_holder = if settled == DISK_STATE_ATTACHED {
            instance_id
        } else {
            ""
        };
        let mut world = self.world();
        let polls = world.pending_polls;
        world.disks.insert(
            id.to_string(),
            Timeline::converging(
                disk(id, state, instance_id),
                polls,
                Some(disk(id, settled, settled_holder)),
            ),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.world().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.world().calls.iter().filter(|call| *call == op).count()
    }

    pub fn regions(&self) -> Vec<String> {
        self.world().regions.clone()
    }

    pub fn disk(&self, id: &str) -> Option<Disk> {
        self.world().disks.get(id).and_then(Timeline::peek)
    }

    pub fn gateway(&self, id: &str) -> Option<NatGateway> {
        self.world().gateways.get(id).and_then(Timeline::peek)
    }
}

fn gateway(id: &str, state: &str) -> NatGateway {
    NatGateway {
        nat_gateway_id: id.to_string(),
        nat_gateway_name: String::new(),
        state: state.to_string(),
        vpc_id: String::new(),
    }
}

fn redis_instance(id: &str) -> RedisInstance {
    RedisInstance {
        instance_id: id.to_string(),
        instance_name: String::new(),
        status: 2,
    }
}

fn disk(id: &str, state: &str, instance_id: &str) -> Disk {
    Disk {
        disk_id: id.to_string(),
        disk_state: state.to_string(),
        instance_id: instance_id.to_string(),
        disk_name: String::new(),
    }
}

impl ClientFactory for FakeCloud {
    fn nat_gateways(&self, connection: &Connection) -> Arc<dyn NatGatewayApi> {
        self.world().regions.push(connection.region.clone());
        Arc::new(self.clone())
    }

    fn redis(&self, connection: &Connection) -> Arc<dyn RedisApi> {
        self.world().regions.push(connection.region.clone());
        Arc::new(self.clone())
    }

    fn disks(&self, connection: &Connection) -> Arc<dyn DiskApi> {
        self.world().regions.push(connection.region.clone());
        Arc::new(self.clone())
    }
}

#[async_trait]
impl NatGatewayApi for FakeCloud {
    async fn create(&self, request: &CreateNatGateway) -> Result<MutationAck> {
        let mut world = self.world();
        world.call("vpc.CreateNatGateway")?;
        let id = format!("nat-{}", world.next());
        let settled = world
            .gateway_settles_as
            .clone()
            .unwrap_or_else(|| NAT_STATE_AVAILABLE.to_string());
        let mut created = gateway(&id, &settled);
        created.vpc_id = request.vpc_id.clone();
        let polls = world.pending_polls;
        world.gateways.insert(
            id.clone(),
            Timeline::converging(gateway(&id, NAT_STATE_PENDING), polls, Some(created)),
        );
        Ok(MutationAck {
            request_id: format!("req-{}", id),
            id,
        })
    }

    async fn describe(&self, id: &str) -> Result<Option<NatGateway>> {
        let mut world = self.world();
        world.call("vpc.DescribeNatGateways")?;
        Ok(world.gateways.get_mut(id).and_then(Timeline::observe))
    }

    async fn delete(&self, id: &str) -> Result<TaskAck> {
        let mut world = self.world();
        world.call("vpc.DeleteNatGateway")?;
        let polls = world.pending_polls;
        if let Some(timeline) = world.gateways.get_mut(id) {
            timeline.then(gateway(id, "DELETING"), polls, None);
        }

        let task_id = if world.vpc_delete_tasks {
            let task_id = format!("task-{}", world.next());
            world.vpc_tasks.insert(
                task_id.clone(),
                Timeline::converging(VpcTaskStatus::Running, polls, Some(VpcTaskStatus::Success)),
            );
            Some(task_id)
        } else {
            None
        };
        Ok(TaskAck {
            request_id: format!("req-delete-{}", id),
            task_id,
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<VpcTaskStatus> {
        let mut world = self.world();
        world.call("vpc.DescribeVpcTaskResult")?;
        world
            .vpc_tasks
            .get_mut(task_id)
            .and_then(Timeline::observe)
            .ok_or_else(|| TencentError::UnexpectedResponse(format!("no task {}", task_id)))
    }
}

#[async_trait]
impl RedisApi for FakeCloud {
    async fn zone_id(&self, zone: &str) -> Result<Option<u64>> {
        let mut world = self.world();
        world.call("cvm.DescribeZones")?;
        Ok(world.zones.get(zone).copied())
    }

    async fn create(&self, request: &CreateRedisInstances) -> Result<DealAck> {
        let mut world = self.world();
        world.call("redis.CreateInstances")?;
        let deal_id = format!("deal-{}", world.next());
        let instance_ids: Vec<String> = (0..request.goods_num)
            .map(|_| format!("crs-{}", world.next()))
            .collect();
        for id in &instance_ids {
            world.redis.insert(id.clone(), Timeline::settled(redis_instance(id)));
        }

        let status = world.deal_settles_as.unwrap_or(DEAL_STATUS_DELIVERED);
        let pending = DealDetail {
            deal_id: deal_id.clone(),
            status: 1,
            instance_ids: vec![],
        };
        let settled = DealDetail {
            deal_id: deal_id.clone(),
            status,
            instance_ids,
        };
        let polls = world.pending_polls;
        world
            .deals
            .insert(deal_id.clone(), Timeline::converging(pending, polls, Some(settled)));
        Ok(DealAck {
            request_id: format!("req-{}", deal_id),
            deal_id,
        })
    }

    async fn deal(&self, deal_id: &str) -> Result<Option<DealDetail>> {
        let mut world = self.world();
        world.call("redis.DescribeInstanceDealDetail")?;
        Ok(world.deals.get_mut(deal_id).and_then(Timeline::observe))
    }

    async fn describe(&self, id: &str) -> Result<Option<RedisInstance>> {
        let mut world = self.world();
        world.call("redis.DescribeInstances")?;
        Ok(world.redis.get_mut(id).and_then(Timeline::observe))
    }

    async fn clear(&self, id: &str, _password: &str) -> Result<RedisTaskAck> {
        let mut world = self.world();
        world.call("redis.ClearInstance")?;
        let task_id = u64::from(world.next());
        let polls = world.pending_polls;
        world.redis_tasks.insert(
            task_id,
            Timeline::converging(RedisTaskStatus::Running, polls, Some(RedisTaskStatus::Succeeded)),
        );
        Ok(RedisTaskAck {
            request_id: format!("req-clear-{}", id),
            task_id,
        })
    }

    async fn task(&self, task_id: u64) -> Result<RedisTaskStatus> {
        let mut world = self.world();
        world.call("redis.DescribeTaskInfo")?;
        world
            .redis_tasks
            .get_mut(&task_id)
            .and_then(Timeline::observe)
            .ok_or_else(|| TencentError::UnexpectedResponse(format!("no task {}", task_id)))
    }
}

#[async_trait]
impl DiskApi for FakeCloud {
    async fn create(&self, _request: &CreateDisks) -> Result<MutationAck> {
        let mut world = self.world();
        world.call("cbs.CreateDisks")?;
        let id = format!("disk-{}", world.next());
        let polls = world.pending_polls;
        world.disks.insert(
            id.clone(),
            Timeline::converging(
                disk(&id, "CREATING", ""),
                polls,
                Some(disk(&id, DISK_STATE_UNATTACHED, "")),
            ),
        );
        Ok(MutationAck {
            request_id: format!("req-{}", id),
            id,
        })
    }

    async fn describe(&self, id: &str) -> Result<Option<Disk>> {
        let mut world = self.world();
        world.call("cbs.DescribeDisks")?;
        Ok(world.disks.get_mut(id).and_then(Timeline::observe))
    }

    async fn attach(&self, id: &str, instance_id: &str) -> Result<String> {
        let mut world = self.world();
        world.call("cbs.AttachDisks")?;
        let polls = world.pending_polls;
        let timeline = world
            .disks
            .get_mut(id)
            .ok_or_else(|| TencentError::UnexpectedResponse(format!("no disk {}", id)))?;
        timeline.then(
            disk(id, "ATTACHING", instance_id),
            polls,
            Some(disk(id, DISK_STATE_ATTACHED, instance_id)),
        );
        Ok(format!("req-attach-{}", id))
    }

    async fn detach(&self, id: &str) -> Result<String> {
        let mut world = self.world();
        world.call("cbs.DetachDisks")?;
        let polls = world.pending_polls;
        let timeline = world
            .disks
            .get_mut(id)
            .ok_or_else(|| TencentError::UnexpectedResponse(format!("no disk {}", id)))?;
        timeline.then(
            disk(id, "DETACHING", ""),
            polls,
            Some(disk(id, DISK_STATE_UNATTACHED, "")),
        );
        Ok(format!("req-detach-{}", id))
    }

    async fn terminate(&self, id: &str) -> Result<String> {
        let mut world = self.world();
        world.call("cbs.TerminateDisks")?;
        let polls = world.pending_polls;
        let timeline = world
            .disks
            .get_mut(id)
            .ok_or_else(|| TencentError::UnexpectedResponse(format!("no disk {}", id)))?;
        timeline.then(disk(id, "TERMINATING", ""), polls, None);
        Ok(format!("req-terminate-{}", id))
    }
}

/// Invoke `plugin`/`action` with `inputs` wrapped in the batch envelope
pub async fn invoke(
    registry: &Registry,
    plugin: &str,
    action: &str,
    inputs: serde_json::Value,
) -> ActionReport {
    let raw = serde_json::json!({ "inputs": inputs }).to_string();
    registry.invoke(plugin, action, &raw).await
}

/// The `outputs` array of a report
pub fn outputs(report: &ActionReport) -> Vec<serde_json::Value> {
    report.output["outputs"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}
