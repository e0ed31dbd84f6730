//! Redis service: cache instances, purchase deals and async tasks
//!
//! Instance creation is a purchase. The API answers with a deal id, and the
//! instance ids only show up on the deal once it has been delivered.

use crate::api::ApiClient;
use crate::error::{Result, TencentError};
use async_trait::async_trait;
use cloudplug_engine::{Observed, Progress};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Deal delivered, instances are running
pub const DEAL_STATUS_DELIVERED: i64 = 4;

/// Deal states that will never turn into a delivered instance
pub const DEAL_STATUS_FAILED: std::ops::RangeInclusive<i64> = 5..=11;

pub const INSTANCE_STATE_RUNNING: &str = "RUNNING";
pub const INSTANCE_STATE_ISOLATED: &str = "ISOLATED";
pub const INSTANCE_STATE_PENDING_DELETE: &str = "PENDING_DELETE";

pub const BILLING_POSTPAID: i64 = 0;
pub const BILLING_PREPAID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealDetail {
    pub deal_id: String,
    pub status: i64,
    #[serde(default)]
    pub instance_ids: Vec<String>,
}

impl DealDetail {
    pub fn progress(&self) -> Progress {
        let observed = format!("deal status {}", self.status);
        if self.status == DEAL_STATUS_DELIVERED {
            Progress::Converged
        } else if DEAL_STATUS_FAILED.contains(&self.status) {
            Progress::Failed(observed)
        } else {
            Progress::Pending(observed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedisInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    pub status: i64,
}

impl Observed for RedisInstance {
    fn state(&self) -> &str {
        match self.status {
            0 => "PENDING_INIT",
            1 => "PROCESSING",
            2 => INSTANCE_STATE_RUNNING,
            -2 => INSTANCE_STATE_ISOLATED,
            -3 => INSTANCE_STATE_PENDING_DELETE,
            _ => "UNKNOWN",
        }
    }
}

impl RedisInstance {
    /// Isolated or awaiting deletion; such an instance never returns to RUNNING
    pub fn is_reclaimed(&self) -> bool {
        matches!(self.status, -2 | -3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRedisInstances {
    pub zone_id: u64,
    pub type_id: u64,
    pub mem_size: u64,
    pub goods_num: u64,
    pub period: u64,
    pub password: String,
    pub billing_mode: i64,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
}

impl CreateRedisInstances {
    fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("ZoneId".into(), json!(self.zone_id));
        payload.insert("TypeId".into(), json!(self.type_id));
        payload.insert("MemSize".into(), json!(self.mem_size));
        payload.insert("GoodsNum".into(), json!(self.goods_num));
        payload.insert("Period".into(), json!(self.period));
        payload.insert("Password".into(), json!(self.password));
        payload.insert("BillingMode".into(), json!(self.billing_mode));
        if let Some(vpc_id) = &self.vpc_id {
            payload.insert("VpcId".into(), json!(vpc_id));
        }
        if let Some(subnet_id) = &self.subnet_id {
            payload.insert("SubnetId".into(), json!(subnet_id));
        }
        Value::Object(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealAck {
    pub request_id: String,
    pub deal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisTaskAck {
    pub request_id: String,
    pub task_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisTaskStatus {
    Preparing,
    Running,
    Succeeded,
    Failed,
}

impl RedisTaskStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "preparing" => Some(Self::Preparing),
            "running" => Some(Self::Running),
            "succeed" => Some(Self::Succeeded),
            "failed" | "error" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn progress(&self) -> Progress {
        match self {
            Self::Succeeded => Progress::Converged,
            Self::Failed => Progress::Failed("task failed".to_string()),
            Self::Preparing => Progress::Pending("task preparing".to_string()),
            Self::Running => Progress::Pending("task running".to_string()),
        }
    }
}

#[async_trait]
pub trait RedisApi: Send + Sync {
    /// Numeric id of an AVAILABLE zone, `None` when the zone is unknown or unavailable
    async fn zone_id(&self, zone: &str) -> Result<Option<u64>>;

    async fn create(&self, request: &CreateRedisInstances) -> Result<DealAck>;

    /// `None` when the deal is unknown
    async fn deal(&self, deal_id: &str) -> Result<Option<DealDetail>>;

    /// `None` when the instance does not exist
    async fn describe(&self, id: &str) -> Result<Option<RedisInstance>>;

    async fn clear(&self, id: &str, password: &str) -> Result<RedisTaskAck>;

    async fn task(&self, task_id: u64) -> Result<RedisTaskStatus>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Zone {
    zone: String,
    zone_id: String,
    zone_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ZonesResponse {
    #[serde(default)]
    zone_set: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    deal_id: String,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DealsResponse {
    #[serde(default)]
    deal_details: Vec<DealDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstancesResponse {
    #[serde(default)]
    instance_set: Vec<RedisInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResponse {
    task_id: u64,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskInfoResponse {
    status: String,
}

/// HTTP client for the Redis service; zone lookups go through CVM
#[derive(Debug, Clone)]
pub struct RedisClient {
    redis: ApiClient,
    cvm: ApiClient,
}

impl RedisClient {
    pub fn new(redis: ApiClient, cvm: ApiClient) -> Self {
        Self { redis, cvm }
    }
}

#[async_trait]
impl RedisApi for RedisClient {
    async fn zone_id(&self, zone: &str) -> Result<Option<u64>> {
        let response: ZonesResponse = self.cvm.call("DescribeZones", &json!({})).await?;
        if response.zone_set.is_empty() {
            return Err(TencentError::UnexpectedResponse(
                "DescribeZones returned no zones".to_string(),
            ));
        }

        let Some(found) = response
            .zone_set
            .iter()
            .find(|z| z.zone == zone && z.zone_state == "AVAILABLE")
        else {
            return Ok(None);
        };

        found.zone_id.parse().map(Some).map_err(|_| {
            TencentError::UnexpectedResponse(format!("zone id {} is not numeric", found.zone_id))
        })
    }

    async fn create(&self, request: &CreateRedisInstances) -> Result<DealAck> {
        let response: CreateResponse = self
            .redis
            .call("CreateInstances", &request.payload())
            .await?;
        tracing::info!(
            deal_id = %response.deal_id,
            request_id = %response.request_id,
            "Redis purchase accepted"
        );
        Ok(DealAck {
            request_id: response.request_id,
            deal_id: response.deal_id,
        })
    }

    async fn deal(&self, deal_id: &str) -> Result<Option<DealDetail>> {
        let payload = json!({ "DealIds": [deal_id] });
        let response: DealsResponse = self
            .redis
            .call("DescribeInstanceDealDetail", &payload)
            .await?;
        Ok(response.deal_details.into_iter().next())
    }

    async fn describe(&self, id: &str) -> Result<Option<RedisInstance>> {
        let payload = json!({ "InstanceId": id });
        let response: InstancesResponse =
            match self.redis.call("DescribeInstances", &payload).await {
                Ok(response) => response,
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err),
            };

        match response.instance_set.len() {
            0 => Ok(None),
            1 => Ok(response.instance_set.into_iter().next()),
            n => Err(TencentError::UnexpectedResponse(format!(
                "DescribeInstances returned {} instances for {}",
                n, id
            ))),
        }
    }

    async fn clear(&self, id: &str, password: &str) -> Result<RedisTaskAck> {
        let payload = json!({ "InstanceId": id, "Password": password });
        let response: TaskResponse = self.redis.call("ClearInstance", &payload).await?;
        Ok(RedisTaskAck {
            request_id: response.request_id,
            task_id: response.task_id,
        })
    }

    async fn task(&self, task_id: u64) -> Result<RedisTaskStatus> {
        let payload = json!({ "TaskId": task_id });
        let response: TaskInfoResponse = self.redis.call("DescribeTaskInfo", &payload).await?;
        RedisTaskStatus::parse(&response.status).ok_or_else(|| {
            TencentError::UnexpectedResponse(format!(
                "unknown Redis task status {}",
                response.status
            ))
        })
    }
}
