//! VPC service: NAT gateways

use crate::api::{ApiClient, MutationAck, TaskAck};
use crate::error::{Result, TencentError};
use async_trait::async_trait;
use cloudplug_engine::Observed;
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub const NAT_STATE_PENDING: &str = "PENDING";
pub const NAT_STATE_AVAILABLE: &str = "AVAILABLE";
pub const NAT_STATE_FAILED: &str = "FAILED";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NatGateway {
    pub nat_gateway_id: String,
    #[serde(default)]
    pub nat_gateway_name: String,
    pub state: String,
    #[serde(default)]
    pub vpc_id: String,
}

impl Observed for NatGateway {
    fn state(&self) -> &str {
        &self.state
    }

    fn is_failed(&self) -> bool {
        self.state == NAT_STATE_FAILED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNatGateway {
    pub vpc_id: String,
    pub name: String,
    pub max_concurrent: u64,
    pub bandwidth: u64,
    pub assigned_eips: Vec<String>,
    pub auto_alloc_eip_num: u64,
}

impl CreateNatGateway {
    fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("VpcId".into(), json!(self.vpc_id));
        payload.insert("NatGatewayName".into(), json!(self.name));
        if self.max_concurrent > 0 {
            payload.insert("MaxConcurrentConnection".into(), json!(self.max_concurrent));
        }
        if self.bandwidth > 0 {
            payload.insert("InternetMaxBandwidthOut".into(), json!(self.bandwidth));
        }
        if !self.assigned_eips.is_empty() {
            payload.insert("PublicIpAddresses".into(), json!(self.assigned_eips));
        }
        if self.auto_alloc_eip_num > 0 {
            payload.insert("AddressCount".into(), json!(self.auto_alloc_eip_num));
        }
        Value::Object(payload)
    }
}

/// Status of an asynchronous VPC task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpcTaskStatus {
    Running,
    Success,
    Failed,
}

impl VpcTaskStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[async_trait]
pub trait NatGatewayApi: Send + Sync {
    async fn create(&self, request: &CreateNatGateway) -> Result<MutationAck>;

    /// `None` when the gateway does not exist
    async fn describe(&self, id: &str) -> Result<Option<NatGateway>>;

    async fn delete(&self, id: &str) -> Result<TaskAck>;

    async fn task_status(&self, task_id: &str) -> Result<VpcTaskStatus>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NatGatewaySetResponse {
    #[serde(default)]
    nat_gateway_set: Vec<NatGateway>,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteResponse {
    #[serde(default)]
    task_id: Option<Value>,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResultResponse {
    status: String,
}

/// HTTP client for the VPC service
#[derive(Debug, Clone)]
pub struct VpcClient {
    api: ApiClient,
}

impl VpcClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NatGatewayApi for VpcClient {
    async fn create(&self, request: &CreateNatGateway) -> Result<MutationAck> {
        let response: NatGatewaySetResponse =
            self.api.call("CreateNatGateway", &request.payload()).await?;

        let gateway = response.nat_gateway_set.into_iter().next().ok_or_else(|| {
            TencentError::UnexpectedResponse("CreateNatGateway returned no gateway".to_string())
        })?;

        tracing::info!(
            id = %gateway.nat_gateway_id,
            vpc_id = %request.vpc_id,
            request_id = %response.request_id,
            "NAT gateway creation accepted"
        );
        Ok(MutationAck {
            request_id: response.request_id,
            id: gateway.nat_gateway_id,
        })
    }

    async fn describe(&self, id: &str) -> Result<Option<NatGateway>> {
        let payload = json!({ "NatGatewayIds": [id] });
        let response: NatGatewaySetResponse =
            match self.api.call("DescribeNatGateways", &payload).await {
                Ok(response) => response,
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err),
            };

        match response.nat_gateway_set.len() {
            0 => Ok(None),
            1 => Ok(response.nat_gateway_set.into_iter().next()),
            n => Err(TencentError::UnexpectedResponse(format!(
                "DescribeNatGateways returned {} gateways for {}",
                n, id
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<TaskAck> {
        let payload = json!({ "NatGatewayId": id });
        let response: DeleteResponse = self.api.call("DeleteNatGateway", &payload).await?;

        let task_id = match response.task_id {
            Some(Value::String(task)) if !task.is_empty() => Some(task),
            Some(Value::Number(task)) => Some(task.to_string()),
            _ => None,
        };
        Ok(TaskAck {
            request_id: response.request_id,
            task_id,
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<VpcTaskStatus> {
        let payload = json!({ "TaskId": task_id });
        let response: TaskResultResponse = self.api.call("DescribeVpcTaskResult", &payload).await?;

        VpcTaskStatus::parse(&response.status).ok_or_else(|| {
            TencentError::UnexpectedResponse(format!("unknown VPC task status {}", response.status))
        })
    }
}
