//! CBS service: cloud block storage volumes

use crate::api::{ApiClient, MutationAck};
use crate::error::{Result, TencentError};
use async_trait::async_trait;
use cloudplug_engine::Observed;
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub const DISK_STATE_UNATTACHED: &str = "UNATTACHED";
pub const DISK_STATE_ATTACHING: &str = "ATTACHING";
pub const DISK_STATE_ATTACHED: &str = "ATTACHED";
pub const DISK_STATE_DETACHING: &str = "DETACHING";

pub const CHARGE_TYPE_PREPAID: &str = "PREPAID";
pub const CHARGE_TYPE_POSTPAID_BY_HOUR: &str = "POSTPAID_BY_HOUR";

/// Prepaid volumes renew automatically and notify before expiry
pub const RENEW_FLAG: &str = "NOTIFY_AND_AUTO_RENEW";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    pub disk_id: String,
    pub disk_state: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub disk_name: String,
}

impl Observed for Disk {
    fn state(&self) -> &str {
        &self.disk_state
    }

    fn holder(&self) -> Option<&str> {
        (!self.instance_id.is_empty()).then_some(self.instance_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDisks {
    pub zone: String,
    pub disk_type: String,
    pub disk_size: u64,
    pub disk_name: Option<String>,
    pub charge_type: String,
    /// Months; only sent for prepaid volumes
    pub prepaid_period: Option<u64>,
}

impl CreateDisks {
    fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("Placement".into(), json!({ "Zone": self.zone }));
        payload.insert("DiskType".into(), json!(self.disk_type));
        payload.insert("DiskSize".into(), json!(self.disk_size));
        payload.insert("DiskChargeType".into(), json!(self.charge_type));
        payload.insert("DiskCount".into(), json!(1));
        if let Some(name) = &self.disk_name {
            payload.insert("DiskName".into(), json!(name));
        }
        if let Some(period) = self.prepaid_period {
            payload.insert(
                "DiskChargePrepaid".into(),
                json!({ "Period": period, "RenewFlag": RENEW_FLAG }),
            );
        }
        Value::Object(payload)
    }
}

#[async_trait]
pub trait DiskApi: Send + Sync {
    async fn create(&self, request: &CreateDisks) -> Result<MutationAck>;

    /// `None` when the volume does not exist
    async fn describe(&self, id: &str) -> Result<Option<Disk>>;

    /// Attach to `instance_id`; the volume is released together with the instance
    async fn attach(&self, id: &str, instance_id: &str) -> Result<String>;

    async fn detach(&self, id: &str) -> Result<String>;

    async fn terminate(&self, id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    #[serde(default)]
    disk_id_set: Vec<String>,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResponse {
    #[serde(default)]
    disk_set: Vec<Disk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RequestOnly {
    #[serde(default)]
    request_id: String,
}

/// HTTP client for the CBS service
#[derive(Debug, Clone)]
pub struct CbsClient {
    api: ApiClient,
}

impl CbsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DiskApi for CbsClient {
    async fn create(&self, request: &CreateDisks) -> Result<MutationAck> {
        let response: CreateResponse = self.api.call("CreateDisks", &request.payload()).await?;
        let id = response.disk_id_set.into_iter().next().ok_or_else(|| {
            TencentError::UnexpectedResponse("CreateDisks returned no disk id".to_string())
        })?;

        tracing::info!(%id, request_id = %response.request_id, "volume creation accepted");
        Ok(MutationAck {
            request_id: response.request_id,
            id,
        })
    }

    async fn describe(&self, id: &str) -> Result<Option<Disk>> {
        let payload = json!({ "DiskIds": [id] });
        let response: DescribeResponse = match self.api.call("DescribeDisks", &payload).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        match response.disk_set.len() {
            0 => Ok(None),
            1 => Ok(response.disk_set.into_iter().next()),
            n => Err(TencentError::UnexpectedResponse(format!(
                "DescribeDisks returned {} volumes for {}",
                n, id
            ))),
        }
    }

    async fn attach(&self, id: &str, instance_id: &str) -> Result<String> {
        let payload = json!({
            "DiskIds": [id],
            "InstanceId": instance_id,
            "DeleteWithInstance": true,
        });
        let response: RequestOnly = self.api.call("AttachDisks", &payload).await?;
        Ok(response.request_id)
    }

    async fn detach(&self, id: &str) -> Result<String> {
        let payload = json!({ "DiskIds": [id] });
        let response: RequestOnly = self.api.call("DetachDisks", &payload).await?;
        Ok(response.request_id)
    }

    async fn terminate(&self, id: &str) -> Result<String> {
        let payload = json!({ "DiskIds": [id] });
        let response: RequestOnly = self.api.call("TerminateDisks", &payload).await?;
        Ok(response.request_id)
    }
}
