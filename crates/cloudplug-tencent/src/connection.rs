//! Per-request connection resolution and client construction

use crate::api::{ApiClient, Credential, Service};
use crate::cbs::{CbsClient, DiskApi};
use crate::error::Result as TencentResult;
use crate::redis::{RedisApi, RedisClient};
use crate::vpc::{NatGatewayApi, VpcClient};
use cloudplug_engine::{CloudError, ConnectionSource, ProviderParams, Result};
use std::sync::Arc;
use std::time::Duration;

pub const REGION: &str = "Region";
pub const AVAILABLE_ZONE: &str = "AvailableZone";
pub const SECRET_ID: &str = "SecretID";
pub const SECRET_KEY: &str = "SecretKey";

/// Region, zone and credentials for one request item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub region: String,
    pub zone: Option<String>,
    pub credential: Credential,
}

impl Connection {
    pub fn from_params(params: &ProviderParams) -> Result<Self> {
        let region = params.require(REGION)?.to_string();
        let credential = Credential::new(params.require(SECRET_ID)?, params.require(SECRET_KEY)?);

        // Absent is fine for kinds that do not need a zone; present-but-empty is a typo
        let zone = match params.get(AVAILABLE_ZONE) {
            Some("") => {
                return Err(CloudError::InvalidConnection(format!(
                    "wrong {} value",
                    AVAILABLE_ZONE
                )));
            }
            Some(zone) => Some(zone.to_string()),
            None => None,
        };

        Ok(Self {
            region,
            zone,
            credential,
        })
    }

    pub fn resolve(source: &ConnectionSource) -> Result<Self> {
        Self::from_params(&source.resolve()?)
    }

    pub fn require_zone(&self) -> Result<&str> {
        self.zone
            .as_deref()
            .ok_or_else(|| CloudError::InvalidConnection(format!("{} is missing", AVAILABLE_ZONE)))
    }
}

/// Builds remote clients bound to a [`Connection`]
pub trait ClientFactory: Send + Sync {
    fn nat_gateways(&self, connection: &Connection) -> Arc<dyn NatGatewayApi>;
    fn redis(&self, connection: &Connection) -> Arc<dyn RedisApi>;
    fn disks(&self, connection: &Connection) -> Arc<dyn DiskApi>;
}

/// Endpoint overrides, one per service; `None` means the public endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub vpc: Option<String>,
    pub redis: Option<String>,
    pub cvm: Option<String>,
    pub cbs: Option<String>,
}

/// [`ClientFactory`] talking to the real Tencent Cloud API over HTTPS
#[derive(Debug, Clone)]
pub struct TencentClientFactory {
    http: reqwest::Client,
    endpoints: Endpoints,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl TencentClientFactory {
    pub fn new(endpoints: Endpoints) -> TencentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoints })
    }

    fn client(
        &self,
        connection: &Connection,
        service: Service,
        endpoint: Option<&String>,
    ) -> ApiClient {
        ApiClient::new(
            self.http.clone(),
            connection.credential.clone(),
            &connection.region,
            service,
            endpoint.map(String::as_str),
        )
    }
}

impl ClientFactory for TencentClientFactory {
    fn nat_gateways(&self, connection: &Connection) -> Arc<dyn NatGatewayApi> {
        Arc::new(VpcClient::new(self.client(
            connection,
            Service::VPC,
            self.endpoints.vpc.as_ref(),
        )))
    }

    fn redis(&self, connection: &Connection) -> Arc<dyn RedisApi> {
        Arc::new(RedisClient::new(
            self.client(connection, Service::REDIS, self.endpoints.redis.as_ref()),
            self.client(connection, Service::CVM, self.endpoints.cvm.as_ref()),
        ))
    }

    fn disks(&self, connection: &Connection) -> Arc<dyn DiskApi> {
        Arc::new(CbsClient::new(self.client(
            connection,
            Service::CBS,
            self.endpoints.cbs.as_ref(),
        )))
    }
}
