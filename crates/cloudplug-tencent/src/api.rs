//! Tencent Cloud API 3.0 transport
//!
//! Every call is a signed JSON POST to the service endpoint; the action name
//! travels in the `X-TC-Action` header and the result comes back wrapped in a
//! `{"Response": {...}}` envelope.

use crate::error::{Result, TencentError};
use crate::sign;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// API key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
}

impl Credential {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A Tencent Cloud product API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub name: &'static str,
    pub version: &'static str,
}

impl Service {
    pub const VPC: Service = Service {
        name: "vpc",
        version: "2017-03-12",
    };
    pub const REDIS: Service = Service {
        name: "redis",
        version: "2018-04-12",
    };
    pub const CVM: Service = Service {
        name: "cvm",
        version: "2017-03-12",
    };
    pub const CBS: Service = Service {
        name: "cbs",
        version: "2017-03-12",
    };

    pub fn default_endpoint(&self) -> String {
        format!("https://{}.tencentcloudapi.com", self.name)
    }
}

/// Acknowledgement of a mutation that assigned a resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationAck {
    pub request_id: String,
    pub id: String,
}

/// Acknowledgement of a mutation that may continue as an async task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAck {
    pub request_id: String,
    pub task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

/// Signed client for one service in one region
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    credential: Credential,
    region: String,
    service: Service,
    endpoint: String,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        credential: Credential,
        region: impl Into<String>,
        service: Service,
        endpoint: Option<&str>,
    ) -> Self {
        Self {
            http,
            credential,
            region: region.into(),
            service,
            endpoint: endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| service.default_endpoint()),
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Invoke `action` with a JSON `payload` and decode the `Response` body
    pub async fn call<T: DeserializeOwned>(&self, action: &str, payload: &Value) -> Result<T> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| TencentError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(TencentError::InvalidEndpoint(self.endpoint.clone())),
        };

        let body = serde_json::to_string(payload)?;
        let timestamp = chrono::Utc::now().timestamp();
        let authorization =
            sign::authorization(&self.credential, self.service.name, &host, &body, timestamp);

        tracing::debug!(
            service = self.service.name,
            action,
            region = %self.region,
            "calling Tencent Cloud API"
        );

        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, sign::CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", self.service.version)
            .header("X-TC-Region", &self.region)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope = response.json().await?;
        let mut response = envelope.response;

        if let Some(error) = response.get_mut("Error").map(Value::take) {
            let error: ApiError = serde_json::from_value(error)?;
            let request_id = response
                .get("RequestId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::warn!(
                service = self.service.name,
                action,
                code = %error.code,
                %request_id,
                "Tencent Cloud API returned an error"
            );
            return Err(TencentError::Api {
                code: error.code,
                message: error.message,
                request_id,
            });
        }

        Ok(serde_json::from_value(response)?)
    }
}
