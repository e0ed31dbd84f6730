//! YAML settings
//!
//! Every field is optional. Unset values fall back to the provider's
//! per-kind defaults when the settings are applied.
//!
//! ```yaml
//! poll:
//!   storage:
//!     interval_secs: 5
//!     max_attempts: 30
//!     failure_policy: continue_on_failure
//! endpoints:
//!   cbs: https://cbs.internal.example.com
//! ```

use crate::error::{ConfigError, Result};
use cloudplug_engine::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub poll: PollSettings,
    pub endpoints: EndpointSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub nat_gateway: KindSettings,
    pub redis: KindSettings,
    pub storage: KindSettings,
}

/// Polling budget and batch discipline overrides for one resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
}

impl KindSettings {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }

    fn validate(&self, kind: &str) -> Result<()> {
        if self.interval_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: format!("poll.{}.interval_secs", kind),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                key: format!("poll.{}.max_attempts", kind),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-service endpoint overrides (private endpoints, proxies)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbs: Option<String>,
}

impl EndpointSettings {
    fn validate(&self) -> Result<()> {
        let endpoints = [
            ("vpc", &self.vpc),
            ("redis", &self.redis),
            ("cvm", &self.cvm),
            ("cbs", &self.cbs),
        ];
        for (service, endpoint) in endpoints {
            let Some(url) = endpoint else { continue };
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    key: format!("endpoints.{}", service),
                    reason: format!("{} is not an http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty file is a valid, empty configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_yaml::from_str::<serde_yaml::Value>(content)? {
            serde_yaml::Value::Null => Ok(Self::default()),
            value => serde_yaml::from_value(value),
        }
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.poll.nat_gateway.validate("nat_gateway")?;
        self.poll.redis.validate("redis")?;
        self.poll.storage.validate("storage")?;
        self.endpoints.validate()
    }
}
