//! Connection parameter blobs
//!
//! Requests carry their control-plane connection as an opaque
//! `Key=Value;Key=Value` string, e.g.
//! `Region=ap-guangzhou;AvailableZone=ap-guangzhou-4;SecretID=...;SecretKey=...`.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed `Key=Value;...` connection parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderParams {
    values: BTreeMap<String, String>,
}

impl ProviderParams {
    pub fn parse(raw: &str) -> Self {
        let values = raw
            .split(';')
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();

        Self { values }
    }

    /// Raw value; `Some("")` when the key is present but empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Non-empty value or [`CloudError::InvalidConnection`]
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CloudError::InvalidConnection(format!("{} is missing", key))),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Where a request's connection parameters come from
///
/// Either a complete `provider_params` blob, or a `location` blob
/// (region/zone) plus an `api_secret` blob (credentials) that are joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_params: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_secret: String,
}

impl ConnectionSource {
    pub fn from_provider_params(raw: impl Into<String>) -> Self {
        Self {
            provider_params: raw.into(),
            ..Default::default()
        }
    }

    /// Validate that one of the two supported forms is present
    pub fn check(&self) -> Result<()> {
        if !self.provider_params.is_empty() {
            return Ok(());
        }
        if self.api_secret.is_empty() {
            return Err(CloudError::validation("APISecret is empty"));
        }
        if self.location.is_empty() {
            return Err(CloudError::validation("Location is empty"));
        }
        Ok(())
    }

    /// The effective blob; `location` + `api_secret` take precedence when both are set
    pub fn raw(&self) -> String {
        if !self.location.is_empty() && !self.api_secret.is_empty() {
            format!("{};{}", self.location, self.api_secret)
        } else {
            self.provider_params.clone()
        }
    }

    pub fn resolve(&self) -> Result<ProviderParams> {
        self.check()?;
        Ok(ProviderParams::parse(&self.raw()))
    }
}
