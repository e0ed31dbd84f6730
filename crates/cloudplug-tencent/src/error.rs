//! Tencent Cloud transport error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TencentError {
    #[error("Tencent Cloud API error {code}: {message} (request id: {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl TencentError {
    /// Whether the control plane reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            TencentError::Api { code, .. } => {
                code.starts_with("ResourceNotFound") || code.ends_with(".NotFound")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TencentError>;
