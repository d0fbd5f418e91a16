use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Insufficient quota")]
    InsufficientQuota,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider error: {message}")]
    Provider { status: Option<u16>, message: String },

    #[error("Provider timed out after {0:?}")]
    ProviderTimeout(Duration),

    #[error("Malformed provider response: {0}")]
    MalformedProviderResponse(String),

    #[error("No image returned: {0}")]
    NoImageReturned(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::InsufficientQuota => StatusCode::PAYMENT_REQUIRED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider { .. }
            | AppError::MalformedProviderResponse(_)
            | AppError::NoImageReturned(_)
            | AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Storage(_)
            | AppError::Configuration(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::InsufficientQuota => "INSUFFICIENT_QUOTA",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Provider { .. } => "PROVIDER_ERROR",
            AppError::ProviderTimeout(_) => "PROVIDER_TIMEOUT",
            AppError::MalformedProviderResponse(_) => "MALFORMED_PROVIDER_RESPONSE",
            AppError::NoImageReturned(_) => "NO_IMAGE_RETURNED",
            AppError::Payment(_) => "PAYMENT_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short diagnostic kept on a failed history record.
    pub fn history_message(&self) -> String {
        match self {
            AppError::Provider {
                status: Some(status),
                ..
            } => format!("Provider returned HTTP {}", status),
            AppError::Provider { message, .. } => message.clone(),
            AppError::ProviderTimeout(timeout) => {
                format!("Provider timed out after {}s", timeout.as_secs())
            }
            AppError::MalformedProviderResponse(detail) => {
                format!("Malformed provider response: {}", detail)
            }
            AppError::NoImageReturned(preview) => format!("No image returned: {}", preview),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::FileTooLarge { .. } => self.to_string(),
            AppError::Unauthorized => "Unauthorized - Please sign in".to_string(),
            AppError::InvalidSignature => "Invalid webhook signature".to_string(),
            AppError::InsufficientQuota => {
                "No generation credits left - please purchase a pack".to_string()
            }
            AppError::NotFound(ref what) => format!("{} not found", what),
            AppError::Provider { .. } => "Image generation failed".to_string(),
            AppError::ProviderTimeout(_) => "Image generation timed out".to_string(),
            AppError::MalformedProviderResponse(_) => {
                "Image generation returned an unreadable response".to_string()
            }
            AppError::NoImageReturned(_) => "Image generation returned no image".to_string(),
            AppError::Payment(ref msg) => {
                tracing::error!("Payment provider error: {}", msg);
                "Payment provider unavailable".to_string()
            }
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                "Storage error".to_string()
            }
            AppError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                "Service misconfigured".to_string()
            }
            AppError::Serialization(ref e) => {
                tracing::error!("Serialization error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": self.code(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
