use crate::services::delivery::DeliveryError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Maximum {max} images allowed")]
    TooManyAttachments { max: usize },
    #[error("Only image files are allowed (got {0})")]
    InvalidAttachmentType(String),
    #[error("Attachment {filename} exceeds {max_bytes} bytes")]
    AttachmentTooLarge { filename: String, max_bytes: usize },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Server email settings not configured: {0}")]
    Misconfigured(String),
    #[error("{message}")]
    Provider { message: String, detail: Value },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable machine-readable name for the failure kind.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MissingFields",
            Self::TooManyAttachments { .. } => "TooManyAttachments",
            Self::InvalidAttachmentType(_) => "InvalidAttachmentType",
            Self::AttachmentTooLarge { .. } => "AttachmentTooLarge",
            Self::BadRequest(_) => "InvalidRequest",
            Self::Misconfigured(_) => "Misconfigured",
            Self::Provider { .. } => "ProviderError",
            Self::Unexpected(_) => "UnexpectedError",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields(_)
            | Self::TooManyAttachments { .. }
            | Self::InvalidAttachmentType(_)
            | Self::AttachmentTooLarge { .. }
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Misconfigured(_) | Self::Provider { .. } | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Misconfigured(reason) => Self::Misconfigured(reason),
            DeliveryError::Provider { message, detail } => Self::Provider { message, detail },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();

        let (message, error) = match self {
            Self::MissingFields(fields) => {
                tracing::debug!(fields = ?fields, "Missing required fields");
                ("Missing required fields".to_string(), Some(json!(fields)))
            }
            e @ (Self::TooManyAttachments { .. }
            | Self::InvalidAttachmentType(_)
            | Self::AttachmentTooLarge { .. }
            | Self::BadRequest(_)) => {
                tracing::debug!(reason, error = %e, "Rejected submission");
                (e.to_string(), None)
            }
            Self::Misconfigured(detail) => {
                tracing::error!(detail = %detail, "Mail settings not configured");
                ("Server email settings not configured".to_string(), Some(Value::String(detail)))
            }
            Self::Provider { message, detail } => {
                tracing::error!(detail = %detail, "{message}");
                (message, Some(detail))
            }
            Self::Unexpected(detail) => {
                tracing::error!(detail = %detail, "Unexpected error");
                ("Server error".to_string(), Some(Value::String(detail)))
            }
        };

        let mut body = json!({
            "success": false,
            "reason": reason,
            "message": message,
        });
        if let Some(error) = error {
            body["error"] = error;
        }

        (status, Json(body)).into_response()
    }
}
