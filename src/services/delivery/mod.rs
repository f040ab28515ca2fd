use crate::config::MailBackendKind;
use crate::domain::message::DeliveryMessage;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod composer;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Mail backend misconfigured: {0}")]
    Misconfigured(String),
    #[error("{message}")]
    Provider { message: String, detail: Value },
}

impl DeliveryError {
    pub fn provider(message: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self::Provider { message: message.into(), detail: detail.into() }
    }
}

pub type DeliveryResult = Result<(), DeliveryError>;

/// An outbound mail provider.
///
/// Implementations must not reach the network when their own configuration is incomplete;
/// they report `DeliveryError::Misconfigured` instead.
#[async_trait]
pub trait MailBackend: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> MailBackendKind;

    /// Verifies the backend can accept mail without sending anything.
    ///
    /// # Errors
    /// Returns `DeliveryError` describing why the backend is unusable.
    async fn health_check(&self) -> DeliveryResult;

    /// Hands a rendered message to the provider.
    ///
    /// # Errors
    /// Returns `DeliveryError::Provider` for any transport or provider rejection.
    async fn deliver(&self, message: &DeliveryMessage) -> DeliveryResult;
}

/// Returns the value when present and non-blank, else a `Misconfigured` error naming `setting`.
///
/// # Errors
/// Returns `DeliveryError::Misconfigured` if the setting is missing.
pub fn required_setting<'a>(value: Option<&'a str>, setting: &str) -> Result<&'a str, DeliveryError> {
    value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| DeliveryError::Misconfigured(format!("{setting} is not set")))
}
