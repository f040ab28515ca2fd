use crate::config::{ApiConfig, MailBackendKind};
use crate::domain::message::DeliveryMessage;
use crate::services::delivery::{DeliveryError, DeliveryResult, MailBackend, required_setting};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct Contact<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload<'a> {
    name: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailPayload<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<AttachmentPayload<'a>>,
}

impl<'a> EmailPayload<'a> {
    fn from_message(message: &'a DeliveryMessage) -> Self {
        Self {
            sender: Contact { name: Some(&message.envelope.from_name), email: &message.envelope.from_address },
            to: vec![Contact { name: None, email: &message.envelope.to_address }],
            subject: &message.subject,
            html_content: &message.html_body,
            text_content: &message.text_body,
            attachment: message
                .attachments
                .iter()
                .map(|a| AttachmentPayload { name: &a.filename, content: STANDARD.encode(&a.content) })
                .collect(),
        }
    }
}

/// Sends mail through a Brevo-style transactional HTTP API.
#[derive(Debug, Clone)]
pub struct TransactionalApiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl TransactionalApiBackend {
    #[must_use]
    pub fn new(config: &ApiConfig, client: reqwest::Client) -> Self {
        Self { client, endpoint: config.endpoint.clone(), api_key: config.api_key.clone() }
    }

    fn api_key(&self) -> Result<&str, DeliveryError> {
        required_setting(self.api_key.as_deref(), "COURIER_API_KEY")
    }
}

#[async_trait]
impl MailBackend for TransactionalApiBackend {
    fn kind(&self) -> MailBackendKind {
        MailBackendKind::Api
    }

    async fn health_check(&self) -> DeliveryResult {
        self.api_key().map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint, attachments = message.attachments.len()))]
    async fn deliver(&self, message: &DeliveryMessage) -> DeliveryResult {
        let api_key = self.api_key()?;
        let payload = EmailPayload::from_message(message);

        tracing::debug!("Sending email via transactional API");
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", api_key)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::provider("Mail API request failed", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Email accepted by transactional API");
            return Ok(());
        }

        let body = response.text().await.map_err(|e| {
            DeliveryError::provider(format!("Mail API failed with status {}", status.as_u16()), e.to_string())
        })?;
        let detail = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        tracing::warn!(status = status.as_u16(), detail = %detail, "Transactional API rejected email");

        Err(DeliveryError::provider(format!("Mail API failed with status {}", status.as_u16()), detail))
    }
}
