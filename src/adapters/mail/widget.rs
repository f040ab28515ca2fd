use crate::config::{MailBackendKind, WidgetConfig};
use crate::domain::message::DeliveryMessage;
use crate::services::delivery::{DeliveryError, DeliveryResult, MailBackend, required_setting};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
struct WidgetPayload<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: Map<String, Value>,
}

struct Credentials<'a> {
    service_id: &'a str,
    template_id: &'a str,
    public_key: &'a str,
}

/// Sends mail through an EmailJS-style hosted template service.
///
/// The hosted template decides the final layout, so every rendered field is passed as a
/// template parameter alongside the prebuilt text and HTML bodies. Binary attachments are not
/// accepted by the JSON endpoint; their names are listed instead.
#[derive(Debug, Clone)]
pub struct WidgetBackend {
    client: reqwest::Client,
    config: WidgetConfig,
}

impl WidgetBackend {
    #[must_use]
    pub const fn new(config: WidgetConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn credentials(&self) -> Result<Credentials<'_>, DeliveryError> {
        Ok(Credentials {
            service_id: required_setting(self.config.service_id.as_deref(), "COURIER_WIDGET_SERVICE_ID")?,
            template_id: required_setting(self.config.template_id.as_deref(), "COURIER_WIDGET_TEMPLATE_ID")?,
            public_key: required_setting(self.config.public_key.as_deref(), "COURIER_WIDGET_PUBLIC_KEY")?,
        })
    }
}

/// Template parameters filled by the service itself.
const RESERVED_PARAMS: &[&str] =
    &["subject", "message", "message_html", "to_email", "from_email", "from_name", "map_url", "attachments"];

fn template_params(message: &DeliveryMessage) -> Map<String, Value> {
    let mut params = Map::new();
    for field in &message.fields {
        let key = if RESERVED_PARAMS.contains(&field.key.as_str()) {
            let renamed = format!("field_{}", field.key);
            tracing::warn!(field = %field.key, param = %renamed, "Form field collides with a template parameter");
            renamed
        } else {
            field.key.clone()
        };
        params.insert(key, Value::String(field.value.clone()));
    }
    params.insert("subject".into(), Value::String(message.subject.clone()));
    params.insert("message".into(), Value::String(message.text_body.clone()));
    params.insert("message_html".into(), Value::String(message.html_body.clone()));
    params.insert("to_email".into(), Value::String(message.envelope.to_address.clone()));
    params.insert("from_email".into(), Value::String(message.envelope.from_address.clone()));
    params.insert("from_name".into(), Value::String(message.envelope.from_name.clone()));
    params.insert("map_url".into(), message.map_url.clone().map_or(Value::Null, Value::String));
    params.insert("attachments".into(), Value::String(message.attachment_names().join(", ")));
    params
}

#[async_trait]
impl MailBackend for WidgetBackend {
    fn kind(&self) -> MailBackendKind {
        MailBackendKind::Widget
    }

    async fn health_check(&self) -> DeliveryResult {
        self.credentials().map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(endpoint = %self.config.endpoint))]
    async fn deliver(&self, message: &DeliveryMessage) -> DeliveryResult {
        let credentials = self.credentials()?;
        if !message.attachments.is_empty() {
            tracing::debug!(count = message.attachments.len(), "Widget backend sends attachment names only");
        }

        let payload = WidgetPayload {
            service_id: credentials.service_id,
            template_id: credentials.template_id,
            user_id: credentials.public_key,
            access_token: self.config.private_key.as_deref().map(str::trim).filter(|k| !k.is_empty()),
            template_params: template_params(message),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::provider("Widget request failed", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Email accepted by widget service");
            return Ok(());
        }

        let body = response.text().await.map_err(|e| {
            DeliveryError::provider(format!("Widget service failed with status {}", status.as_u16()), e.to_string())
        })?;
        tracing::warn!(status = status.as_u16(), body = %body, "Widget service rejected email");
        Err(DeliveryError::provider(format!("Widget service failed with status {}", status.as_u16()), body))
    }
}
