use crate::config::{MailBackendKind, SmtpConfig, SmtpTls};
use crate::domain::message::DeliveryMessage;
use crate::services::delivery::{DeliveryError, DeliveryResult, MailBackend};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Delivers through an SMTP relay.
///
/// The transport is built once at startup. When required settings are missing the backend is
/// still constructed, but every call reports `Misconfigured` without opening a connection.
#[derive(Debug)]
pub struct SmtpBackend {
    transport: Result<AsyncSmtpTransport<Tokio1Executor>, String>,
}

impl SmtpBackend {
    /// # Errors
    /// Returns an error if the relay host cannot be used to set up TLS.
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, lettre::transport::smtp::Error> {
        let Some(host) = config.host.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(Self::unavailable("COURIER_SMTP_HOST is not set"));
        };

        let credentials = match (config.username.as_deref(), config.password.as_deref()) {
            (Some(user), Some(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some(Credentials::new(user.trim().to_string(), pass.to_string()))
            }
            // Plaintext relays are expected to be local and unauthenticated.
            _ if config.tls == SmtpTls::None => None,
            _ => return Ok(Self::unavailable("COURIER_SMTP_USERNAME and COURIER_SMTP_PASSWORD must be set")),
        };

        let builder = match config.tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let builder = builder.port(config.port()).timeout(Some(timeout));
        let builder = match credentials {
            Some(credentials) => builder.credentials(credentials),
            None => builder,
        };

        tracing::debug!(host, port = config.port(), tls = ?config.tls, "SMTP transport configured");
        Ok(Self { transport: Ok(builder.build()) })
    }

    fn unavailable(reason: &str) -> Self {
        Self { transport: Err(reason.to_string()) }
    }

    fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        self.transport.as_ref().map_err(|reason| DeliveryError::Misconfigured(reason.clone()))
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, DeliveryError> {
    let address = address
        .trim()
        .parse::<Address>()
        .map_err(|e| DeliveryError::Misconfigured(format!("invalid email address `{address}`: {e}")))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

fn build_email(message: &DeliveryMessage) -> Result<Message, DeliveryError> {
    let from = mailbox(Some(&message.envelope.from_name), &message.envelope.from_address)?;
    let to = mailbox(None, &message.envelope.to_address)?;

    let mut body =
        MultiPart::mixed().multipart(MultiPart::alternative_plain_html(message.text_body.clone(), message.html_body.clone()));
    for attachment in &message.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| DeliveryError::provider("Invalid attachment content type", e.to_string()))?;
        body = body.singlepart(MimeAttachment::new(attachment.filename.clone()).body(attachment.content.to_vec(), content_type));
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .multipart(body)
        .map_err(|e| DeliveryError::provider("Failed to build email", e.to_string()))
}

#[async_trait]
impl MailBackend for SmtpBackend {
    fn kind(&self) -> MailBackendKind {
        MailBackendKind::Smtp
    }

    async fn health_check(&self) -> DeliveryResult {
        match self.transport()?.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::provider("SMTP relay check failed", "relay did not accept the connection")),
            Err(e) => Err(DeliveryError::provider("SMTP relay check failed", e.to_string())),
        }
    }

    #[tracing::instrument(skip_all, fields(attachments = message.attachments.len()))]
    async fn deliver(&self, message: &DeliveryMessage) -> DeliveryResult {
        let transport = self.transport()?;
        let email = build_email(message)?;

        match transport.send(email).await {
            Ok(response) => {
                tracing::info!(code = %response.code(), "Email accepted by SMTP relay");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMTP relay rejected email");
                Err(DeliveryError::provider("SMTP delivery failed", e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attachment::Attachment;
    use crate::domain::message::Envelope;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: Some("smtp.example.com".into()),
            port: None,
            username: Some("user".into()),
            password: Some("secret".into()),
            tls: SmtpTls::Starttls,
        }
    }

    fn message() -> DeliveryMessage {
        DeliveryMessage {
            envelope: Envelope {
                from_address: "bot@example.com".into(),
                from_name: "Form Bot".into(),
                to_address: "ops@example.com".into(),
            },
            subject: "New Waste Collection Request".into(),
            text_body: "Name: Asha\n".into(),
            html_body: "<ul><li><b>Name:</b> Asha</li></ul>".into(),
            fields: Vec::new(),
            map_url: None,
            attachments: vec![Attachment::new("bin.png", "image/png", vec![137u8, 80, 78, 71])],
        }
    }

    #[tokio::test]
    async fn test_missing_host_is_misconfigured() {
        let mut cfg = config();
        cfg.host = None;
        let backend = SmtpBackend::new(&cfg, Duration::from_secs(1)).unwrap();

        let err = backend.deliver(&message()).await.unwrap_err();
        assert_eq!(err.to_string(), "Mail backend misconfigured: COURIER_SMTP_HOST is not set");
        assert!(matches!(backend.health_check().await, Err(DeliveryError::Misconfigured(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_misconfigured() {
        let mut cfg = config();
        cfg.password = None;
        let backend = SmtpBackend::new(&cfg, Duration::from_secs(1)).unwrap();

        assert!(matches!(backend.deliver(&message()).await, Err(DeliveryError::Misconfigured(_))));
    }

    #[test]
    fn test_plaintext_relay_needs_no_credentials() {
        let cfg = SmtpConfig { username: None, password: None, tls: SmtpTls::None, port: Some(25), ..config() };
        let backend = SmtpBackend::new(&cfg, Duration::from_secs(1)).unwrap();
        assert!(backend.transport().is_ok());
    }

    #[test]
    fn test_build_email_includes_alternatives_and_attachment() {
        let email = build_email(&message()).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("Subject: New Waste Collection Request"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("bin.png"));
        assert!(raw.contains("image/png"));
    }

    #[test]
    fn test_invalid_recipient_is_misconfigured() {
        let mut msg = message();
        msg.envelope.to_address = "not-an-address".into();
        assert!(matches!(build_email(&msg), Err(DeliveryError::Misconfigured(_))));
    }
}
