use crate::config::{Config, MailBackendKind, MailConfig};
use crate::services::delivery::MailBackend;
use std::sync::Arc;

pub mod smtp;
pub mod transactional;
pub mod widget;

pub use smtp::SmtpBackend;
pub use transactional::TransactionalApiBackend;
pub use widget::WidgetBackend;

/// Builds the mail backend selected by `COURIER_MAIL_BACKEND`.
///
/// # Errors
/// Returns an error if the HTTP client or SMTP transport cannot be constructed.
pub fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn MailBackend>> {
    let backend: Arc<dyn MailBackend> = match config.mail.backend {
        MailBackendKind::Smtp => Arc::new(SmtpBackend::new(&config.smtp, config.mail.timeout())?),
        MailBackendKind::Api => Arc::new(TransactionalApiBackend::new(&config.api, http_client(&config.mail)?)),
        MailBackendKind::Widget => Arc::new(WidgetBackend::new(config.widget.clone(), http_client(&config.mail)?)),
    };
    Ok(backend)
}

fn http_client(mail: &MailConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(mail.timeout())
        .connect_timeout(mail.timeout())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
