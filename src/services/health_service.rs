use crate::config::{HealthConfig, MailBackendKind};
use crate::services::delivery::MailBackend;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            status: meter
                .i64_gauge("courier_health_status")
                .with_description("Status of the mail backend health check (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    backend: Arc<dyn MailBackend>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(backend: Arc<dyn MailBackend>, config: HealthConfig) -> Self {
        Self { backend, config, metrics: Metrics::new() }
    }

    #[must_use]
    pub fn backend_kind(&self) -> MailBackendKind {
        self.backend.kind()
    }

    /// Checks that the mail backend is reachable and configured.
    ///
    /// # Errors
    /// Returns a string describing the failure if the backend is unusable or the check times out.
    pub async fn check_mail(&self) -> Result<(), String> {
        let mail_timeout = Duration::from_millis(self.config.timeout_ms);
        let labels = [KeyValue::new("backend", self.backend.kind().as_str())];

        match timeout(mail_timeout, self.backend.health_check()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &labels);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &labels);
                Err(format!("Mail backend check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &labels);
                Err("Mail backend check timed out".to_string())
            }
        }
    }
}
