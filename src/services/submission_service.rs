use crate::config::{FormConfig, MailConfig};
use crate::domain::location::LocationNormalizer;
use crate::domain::message::Envelope;
use crate::domain::submission::SubmissionRequest;
use crate::error::{AppError, Result};
use crate::services::delivery::composer::MessageComposer;
use crate::services::delivery::{MailBackend, required_setting};
use crate::services::validator::{AttachmentPolicy, SubmissionValidator};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub submissions_total: Counter<u64>,
    pub delivery_duration_seconds: Histogram<f64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            submissions_total: meter
                .u64_counter("courier_submissions_total")
                .with_description("Form submissions by outcome")
                .build(),
            delivery_duration_seconds: meter
                .f64_histogram("courier_delivery_duration_seconds")
                .with_description("Time spent waiting on the mail backend")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a submission through validation, location normalization, composition and delivery.
#[derive(Clone, Debug)]
pub struct SubmissionService {
    backend: Arc<dyn MailBackend>,
    validator: SubmissionValidator,
    normalizer: LocationNormalizer,
    composer: MessageComposer,
    mail: MailConfig,
    metrics: Metrics,
}

impl SubmissionService {
    #[must_use]
    pub fn new(backend: Arc<dyn MailBackend>, form: &FormConfig, mail: MailConfig) -> Self {
        Self {
            backend,
            validator: SubmissionValidator::from_config(form),
            normalizer: LocationNormalizer::new(form.map_search_url.clone()),
            composer: MessageComposer::from_config(form),
            mail,
            metrics: Metrics::new(),
        }
    }

    #[must_use]
    pub const fn attachment_policy(&self) -> AttachmentPolicy {
        self.validator.policy()
    }

    /// Validates the submission and delivers it through the configured backend.
    ///
    /// # Errors
    /// Returns a client error (`MissingFields`, attachment violations) before anything is
    /// composed, `Misconfigured` before any network call, or `Provider` if the backend fails.
    #[tracing::instrument(
        skip(self, request),
        fields(backend = self.backend.kind().as_str(), attachments = request.attachments.len())
    )]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<()> {
        let result = self.process(request).await;

        let outcome = match &result {
            Ok(()) => "sent",
            Err(AppError::Misconfigured(_)) => "misconfigured",
            Err(AppError::Provider { .. } | AppError::Unexpected(_)) => "failed",
            Err(_) => "rejected",
        };
        self.metrics.submissions_total.add(1, &[KeyValue::new("outcome", outcome)]);

        result
    }

    async fn process(&self, request: SubmissionRequest) -> Result<()> {
        tracing::debug!(fields = ?request.fields.keys().collect::<Vec<_>>(), has_location = request.location.is_some(), "Received submission");

        self.validator.validate(&request)?;

        let location = request.location.as_ref().map(|value| self.normalizer.normalize(value));

        let envelope = self.envelope()?;
        let message = self.composer.compose(envelope, request, location.as_ref());

        let start = Instant::now();
        let delivered = self.backend.deliver(&message).await;
        self.metrics
            .delivery_duration_seconds
            .record(start.elapsed().as_secs_f64(), &[KeyValue::new("backend", self.backend.kind().as_str())]);

        delivered?;
        tracing::info!("Submission delivered");
        Ok(())
    }

    fn envelope(&self) -> Result<Envelope> {
        let from_address = required_setting(self.mail.from_address.as_deref(), "COURIER_MAIL_FROM")?;
        let to_address = required_setting(self.mail.to_address.as_deref(), "COURIER_MAIL_TO")?;

        Ok(Envelope {
            from_address: from_address.to_string(),
            from_name: self.mail.sender_name.clone(),
            to_address: to_address.to_string(),
        })
    }
}
