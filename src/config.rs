use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub form: FormConfig,

    #[command(flatten)]
    pub mail: MailConfig,

    #[command(flatten)]
    pub smtp: SmtpConfig,

    #[command(flatten)]
    pub api: ApiConfig,

    #[command(flatten)]
    pub widget: WidgetConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "COURIER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "COURIER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "COURIER_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,

    /// Seconds to wait for in-flight requests during shutdown
    #[arg(long, env = "COURIER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

/// Per-client-IP limits for `/send-email`.
///
/// The defaults (one submission per second, bursts of five) are the production setting for a
/// public form. Deployments behind a shared NAT can raise them.
#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Submissions per second allowed per client
    #[arg(long = "rate-limit-per-second", env = "COURIER_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub per_second: u32,

    /// Burst allowance per client
    #[arg(long = "rate-limit-burst", env = "COURIER_RATE_LIMIT_BURST", default_value_t = 5)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct FormConfig {
    /// Fields that must be present and non-empty, in the order they appear in the email
    #[arg(
        long,
        env = "COURIER_REQUIRED_FIELDS",
        default_value = "name,contactNumber,area,locality,wasteType,wasteAmount,location",
        value_delimiter = ','
    )]
    pub required_fields: Vec<String>,

    /// Name of the field carrying the submitter's location
    #[arg(long, env = "COURIER_LOCATION_FIELD", default_value = "location")]
    pub location_field: String,

    /// Name of the multipart field carrying image attachments
    #[arg(long, env = "COURIER_ATTACHMENT_FIELD", default_value = "images")]
    pub attachment_field: String,

    /// Display labels as `key=Label` pairs; other keys are humanized from camelCase
    #[arg(
        long,
        env = "COURIER_FIELD_LABELS",
        default_value = "wasteType=Type of Waste,wasteAmount=Amount of Waste",
        value_delimiter = ',',
        value_parser = parse_label
    )]
    pub field_labels: Vec<(String, String)>,

    /// Email subject line
    #[arg(long, env = "COURIER_SUBJECT", default_value = "New Waste Collection Request")]
    pub subject: String,

    /// Heading rendered at the top of the email body
    #[arg(long, env = "COURIER_HEADING", default_value = "New Waste Collection Submission")]
    pub heading: String,

    /// Maximum number of image attachments per submission
    #[arg(long, env = "COURIER_MAX_IMAGES", default_value_t = 5)]
    pub max_images: usize,

    /// Maximum size of a single image attachment in bytes (Default: 5MB)
    #[arg(long, env = "COURIER_MAX_IMAGE_BYTES", default_value_t = 5_242_880)]
    pub max_image_bytes: usize,

    /// Map search endpoint used to build location links
    #[arg(long, env = "COURIER_MAP_SEARCH_URL", default_value = "https://www.google.com/maps/search/")]
    pub map_search_url: String,
}

impl FormConfig {
    /// Upper bound for a whole request body: every attachment at full size plus room for text fields.
    #[must_use]
    pub const fn body_limit_bytes(&self) -> usize {
        self.max_images.saturating_mul(self.max_image_bytes).saturating_add(1024 * 1024)
    }
}

fn parse_label(raw: &str) -> Result<(String, String), String> {
    let (key, label) = raw.split_once('=').ok_or_else(|| format!("expected key=Label, got `{raw}`"))?;
    let (key, label) = (key.trim(), label.trim());
    if key.is_empty() || label.is_empty() {
        return Err(format!("expected key=Label, got `{raw}`"));
    }
    Ok((key.to_string(), label.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MailBackendKind {
    /// SMTP relay
    Smtp,
    /// Transactional email HTTP API (Brevo-compatible)
    Api,
    /// Hosted email widget (EmailJS-compatible REST endpoint)
    Widget,
}

impl MailBackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smtp => "smtp",
            Self::Api => "api",
            Self::Widget => "widget",
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct MailConfig {
    /// Which mail backend delivers submissions
    #[arg(long = "mail-backend", env = "COURIER_MAIL_BACKEND", value_enum, default_value_t = MailBackendKind::Api)]
    pub backend: MailBackendKind,

    /// Sender address
    #[arg(long = "mail-from", env = "COURIER_MAIL_FROM")]
    pub from_address: Option<String>,

    /// Recipient address
    #[arg(long = "mail-to", env = "COURIER_MAIL_TO")]
    pub to_address: Option<String>,

    /// Display name used for the sender
    #[arg(long = "mail-sender-name", env = "COURIER_MAIL_SENDER_NAME", default_value = "Form Bot")]
    pub sender_name: String,

    /// Bounded wait for any outbound mail call
    #[arg(long = "mail-timeout-secs", env = "COURIER_MAIL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Run a backend health check once at startup
    #[arg(
        long = "mail-verify-on-startup",
        env = "COURIER_MAIL_VERIFY_ON_STARTUP",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub verify_on_startup: bool,
}

impl MailConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (usually port 587)
    Starttls,
    /// Implicit TLS from the first byte (usually port 465)
    Tls,
    /// No encryption; only for local relays
    None,
}

#[derive(Clone, Debug, Args)]
pub struct SmtpConfig {
    /// SMTP relay host
    #[arg(id = "smtp-host", long = "smtp-host", env = "COURIER_SMTP_HOST")]
    pub host: Option<String>,

    /// SMTP relay port (Default: 587 for starttls, 465 for tls, 25 for none)
    #[arg(id = "smtp-port", long = "smtp-port", env = "COURIER_SMTP_PORT")]
    pub port: Option<u16>,

    /// SMTP username
    #[arg(long = "smtp-username", env = "COURIER_SMTP_USERNAME")]
    pub username: Option<String>,

    /// SMTP password
    #[arg(long = "smtp-password", env = "COURIER_SMTP_PASSWORD")]
    pub password: Option<String>,

    /// Transport security for the relay connection
    #[arg(long = "smtp-tls", env = "COURIER_SMTP_TLS", value_enum, default_value_t = SmtpTls::Starttls)]
    pub tls: SmtpTls,
}

impl SmtpConfig {
    /// Configured port, or the conventional one for the transport security mode.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.tls {
            SmtpTls::Starttls => 587,
            SmtpTls::Tls => 465,
            SmtpTls::None => 25,
        })
    }
}

#[derive(Clone, Debug, Args)]
pub struct ApiConfig {
    /// Transactional email endpoint
    #[arg(id = "api-endpoint", long = "api-endpoint", env = "COURIER_API_ENDPOINT", default_value = "https://api.brevo.com/v3/smtp/email")]
    pub endpoint: String,

    /// API key sent in the `api-key` header
    #[arg(long = "api-key", env = "COURIER_API_KEY")]
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct WidgetConfig {
    /// Widget REST endpoint
    #[arg(
        long = "widget-endpoint",
        env = "COURIER_WIDGET_ENDPOINT",
        default_value = "https://api.emailjs.com/api/v1.0/email/send"
    )]
    pub endpoint: String,

    /// Widget service identifier
    #[arg(long = "widget-service-id", env = "COURIER_WIDGET_SERVICE_ID")]
    pub service_id: Option<String>,

    /// Widget template identifier
    #[arg(long = "widget-template-id", env = "COURIER_WIDGET_TEMPLATE_ID")]
    pub template_id: Option<String>,

    /// Widget public key
    #[arg(long = "widget-public-key", env = "COURIER_WIDGET_PUBLIC_KEY")]
    pub public_key: Option<String>,

    /// Widget private key (access token), required when the account enforces it
    #[arg(long = "widget-private-key", env = "COURIER_WIDGET_PRIVATE_KEY")]
    pub private_key: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the mail backend health check
    #[arg(long = "health-timeout-ms", env = "COURIER_HEALTH_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for traces, metrics and logs (disabled when unset)
    #[arg(long, env = "COURIER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// Names the unset settings the selected mail backend needs, never their values.
    #[must_use]
    pub fn missing_mail_settings(&self) -> Vec<&'static str> {
        fn unset(value: Option<&str>) -> bool {
            value.is_none_or(|v| v.trim().is_empty())
        }

        let mut required = vec![
            ("COURIER_MAIL_FROM", self.mail.from_address.as_deref()),
            ("COURIER_MAIL_TO", self.mail.to_address.as_deref()),
        ];
        match self.mail.backend {
            MailBackendKind::Smtp => {
                required.push(("COURIER_SMTP_HOST", self.smtp.host.as_deref()));
                if self.smtp.tls != SmtpTls::None {
                    required.push(("COURIER_SMTP_USERNAME", self.smtp.username.as_deref()));
                    required.push(("COURIER_SMTP_PASSWORD", self.smtp.password.as_deref()));
                }
            }
            MailBackendKind::Api => required.push(("COURIER_API_KEY", self.api.api_key.as_deref())),
            MailBackendKind::Widget => {
                required.push(("COURIER_WIDGET_SERVICE_ID", self.widget.service_id.as_deref()));
                required.push(("COURIER_WIDGET_TEMPLATE_ID", self.widget.template_id.as_deref()));
                required.push(("COURIER_WIDGET_PUBLIC_KEY", self.widget.public_key.as_deref()));
            }
        }

        required.into_iter().filter(|(_, value)| unset(*value)).map(|(name, _)| name).collect()
    }
}
