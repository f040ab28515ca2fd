#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::delivery::MailBackend;
use crate::services::health_service::HealthService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::submission_service::SubmissionService;
use std::sync::Arc;
use tokio::sync::watch;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

/// Wires the mail backend and services together.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    mail_backend: Option<Arc<dyn MailBackend>>,
}

/// The wired application, ready to be turned into a router.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, mail_backend: None }
    }

    /// Uses the given backend instead of the one selected by configuration.
    #[must_use]
    pub fn with_mail_backend(mut self, backend: Arc<dyn MailBackend>) -> Self {
        self.mail_backend = Some(backend);
        self
    }

    /// # Errors
    /// Returns an error if the configured mail backend cannot be constructed.
    pub fn build(self) -> anyhow::Result<App> {
        let backend = match self.mail_backend {
            Some(backend) => backend,
            None => adapters::mail::build_backend(&self.config)?,
        };
        tracing::info!(backend = backend.kind().as_str(), "Mail backend ready");

        let submission_service = SubmissionService::new(Arc::clone(&backend), &self.config.form, self.config.mail.clone());
        let health_service = HealthService::new(backend, self.config.health.clone());
        let rate_limit_service = RateLimitService::new(self.config.server.trusted_proxies.clone());

        Ok(App {
            services: ServiceContainer {
                submission_service,
                health_service: health_service.clone(),
                rate_limit_service,
            },
            health_service,
        })
    }
}

/// Routes panics through tracing so they reach the configured log output.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.payload = %payload, "Panic occurred");
    }));
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Flips `shutdown_tx` once a shutdown signal arrives.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
