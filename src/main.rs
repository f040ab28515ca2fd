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

use courier_server::config::Config;
use courier_server::{AppBuilder, telemetry};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    courier_server::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server", backend = config.mail.backend.as_str());
    let (listener, app_router, shutdown_rx) = async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        courier_server::spawn_signal_handler(shutdown_tx);

        let missing = config.missing_mail_settings();
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "Mail settings incomplete; submissions will fail until they are set");
        }

        let app = AppBuilder::new(config.clone()).build()?;

        if config.mail.verify_on_startup {
            let health_service = app.health_service.clone();
            tokio::spawn(
                async move {
                    match health_service.check_mail().await {
                        Ok(()) => tracing::info!("Mail backend verified"),
                        Err(e) => tracing::warn!(error = %e, "Mail backend verification failed"),
                    }
                }
                .instrument(tracing::info_span!("startup_mail_check")),
            );
        }

        let app_router = courier_server::api::app_router(config.clone(), app.services)?;

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "listening");

        Ok::<(tokio::net::TcpListener, axum::Router, watch::Receiver<bool>), anyhow::Error>((
            listener,
            app_router,
            shutdown_rx,
        ))
    }
    .instrument(boot_span)
    .await?;

    let mut serve_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = serve_rx.wait_for(|&s| s).await;
        });

    let mut drain_rx = shutdown_rx;
    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let drain_deadline = async move {
        let _ = drain_rx.wait_for(|&s| s).await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        res = server.into_future() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Server error");
            }
        }
        () = drain_deadline => {
            tracing::warn!("Timeout waiting for in-flight requests to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
