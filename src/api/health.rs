use crate::api::AppState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Liveness: answers as long as the process is serving.
pub async fn root(State(state): State<AppState>) -> String {
    format!("courier-server is running ({} backend)", state.health_service.backend_kind().as_str())
}

/// Runs the mail backend check and reports the result; 503 when the backend is unusable.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.health_service.check_mail().await;
    let time = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    let backend = state.health_service.backend_kind().as_str().to_string();

    match result {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { ok: true, time, backend, error: None })),
        Err(e) => {
            tracing::warn!(error = %e, backend = %backend, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { ok: false, time, backend, error: Some(e) }))
        }
    }
}
