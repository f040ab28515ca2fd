use crate::services::rate_limit_service::RateLimitService;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Records the governor's verdict for each submission after it has been applied.
pub async fn log_rate_limit_events(
    State(service): State<RateLimitService>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    let retry_after = response.headers().get("x-ratelimit-after").and_then(|v| v.to_str().ok());
    service.log_decision(response.status(), retry_after);

    response
}
