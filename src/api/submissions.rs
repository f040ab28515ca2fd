use crate::api::AppState;
use crate::api::extract::SubmissionPayload;
use crate::api::schemas::submission::SendEmailResponse;
use crate::error::Result;
use axum::{Json, extract::State};

/// Accepts a form submission and emails it through the configured backend.
///
/// # Errors
/// Returns a 400 `AppError` for invalid input and a 500 `AppError` when delivery is
/// misconfigured or the provider fails.
pub async fn send_email(
    State(state): State<AppState>,
    SubmissionPayload(request): SubmissionPayload,
) -> Result<Json<SendEmailResponse>> {
    state.submission_service.submit(request).await?;
    Ok(Json(SendEmailResponse::sent()))
}
