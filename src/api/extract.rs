use crate::api::AppState;
use crate::config::FormConfig;
use crate::domain::attachment::Attachment;
use crate::domain::submission::SubmissionRequest;
use crate::error::{AppError, Result};
use crate::services::validator::AttachmentPolicy;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use bytes::BytesMut;
use serde_json::{Map, Value};

/// A submission decoded from any of the accepted body encodings.
///
/// Multipart uploads are checked against the attachment policy while they stream, so an
/// oversized or unexpected file is rejected before it is fully buffered.
#[derive(Debug)]
pub struct SubmissionPayload(pub SubmissionRequest);

impl FromRequest<AppState> for SubmissionPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let form = &state.config.form;

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            let request = read_multipart(multipart, form, state.submission_service.attachment_policy()).await?;
            Ok(Self(request))
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(SubmissionRequest::from_json(body, &form.location_field)))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let mut request = SubmissionRequest::default();
            for (key, value) in pairs {
                request.insert_text(key, value, &form.location_field);
            }
            Ok(Self(request))
        } else if content_type.is_empty() {
            // No body at all; validation reports every required field as missing.
            Ok(Self(SubmissionRequest::default()))
        } else {
            Err(AppError::BadRequest(format!("Unsupported content type `{content_type}`")))
        }
    }
}

async fn read_multipart(mut multipart: Multipart, form: &FormConfig, policy: AttachmentPolicy) -> Result<SubmissionRequest> {
    let mut request = SubmissionRequest::default();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.body_text()))? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name != form.attachment_field {
            if let Some(file_name) = field.file_name() {
                return Err(AppError::BadRequest(format!("Unexpected file `{file_name}` in field `{name}`")));
            }
            let value = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            request.insert_text(name, value, &form.location_field);
            continue;
        }

        policy.check_count(request.attachments.len() + 1)?;
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        policy.check_type(&content_type)?;
        let filename = field.file_name().unwrap_or(name.as_str()).to_string();

        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| AppError::BadRequest(e.body_text()))? {
            policy.check_size(&filename, content.len() + chunk.len())?;
            content.extend_from_slice(&chunk);
        }

        tracing::debug!(filename = %filename, content_type = %content_type, size = content.len(), "Received attachment");
        request.attachments.push(Attachment::new(filename, content_type, content.freeze()));
    }

    Ok(request)
}
