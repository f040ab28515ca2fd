use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Reuses a client-supplied `x-request-id` when it is usable, otherwise mints a UUID v4.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        let existing = request
            .headers()
            .get("x-request-id")
            .filter(|v| v.to_str().is_ok_and(|s| !s.trim().is_empty() && s.len() <= 128))
            .cloned();

        let value = match existing {
            Some(value) => value,
            None => HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?,
        };
        Some(RequestId::new(value))
    }
}
