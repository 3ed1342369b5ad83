//! Request-scoped logging
//!
//! Every request gets an `x-request-id` (generated here when the caller did
//! not send one) and one access-log line once the response is ready.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Instrument;
use uuid::Uuid;

/// Generates UUID v4 request ids for `SetRequestIdLayer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Wraps the request in a span carrying its id and logs method, path,
/// status and latency when it completes.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis();
    span.in_scope(|| {
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), latency_ms, "request failed");
        } else if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), latency_ms, "request rejected");
        } else {
            tracing::info!(status = status.as_u16(), latency_ms, "request completed");
        }
    });

    response
}
