//! Bank Alfalah payment gateway integration
//!
//! Initiates hosted-checkout payments, receives the gateway's webhook and
//! browser return, and keeps the last known state of each transaction in a
//! [`ledger::TransactionLedger`].

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod ledger;
pub mod logging;
pub mod middleware;
pub mod payments;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::warn;

use crate::api::alfalah::{routes, AlfalahState};
use crate::config::ServerConfig;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};

/// Full application router with request-id and access-log layers.
pub fn build_app(state: AlfalahState) -> Router {
    routes(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

/// CORS policy from `CORS_ALLOWED_ORIGINS`. `*` (the default) allows any origin.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<http::HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
