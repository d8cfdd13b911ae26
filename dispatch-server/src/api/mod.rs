//! API routes
//!
//! - [`health`] - liveness
//! - [`orders`] - placement, payment confirmation, lifecycle, delivery
//! - [`riders`] - rider display records and rider work lists
//! - [`payments`] - payment provider webhook
//! - [`proofs`] - delivery proof images
//! - [`ws`] - dispatch event stream

pub mod health;
pub mod orders;
pub mod payments;
pub mod proofs;
pub mod riders;
pub mod ws;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::core::ServerState;

/// Multipart framing headroom on top of the proof size limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// HTTP request log middleware
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    // Path only; the WS query string carries a token
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, path, status);

    response
}

/// Build the Axum router (without state)
pub fn routes() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(riders::router())
        .merge(payments::router())
        .merge(proofs::router())
        .merge(ws::router())
}

/// Full application with state and layers
pub fn build_app(state: ServerState) -> Router {
    let body_limit = state.config().max_proof_size + MULTIPART_OVERHEAD;

    routes()
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(log_request))
}
