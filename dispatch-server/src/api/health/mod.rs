//! Health route
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /health | GET | none |

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::ApiResponse;

/// Public routes (no authentication)
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    environment: String,
    /// Stored order count; `None` when the store could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    orders: Option<u64>,
    online_riders: usize,
}

async fn health(State(state): State<ServerState>) -> ApiResponse<HealthResponse> {
    let orders = match state.manager().storage().count() {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read order store");
            None
        }
    };

    ApiResponse::success(HealthResponse {
        status: if orders.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config().environment.clone(),
        orders,
        online_riders: state.hub().online_riders().len(),
    })
}
