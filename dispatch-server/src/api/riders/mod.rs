//! Rider API Module
//!
//! | Path | Method | Caller |
//! |------|--------|--------|
//! | /api/riders | GET | admin |
//! | /api/riders/{id} | PUT | admin |
//! | /api/riders/{id}/orders | GET | admin |
//! | /api/riders/me | GET, PUT | rider |
//! | /api/riders/me/orders | GET | rider |

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/riders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/me", get(handler::me).put(handler::update_me))
        .route("/me/orders", get(handler::my_orders))
        .route("/{id}", put(handler::upsert))
        .route("/{id}/orders", get(handler::orders_for_rider))
}
