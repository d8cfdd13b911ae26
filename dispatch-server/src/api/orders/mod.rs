//! Order API Module
//!
//! Thin HTTP bindings over [`DispatchManager`](crate::orders::DispatchManager);
//! every role and ownership decision is made there.

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list_all))
        .route("/place", post(handler::place))
        .route("/verify", post(handler::verify_payment))
        .route("/mine", get(handler::list_mine))
        .route("/customer/{customer_id}", get(handler::list_for_customer))
        .route("/{id}", get(handler::get_by_id).delete(handler::delete))
        .route("/{id}/assign", post(handler::assign_rider))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/delivery", post(handler::complete_delivery))
}
