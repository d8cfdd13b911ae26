use axum::{
    Json,
    extract::{Path, State},
};
use shared::order::{Order, RiderProfile};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::orders::RiderProfileInput;
use crate::utils::{ApiResponse, AppResult};

pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<RiderProfile>>> {
    let riders = state.manager().list_riders(&user).await?;
    Ok(ApiResponse::success(riders))
}

/// Create or replace a rider's display record
pub async fn upsert(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<RiderProfileInput>,
) -> AppResult<ApiResponse<RiderProfile>> {
    let profile = state.manager().upsert_rider(&user, &id, payload).await?;
    Ok(ApiResponse::success_with_message("Rider saved", profile))
}

pub async fn orders_for_rider(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.manager().list_for_rider(&user, &id).await?;
    Ok(ApiResponse::success(orders))
}

pub async fn me(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<RiderProfile>> {
    let profile = state.manager().rider_profile(&user).await?;
    Ok(ApiResponse::success(profile))
}

pub async fn update_me(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<RiderProfileInput>,
) -> AppResult<ApiResponse<RiderProfile>> {
    let profile = state.manager().update_own_profile(&user, payload).await?;
    Ok(ApiResponse::success_with_message("Profile updated", profile))
}

pub async fn my_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.manager().list_for_rider(&user, &user.id).await?;
    Ok(ApiResponse::success(orders))
}
