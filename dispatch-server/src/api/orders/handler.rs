//! Order API Handlers

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use shared::order::Order;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::orders::{
    AssignRiderRequest, DispatchError, PlaceOrderRequest, PlaceOrderResponse, UpdateStatusRequest,
    VerifyPaymentRequest,
};
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode};

/// Multipart field names accepted for the delivery photo
const PROOF_FIELDS: &[&str] = &["deliveryProof", "file"];

/// Place an order (customer)
pub async fn place(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<ApiResponse<PlaceOrderResponse>> {
    let placed = state.manager().place(&user, payload).await?;
    Ok(ApiResponse::success_with_message("Order placed", placed))
}

/// Client-side payment confirmation after the checkout redirect
///
/// `data` is the updated order on success, absent when the order was
/// removed after a failed payment.
pub async fn verify_payment(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<ApiResponse<Option<Order>>> {
    let outcome = payload.success.into();
    let order = state
        .manager()
        .confirm_payment(&user, &payload.order_id, outcome)
        .await?;
    let message = match &order {
        Some(order) if order.payment => "Paid",
        Some(_) => "Awaiting payment confirmation",
        None => "Not Paid",
    };
    Ok(ApiResponse::success_with_message(message, order))
}

pub async fn list_all(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.manager().list_for_admin(&user).await?;
    Ok(ApiResponse::success(orders))
}

pub async fn list_mine(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.manager().list_for_customer(&user, &user.id).await?;
    Ok(ApiResponse::success(orders))
}

pub async fn list_for_customer(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(customer_id): Path<String>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    let orders = state.manager().list_for_customer(&user, &customer_id).await?;
    Ok(ApiResponse::success(orders))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.manager().get(&user, &id).await?;
    Ok(ApiResponse::success(order))
}

pub async fn assign_rider(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AssignRiderRequest>,
) -> AppResult<ApiResponse<Order>> {
    payload.validate().map_err(DispatchError::from)?;
    let order = state.manager().assign_rider(&user, &id, &payload.rider_id).await?;
    Ok(ApiResponse::success_with_message("Rider assigned", order))
}

pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .manager()
        .update_status(&user, &id, payload.status, payload.evidence.as_deref())
        .await?;
    Ok(ApiResponse::success_with_message("Status updated", order))
}

/// Upload the delivery photo and mark the order `Delivered`
pub async fn complete_delivery(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<Order>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !PROOF_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let filename = field.file_name().unwrap_or("proof.jpg").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_request(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| AppError::new(ErrorCode::NoFileProvided))?;

    tracing::info!(
        order_id = %id,
        caller_id = %user.id,
        filename = %filename,
        size = bytes.len(),
        "Delivery proof received"
    );

    let order = state
        .manager()
        .complete_delivery(&user, &id, bytes, &filename)
        .await?;
    Ok(ApiResponse::success_with_message("Order delivered", order))
}

pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.manager().delete_order(&user, &id).await?;
    Ok(ApiResponse::ok_with_message("Order deleted"))
}
