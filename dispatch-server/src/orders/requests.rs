//! Request / response payloads of the dispatch façade

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::{DeliveryAddress, GeoLocation, OrderItem, OrderStatus};
use validator::{Validate, ValidationError};

/// Line item as submitted at checkout (name and price snapshotted as sent)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderItem {
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

impl From<PlaceOrderItem> for OrderItem {
    fn from(item: PlaceOrderItem) -> Self {
        OrderItem {
            product_id: item.product_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,
    #[serde(default)]
    pub barangay: Option<String>,
    #[serde(default)]
    pub purok: Option<String>,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zipcode: String,
}

impl From<AddressInput> for DeliveryAddress {
    fn from(a: AddressInput) -> Self {
        DeliveryAddress {
            first_name: a.first_name,
            last_name: a.last_name,
            email: a.email,
            phone: a.phone,
            street: a.street,
            barangay: a.barangay,
            purok: a.purok,
            city: a.city,
            state: a.state,
            country: a.country,
            zipcode: a.zipcode,
        }
    }
}

/// `POST /api/orders/place`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"), nested)]
    pub items: Vec<PlaceOrderItem>,
    #[validate(nested)]
    pub address: AddressInput,
    #[serde(default)]
    pub location: GeoLocation,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub delivery_fee: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub discount: Decimal,
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub order_number: u64,
    pub amount: Decimal,
    /// `None` when no payment collaborator is configured or it failed
    pub session_url: Option<String>,
}

/// Out-of-band payment signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

impl From<bool> for PaymentOutcome {
    fn from(success: bool) -> Self {
        if success {
            PaymentOutcome::Success
        } else {
            PaymentOutcome::Failure
        }
    }
}

/// `POST /api/orders/verify` (the redirect path)
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub success: bool,
}

/// `POST /api/orders/{id}/assign`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRiderRequest {
    #[validate(length(min = 1, message = "rider_id is required"))]
    pub rider_id: String,
}

/// `PUT /api/orders/{id}/status`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// `PUT /api/riders/{id}` and `PUT /api/riders/me`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RiderProfileInput {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    /// Ignored on `/me`
    #[serde(default)]
    pub active: Option<bool>,
}
