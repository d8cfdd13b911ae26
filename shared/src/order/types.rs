//! Order record and its embedded value types

use super::status::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Line item snapshotted at placement time
///
/// Name and price are copied from the catalog so later catalog edits do
/// not change historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Delivery address
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purok: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zipcode: String,
}

impl DeliveryAddress {
    /// "First Last", trimmed
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Pinned delivery location
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Rider snapshot copied onto the order at assignment time
///
/// Not a live reference: later profile edits do not propagate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiderAssignment {
    pub rider_id: String,
    pub name: String,
    pub phone: String,
    pub assigned_at: i64,
}

/// Timestamp (millis) of each forward transition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusTimeline {
    pub placed_at: i64,
    #[serde(default)]
    pub processing_at: Option<i64>,
    #[serde(default)]
    pub rider_assigned_at: Option<i64>,
    #[serde(default)]
    pub picked_up_at: Option<i64>,
    #[serde(default)]
    pub out_for_delivery_at: Option<i64>,
    #[serde(default)]
    pub delivered_at: Option<i64>,
}

impl StatusTimeline {
    /// Timestamp recorded for entering `status`
    pub fn at(&self, status: OrderStatus) -> Option<i64> {
        match status {
            OrderStatus::PendingPayment => Some(self.placed_at),
            OrderStatus::Processing => self.processing_at,
            OrderStatus::RiderAssigned => self.rider_assigned_at,
            OrderStatus::PickedUp => self.picked_up_at,
            OrderStatus::OutForDelivery => self.out_for_delivery_at,
            OrderStatus::Delivered => self.delivered_at,
        }
    }

    /// Record entry into `status`
    ///
    /// `placed_at` is fixed at creation and never overwritten.
    pub fn stamp(&mut self, status: OrderStatus, now: i64) {
        match status {
            OrderStatus::PendingPayment => {}
            OrderStatus::Processing => self.processing_at = Some(now),
            OrderStatus::RiderAssigned => self.rider_assigned_at = Some(now),
            OrderStatus::PickedUp => self.picked_up_at = Some(now),
            OrderStatus::OutForDelivery => self.out_for_delivery_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
        }
    }
}

/// Order record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Durable identity (UUID v4)
    pub order_id: String,
    /// Human-facing sequence number, assigned once by the store
    pub order_number: u64,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    /// subtotal + delivery_fee - discount
    pub amount: Decimal,
    /// Input only, never recomputed here
    pub distance_km: f64,
    pub address: DeliveryAddress,
    pub location: GeoLocation,
    /// Payment-settled flag
    pub payment: bool,
    pub status: OrderStatus,
    #[serde(default)]
    pub rider: Option<RiderAssignment>,
    pub timeline: StatusTimeline,
    /// Set together with `timeline.delivered_at`
    #[serde(default)]
    pub delivery_proof: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Write guard; bumped on every committed update
    #[serde(default)]
    pub revision: u64,
}

impl Order {
    /// Rider id of the current assignment
    pub fn rider_id(&self) -> Option<&str> {
        self.rider.as_ref().map(|r| r.rider_id.as_str())
    }

    /// Whether `rider_id` is the currently assigned rider
    pub fn is_assigned_to(&self, rider_id: &str) -> bool {
        self.rider_id() == Some(rider_id)
    }

    pub fn customer_name(&self) -> String {
        self.address.display_name()
    }
}

/// Rider directory entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiderProfile {
    pub rider_id: String,
    pub name: String,
    pub phone: String,
    /// Inactive riders do not resolve for assignment
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub updated_at: i64,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            product_id: "p1".into(),
            name: "Adobo".into(),
            unit_price: Decimal::new(3550, 2),
            quantity: 2,
        };
        assert_eq!(item.line_total(), Decimal::new(7100, 2));
    }

    #[test]
    fn test_timeline_stamp_and_read() {
        let mut timeline = StatusTimeline {
            placed_at: 10,
            ..Default::default()
        };
        timeline.stamp(OrderStatus::PendingPayment, 99);
        timeline.stamp(OrderStatus::PickedUp, 20);

        assert_eq!(timeline.at(OrderStatus::PendingPayment), Some(10));
        assert_eq!(timeline.at(OrderStatus::PickedUp), Some(20));
        assert_eq!(timeline.at(OrderStatus::Delivered), None);
    }

    #[test]
    fn test_display_name_trims_missing_parts() {
        let address = DeliveryAddress {
            first_name: "Ana".into(),
            ..Default::default()
        };
        assert_eq!(address.display_name(), "Ana");
    }

    #[test]
    fn test_rider_profile_defaults_active() {
        let profile: RiderProfile =
            serde_json::from_str(r#"{"rider_id":"r1","name":"Ben","phone":"0917"}"#).unwrap();
        assert!(profile.active);
        assert_eq!(profile.updated_at, 0);
    }
}
