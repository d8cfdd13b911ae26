//! Order status sequence and caller roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status
///
/// Variants are declared in forward order; the derived `Ord` is the
/// sequence order, so `a < b` means `a` comes before `b`.
///
/// Legacy display names ("Food Processing", "Out for Delivery", ...) are
/// accepted on input.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub enum OrderStatus {
    #[default]
    #[serde(alias = "Pending Payment")]
    PendingPayment,
    #[serde(alias = "Food Processing")]
    Processing,
    #[serde(alias = "Rider Assigned")]
    RiderAssigned,
    #[serde(alias = "Picked Up")]
    PickedUp,
    #[serde(alias = "Out for Delivery")]
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    /// All statuses in forward order
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::PendingPayment,
        OrderStatus::Processing,
        OrderStatus::RiderAssigned,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    /// Whether an assigned rider must exist before entering this status
    pub fn requires_rider(self) -> bool {
        self >= OrderStatus::RiderAssigned
    }

    /// Statuses a rider may move their own order into
    pub const fn is_rider_stage(self) -> bool {
        matches!(
            self,
            OrderStatus::PickedUp | OrderStatus::OutForDelivery | OrderStatus::Delivered
        )
    }

    /// Canonical name (matches the serialized form)
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PendingPayment",
            OrderStatus::Processing => "Processing",
            OrderStatus::RiderAssigned => "RiderAssigned",
            OrderStatus::PickedUp => "PickedUp",
            OrderStatus::OutForDelivery => "OutForDelivery",
            OrderStatus::Delivered => "Delivered",
        }
    }

    /// Human-facing label used by the customer tracking page
    pub const fn label(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "Pending Payment",
            OrderStatus::Processing => "Food Processing",
            OrderStatus::RiderAssigned => "Rider Assigned",
            OrderStatus::PickedUp => "Picked Up",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == trimmed || st.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Caller role as resolved from the auth token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
    Rider,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::Rider => "rider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "rider" => Ok(Role::Rider),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_order() {
        for pair in OrderStatus::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_rider_requirements() {
        assert!(!OrderStatus::Processing.requires_rider());
        assert!(OrderStatus::RiderAssigned.requires_rider());
        assert!(!OrderStatus::RiderAssigned.is_rider_stage());
        assert!(OrderStatus::PickedUp.is_rider_stage());
        assert!(OrderStatus::Delivered.is_rider_stage());
    }

    #[test]
    fn test_serde_accepts_legacy_labels() {
        let st: OrderStatus = serde_json::from_str("\"Out for Delivery\"").unwrap();
        assert_eq!(st, OrderStatus::OutForDelivery);
        let st: OrderStatus = serde_json::from_str("\"PickedUp\"").unwrap();
        assert_eq!(st, OrderStatus::PickedUp);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"Processing\""
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Delivered".parse::<OrderStatus>(), Ok(OrderStatus::Delivered));
        assert_eq!("food processing".parse::<OrderStatus>(), Ok(OrderStatus::Processing));
        assert!("Cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("rider".parse::<Role>(), Ok(Role::Rider));
        assert_eq!("user".parse::<Role>(), Ok(Role::Customer));
        assert!("chef".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
