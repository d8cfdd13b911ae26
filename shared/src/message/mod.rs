//! Dispatch socket protocol
//!
//! JSON text frames exchanged on `/api/dispatch/ws`. Delivery is
//! at-most-once with no backfill: a client that reconnects must re-fetch
//! order state instead of expecting missed events to be replayed.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::order::{DeliveryAddress, GeoLocation, OrderStatus};

/// Events published by the dispatch engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DispatchEvent {
    /// Sent only to the newly assigned rider
    Assignment {
        order_id: String,
        order_number: u64,
        rider_id: String,
        customer_name: String,
        address: DeliveryAddress,
        location: GeoLocation,
    },
    /// Broadcast to every connected session
    StatusChanged {
        order_id: String,
        order_number: u64,
        status: OrderStatus,
    },
}

impl DispatchEvent {
    pub fn order_id(&self) -> &str {
        match self {
            DispatchEvent::Assignment { order_id, .. } => order_id,
            DispatchEvent::StatusChanged { order_id, .. } => order_id,
        }
    }
}

/// Client → server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection to a rider identity (latest registration wins)
    RegisterRider { rider_id: String },
}

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once after the upgrade
    Ready { connection_id: u64 },
    /// Acknowledges `register-rider`
    Registered { rider_id: String },
    Event { event: DispatchEvent },
    Error { code: ErrorCode, message: String },
}
