//! Assignment coordinator
//!
//! Binds a rider to an order. The rider's name and phone are copied onto the
//! order at assignment time and never refreshed afterwards.

use shared::message::DispatchEvent;
use shared::order::{Order, OrderStatus, RiderAssignment, RiderProfile, Role};
use std::sync::Arc;
use thiserror::Error;

use super::manager::{DispatchError, DispatchResult};
use super::storage::{OrderStorage, UpdateOutcome};
use crate::auth::CurrentUser;
use crate::live::DispatchHub;
use crate::riders::RiderDirectory;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error("Only admins can assign riders")]
    AdminRequired,

    #[error("Rider not found: {0}")]
    RiderNotFound(String),

    #[error("Order {0} is already delivered")]
    AlreadyDelivered(String),
}

/// Compute the assigned record
///
/// Status advances to `RiderAssigned` only from an earlier status; an order
/// further along keeps its status and timeline, only the snapshot changes.
pub fn apply_assignment(
    order: &Order,
    rider: &RiderProfile,
    now: i64,
) -> Result<Order, AssignmentError> {
    if order.status == OrderStatus::Delivered {
        return Err(AssignmentError::AlreadyDelivered(order.order_id.clone()));
    }

    let mut next = order.clone();
    next.rider = Some(RiderAssignment {
        rider_id: rider.rider_id.clone(),
        name: rider.name.clone(),
        phone: rider.phone.clone(),
        assigned_at: now,
    });
    if next.status < OrderStatus::RiderAssigned {
        next.status = OrderStatus::RiderAssigned;
        next.timeline.stamp(OrderStatus::RiderAssigned, now);
    }
    next.updated_at = now;
    Ok(next)
}

/// Runs the assignment protocol against the store and the hub
#[derive(Clone)]
pub struct AssignmentCoordinator {
    storage: OrderStorage,
    directory: Arc<dyn RiderDirectory>,
    hub: DispatchHub,
}

impl std::fmt::Debug for AssignmentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentCoordinator")
            .field("storage", &self.storage)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl AssignmentCoordinator {
    pub fn new(storage: OrderStorage, directory: Arc<dyn RiderDirectory>, hub: DispatchHub) -> Self {
        Self {
            storage,
            directory,
            hub,
        }
    }

    /// Assign `rider_id` to `order_id`
    ///
    /// The assignment event goes to the new rider only. When the order moved
    /// into `RiderAssigned` a status change is broadcast as well.
    pub async fn assign(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        rider_id: &str,
    ) -> DispatchResult<Order> {
        if caller.role != Role::Admin {
            crate::security_log!(
                "WARN",
                "assign_forbidden",
                user_id = caller.id.as_str(),
                order_id = order_id
            );
            return Err(AssignmentError::AdminRequired.into());
        }

        let rider = self
            .directory
            .lookup_rider(rider_id)
            .await?
            .ok_or_else(|| AssignmentError::RiderNotFound(rider_id.to_string()))?;

        let now = shared::now_millis();
        let outcome = self.storage.update_guarded(order_id, |current| {
            apply_assignment(current, &rider, now)
                .map(Some)
                .map_err(DispatchError::from)
        })?;

        let (previous, order) = match outcome {
            UpdateOutcome::Updated { previous, current } => (previous, current),
            UpdateOutcome::Unchanged(order) => (order.clone(), order),
        };

        tracing::info!(
            order_id = %order.order_id,
            order_number = order.order_number,
            rider_id = %rider.rider_id,
            previous_rider = ?previous.rider_id(),
            status = %order.status,
            "Rider assigned"
        );

        let delivered = self.hub.publish_assignment(
            &rider.rider_id,
            DispatchEvent::Assignment {
                order_id: order.order_id.clone(),
                order_number: order.order_number,
                rider_id: rider.rider_id.clone(),
                customer_name: order.customer_name(),
                address: order.address.clone(),
                location: order.location.clone(),
            },
        );
        if !delivered {
            tracing::debug!(rider_id = %rider.rider_id, "Rider offline, assignment event dropped");
        }

        if previous.status != order.status {
            self.hub.publish_status_changed(DispatchEvent::StatusChanged {
                order_id: order.order_id.clone(),
                order_number: order.order_number,
                status: order.status,
            });
        }

        Ok(order)
    }
}
