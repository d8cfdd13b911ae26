//! Order state machine
//!
//! Pure transition logic: no I/O, no clock. The caller supplies `now`, and
//! the store is written only when [`transition`] returns
//! [`Transition::Applied`].
//!
//! ```text
//! PendingPayment → Processing → RiderAssigned → PickedUp → OutForDelivery → Delivered
//!                                               └──────── rider stages ────────┘
//! ```
//!
//! Rules are checked in a fixed order so the same request always yields
//! the same rejection:
//!
//! 1. customers never move orders
//! 2. a rider must be the assigned rider
//! 3. `Delivered` needs evidence, even when repeated
//! 4. same status again is a no-op (no re-stamp)
//! 5. no backward moves
//! 6. statuses from `RiderAssigned` on need an assignment
//! 7. riders only target the delivery stages (skipping ahead is allowed)

use shared::order::{Order, OrderStatus, Role};
use thiserror::Error;

use crate::auth::CurrentUser;

/// State machine rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{0} callers cannot change order status")]
    Forbidden(Role),

    #[error("Order {0} is not assigned to this rider")]
    NotAssignedRider(String),

    #[error("Delivered requires delivery proof")]
    EvidenceRequired,

    #[error("Cannot move order from {from} back to {to}")]
    Backward { from: OrderStatus, to: OrderStatus },

    #[error("{0} requires an assigned rider")]
    RiderNotAssigned(OrderStatus),

    #[error("Riders cannot move orders to {0}")]
    RiderStageOnly(OrderStatus),
}

/// Accepted transition
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// New record to persist
    Applied(Order),
    /// Already in the requested status; nothing to write
    Unchanged,
}

/// Normalize evidence: blank strings count as missing
fn evidence_ref(evidence: Option<&str>) -> Option<&str> {
    evidence.map(str::trim).filter(|e| !e.is_empty())
}

/// Run every rule without building the new record
///
/// Returns `Ok(false)` for an idempotent repeat, `Ok(true)` when the
/// transition would change the order.
pub fn check(
    order: &Order,
    target: OrderStatus,
    evidence: Option<&str>,
    caller: &CurrentUser,
) -> Result<bool, TransitionError> {
    match caller.role {
        Role::Customer => return Err(TransitionError::Forbidden(Role::Customer)),
        Role::Rider if !order.is_assigned_to(&caller.id) => {
            return Err(TransitionError::NotAssignedRider(order.order_id.clone()));
        }
        Role::Rider | Role::Admin => {}
    }

    if target == OrderStatus::Delivered && evidence_ref(evidence).is_none() {
        return Err(TransitionError::EvidenceRequired);
    }

    if target == order.status {
        return Ok(false);
    }

    if target < order.status {
        return Err(TransitionError::Backward {
            from: order.status,
            to: target,
        });
    }

    if target.requires_rider() && order.rider.is_none() {
        return Err(TransitionError::RiderNotAssigned(target));
    }

    if caller.role == Role::Rider && !target.is_rider_stage() {
        return Err(TransitionError::RiderStageOnly(target));
    }

    Ok(true)
}

/// Compute the next record for `target`
pub fn transition(
    order: &Order,
    target: OrderStatus,
    evidence: Option<&str>,
    caller: &CurrentUser,
    now: i64,
) -> Result<Transition, TransitionError> {
    if !check(order, target, evidence, caller)? {
        return Ok(Transition::Unchanged);
    }

    let mut next = order.clone();
    next.status = target;
    next.timeline.stamp(target, now);
    if target == OrderStatus::Delivered {
        next.delivery_proof = evidence_ref(evidence).map(str::to_string);
    }
    next.updated_at = now;

    Ok(Transition::Applied(next))
}
