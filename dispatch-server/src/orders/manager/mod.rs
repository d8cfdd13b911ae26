//! DispatchManager - the dispatch façade
//!
//! Every operation follows the same shape:
//!
//! ```text
//! operation(caller, ...)
//!     ├─ 1. Role / ownership check (no store access on rejection)
//!     ├─ 2. Collaborator calls that must precede the write (proof lookup)
//!     ├─ 3. OrderStorage::update_guarded (pure machine / assignment inside)
//!     ├─ 4. DispatchHub publish (at-most-once)
//!     └─ 5. Return the stored record
//! ```
//!
//! No lock is held across an `.await`; concurrent writers are serialized by
//! the revision guard in the store.

mod error;
pub use error::*;

use rust_decimal::Decimal;
use shared::message::DispatchEvent;
use shared::order::{Order, OrderItem, OrderStatus, RiderProfile, Role, StatusTimeline};
use shared::error::ErrorCode;
use std::sync::Arc;
use validator::Validate;

use super::assignment::AssignmentCoordinator;
use super::machine::{self, Transition};
use super::requests::{PaymentOutcome, PlaceOrderRequest, PlaceOrderResponse, RiderProfileInput};
use super::storage::{DeleteOutcome, OrderStorage, UpdateOutcome};
use crate::auth::CurrentUser;
use crate::live::DispatchHub;
use crate::riders::{RiderDirectory, RiderRegistry};
use crate::security_log;
use crate::services::{CheckoutLine, CheckoutRequest, PaymentGateway, ProofStorage};

/// Evidence stand-in used to pre-check a delivery before the upload is stored
const PENDING_UPLOAD: &str = "pending-upload";

pub struct DispatchManager {
    storage: OrderStorage,
    hub: DispatchHub,
    riders: RiderRegistry,
    proofs: Arc<dyn ProofStorage>,
    payment: Option<Arc<dyn PaymentGateway>>,
    coordinator: AssignmentCoordinator,
}

impl std::fmt::Debug for DispatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchManager")
            .field("storage", &self.storage)
            .field("hub", &self.hub)
            .field("payment", &self.payment.is_some())
            .finish_non_exhaustive()
    }
}

impl DispatchManager {
    /// Riders are resolved through `riders` unless [`Self::set_rider_directory`] is called
    pub fn new(
        storage: OrderStorage,
        hub: DispatchHub,
        riders: RiderRegistry,
        proofs: Arc<dyn ProofStorage>,
    ) -> Self {
        let directory: Arc<dyn RiderDirectory> = Arc::new(riders.clone());
        let coordinator = AssignmentCoordinator::new(storage.clone(), directory, hub.clone());
        Self {
            storage,
            hub,
            riders,
            proofs,
            payment: None,
            coordinator,
        }
    }

    /// Enable checkout sessions
    pub fn set_payment_gateway(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.payment = Some(gateway);
    }

    /// Resolve riders through an external directory
    pub fn set_rider_directory(&mut self, directory: Arc<dyn RiderDirectory>) {
        self.coordinator =
            AssignmentCoordinator::new(self.storage.clone(), directory, self.hub.clone());
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub fn hub(&self) -> &DispatchHub {
        &self.hub
    }

    pub fn proofs(&self) -> &Arc<dyn ProofStorage> {
        &self.proofs
    }

    // ========== Placement & payment ==========

    /// Create a `PendingPayment` order and request a checkout session
    ///
    /// A checkout failure never rolls the order back; the response then
    /// carries no session URL.
    pub async fn place(
        &self,
        caller: &CurrentUser,
        request: PlaceOrderRequest,
    ) -> DispatchResult<PlaceOrderResponse> {
        if caller.role != Role::Customer {
            return Err(DispatchError::forbidden(
                ErrorCode::RoleRequired,
                "Only customers can place orders",
            ));
        }
        request.validate()?;

        let items: Vec<OrderItem> = request.items.into_iter().map(OrderItem::from).collect();
        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
        let amount = subtotal + request.delivery_fee - request.discount;
        if amount < Decimal::ZERO {
            return Err(DispatchError::Validation(
                ErrorCode::NegativeAmount,
                format!("Order amount cannot be negative: {amount}"),
            ));
        }

        let now = shared::now_millis();
        let order = Order {
            order_id: uuid::Uuid::new_v4().to_string(),
            order_number: 0,
            customer_id: caller.id.clone(),
            items,
            subtotal,
            delivery_fee: request.delivery_fee,
            discount: request.discount,
            amount,
            distance_km: request.distance_km,
            address: request.address.into(),
            location: request.location,
            payment: false,
            status: OrderStatus::PendingPayment,
            rider: None,
            timeline: StatusTimeline {
                placed_at: now,
                ..Default::default()
            },
            delivery_proof: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let order = self.storage.insert_new(order)?;

        tracing::info!(
            order_id = %order.order_id,
            order_number = order.order_number,
            customer_id = %order.customer_id,
            amount = %order.amount,
            "Order placed"
        );

        let session_url = match &self.payment {
            Some(gateway) => match gateway.create_checkout_session(&checkout_request(&order)).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order.order_id,
                        error = %e,
                        "Checkout session creation failed, returning order without session"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(PlaceOrderResponse {
            order_id: order.order_id,
            order_number: order.order_number,
            amount: order.amount,
            session_url,
        })
    }

    /// Payment outcome reported by the customer redirect (or an admin)
    ///
    /// Returns the updated order, or `None` when a failure removed it.
    /// With a payment gateway configured a customer's `Success` settles
    /// nothing: the order is returned as stored until the signed webhook
    /// arrives.
    pub async fn confirm_payment(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> DispatchResult<Option<Order>> {
        match caller.role {
            Role::Admin => {}
            Role::Customer => {
                let order = self.load(order_id)?;
                if order.customer_id != caller.id {
                    security_log!(
                        "WARN",
                        "payment_confirm_foreign_order",
                        user_id = caller.id.as_str(),
                        order_id = order_id
                    );
                    return Err(DispatchError::forbidden(
                        ErrorCode::NotOrderOwner,
                        "Order belongs to another customer",
                    ));
                }
                if outcome == PaymentOutcome::Success && self.payment.is_some() {
                    tracing::info!(
                        order_id = %order.order_id,
                        payment = order.payment,
                        "Customer reported payment success, awaiting provider webhook"
                    );
                    return Ok(Some(order));
                }
            }
            Role::Rider => {
                return Err(DispatchError::forbidden(
                    ErrorCode::RoleRequired,
                    "Riders cannot confirm payments",
                ));
            }
        }
        self.apply_payment_outcome(order_id, outcome)
    }

    /// Payment outcome from a verified provider webhook
    pub async fn confirm_payment_verified(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> DispatchResult<Option<Order>> {
        self.apply_payment_outcome(order_id, outcome)
    }

    fn apply_payment_outcome(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> DispatchResult<Option<Order>> {
        match outcome {
            PaymentOutcome::Success => {
                let now = shared::now_millis();
                let outcome = self.storage.update_guarded(order_id, |current| {
                    Ok::<_, DispatchError>(settle_payment(current, now))
                })?;

                if let UpdateOutcome::Updated { previous, current } = &outcome {
                    tracing::info!(
                        order_id = %current.order_id,
                        order_number = current.order_number,
                        "Payment settled"
                    );
                    if previous.status != current.status {
                        self.publish_status(current);
                    }
                }
                Ok(Some(outcome.into_current()))
            }
            PaymentOutcome::Failure => {
                let outcome = self.storage.delete_if(order_id, |order| {
                    order.status == OrderStatus::PendingPayment && !order.payment
                })?;
                match outcome {
                    DeleteOutcome::Deleted(order) => {
                        tracing::info!(
                            order_id = %order.order_id,
                            order_number = order.order_number,
                            "Payment failed, unpaid order removed"
                        );
                        Ok(None)
                    }
                    DeleteOutcome::Kept(order) => Err(DispatchError::InvalidTransition(
                        ErrorCode::OrderNotPending,
                        format!(
                            "Order {} is {} and can no longer be cancelled by a payment failure",
                            order.order_id, order.status
                        ),
                    )),
                    DeleteOutcome::NotFound => Err(DispatchError::order_not_found(order_id)),
                }
            }
        }
    }

    // ========== Reads ==========

    /// One order, visible to admins, its customer and its current rider
    pub async fn get(&self, caller: &CurrentUser, order_id: &str) -> DispatchResult<Order> {
        let order = self.load(order_id)?;
        let visible = match caller.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == caller.id,
            Role::Rider => order.is_assigned_to(&caller.id),
        };
        if !visible {
            return Err(DispatchError::forbidden(
                ErrorCode::PermissionDenied,
                "Order is not visible to this caller",
            ));
        }
        Ok(order)
    }

    pub async fn list_for_admin(&self, caller: &CurrentUser) -> DispatchResult<Vec<Order>> {
        require_admin(caller, "list_orders")?;
        Ok(self.storage.list_all()?)
    }

    /// Orders currently or formerly assigned to `rider_id`
    pub async fn list_for_rider(
        &self,
        caller: &CurrentUser,
        rider_id: &str,
    ) -> DispatchResult<Vec<Order>> {
        let allowed = caller.is_admin() || (caller.role == Role::Rider && caller.id == rider_id);
        if !allowed {
            return Err(DispatchError::forbidden(
                ErrorCode::PermissionDenied,
                "Riders can only list their own orders",
            ));
        }
        Ok(self.storage.list_for_rider(rider_id)?)
    }

    pub async fn list_for_customer(
        &self,
        caller: &CurrentUser,
        customer_id: &str,
    ) -> DispatchResult<Vec<Order>> {
        let allowed =
            caller.is_admin() || (caller.role == Role::Customer && caller.id == customer_id);
        if !allowed {
            return Err(DispatchError::forbidden(
                ErrorCode::PermissionDenied,
                "Customers can only list their own orders",
            ));
        }
        Ok(self.storage.list_for_customer(customer_id)?)
    }

    // ========== Dispatch ==========

    pub async fn assign_rider(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        rider_id: &str,
    ) -> DispatchResult<Order> {
        self.coordinator.assign(caller, order_id, rider_id).await
    }

    /// Move an order along the status sequence
    ///
    /// Delivery evidence is checked against proof storage before the write.
    /// Repeating the current status returns the stored record untouched.
    pub async fn update_status(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        target: OrderStatus,
        evidence: Option<&str>,
    ) -> DispatchResult<Order> {
        let current = self.load(order_id)?;
        if !machine::check(&current, target, evidence, caller)? {
            return Ok(current);
        }

        if target == OrderStatus::Delivered
            && let Some(reference) = evidence.map(str::trim).filter(|e| !e.is_empty())
            && !self.proofs.exists(reference).await?
        {
            return Err(DispatchError::InvalidTransition(
                ErrorCode::EvidenceInvalid,
                format!("Delivery proof '{reference}' does not exist"),
            ));
        }

        let now = shared::now_millis();
        let outcome = self
            .storage
            .update_guarded::<DispatchError, _>(order_id, |order| {
                match machine::transition(order, target, evidence, caller, now)? {
                    Transition::Applied(next) => Ok(Some(next)),
                    Transition::Unchanged => Ok(None),
                }
            })?;

        if let UpdateOutcome::Updated { previous, current } = &outcome {
            tracing::info!(
                order_id = %current.order_id,
                order_number = current.order_number,
                from = %previous.status,
                to = %current.status,
                caller_id = %caller.id,
                caller_role = %caller.role,
                "Order status changed"
            );
            self.publish_status(current);
        }
        Ok(outcome.into_current())
    }

    /// Store an uploaded proof and mark the order delivered
    ///
    /// The caller's right to deliver is checked before anything is stored,
    /// and a storage failure leaves the order untouched.
    pub async fn complete_delivery(
        &self,
        caller: &CurrentUser,
        order_id: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> DispatchResult<Order> {
        let current = self.load(order_id)?;
        if !machine::check(&current, OrderStatus::Delivered, Some(PENDING_UPLOAD), caller)? {
            return Ok(current);
        }

        let reference = self.proofs.store(bytes, filename).await.map_err(|e| {
            tracing::warn!(order_id = %order_id, error = %e, "Delivery proof rejected");
            DispatchError::from(e)
        })?;

        self.update_status(caller, order_id, OrderStatus::Delivered, Some(&reference))
            .await
    }

    /// Proof image bytes, for admins and riders
    pub async fn read_proof(&self, caller: &CurrentUser, reference: &str) -> DispatchResult<Vec<u8>> {
        if caller.role == Role::Customer {
            return Err(DispatchError::forbidden(
                ErrorCode::PermissionDenied,
                "Proofs are visible to staff only",
            ));
        }
        Ok(self.proofs.read(reference).await?)
    }

    /// Hard delete, no status guard
    pub async fn delete_order(&self, caller: &CurrentUser, order_id: &str) -> DispatchResult<()> {
        require_admin(caller, "delete_order")?;
        if !self.storage.delete(order_id)? {
            return Err(DispatchError::order_not_found(order_id));
        }
        tracing::warn!(order_id = %order_id, admin_id = %caller.id, "Order deleted by admin");
        Ok(())
    }

    // ========== Riders ==========

    pub async fn list_riders(&self, caller: &CurrentUser) -> DispatchResult<Vec<RiderProfile>> {
        require_admin(caller, "list_riders")?;
        Ok(self.riders.list()?)
    }

    /// Create or replace a rider record
    pub async fn upsert_rider(
        &self,
        caller: &CurrentUser,
        rider_id: &str,
        input: RiderProfileInput,
    ) -> DispatchResult<RiderProfile> {
        require_admin(caller, "upsert_rider")?;
        input.validate()?;

        let active = match input.active {
            Some(active) => active,
            None => self.riders.get(rider_id)?.map(|r| r.active).unwrap_or(true),
        };
        Ok(self.riders.upsert(RiderProfile {
            rider_id: rider_id.to_string(),
            name: input.name,
            phone: input.phone,
            active,
            updated_at: 0,
        })?)
    }

    pub async fn rider_profile(&self, caller: &CurrentUser) -> DispatchResult<RiderProfile> {
        require_rider(caller)?;
        self.riders
            .get(&caller.id)?
            .ok_or_else(|| rider_not_found(&caller.id))
    }

    /// A rider edits their own display fields (existing assignment snapshots keep the old values)
    pub async fn update_own_profile(
        &self,
        caller: &CurrentUser,
        input: RiderProfileInput,
    ) -> DispatchResult<RiderProfile> {
        require_rider(caller)?;
        input.validate()?;

        let mut profile = self
            .riders
            .get(&caller.id)?
            .ok_or_else(|| rider_not_found(&caller.id))?;
        profile.name = input.name;
        profile.phone = input.phone;
        Ok(self.riders.upsert(profile)?)
    }

    // ========== Helpers ==========

    fn load(&self, order_id: &str) -> DispatchResult<Order> {
        self.storage
            .get(order_id)?
            .ok_or_else(|| DispatchError::order_not_found(order_id))
    }

    fn publish_status(&self, order: &Order) {
        let reached = self.hub.publish_status_changed(DispatchEvent::StatusChanged {
            order_id: order.order_id.clone(),
            order_number: order.order_number,
            status: order.status,
        });
        tracing::debug!(order_id = %order.order_id, reached, "Status change published");
    }
}

/// Mark paid and move `PendingPayment → Processing`; `None` when already settled
fn settle_payment(order: &Order, now: i64) -> Option<Order> {
    if order.payment && order.status != OrderStatus::PendingPayment {
        return None;
    }
    let mut next = order.clone();
    next.payment = true;
    if next.status == OrderStatus::PendingPayment {
        next.status = OrderStatus::Processing;
        next.timeline.stamp(OrderStatus::Processing, now);
    }
    next.updated_at = now;
    Some(next)
}

fn checkout_request(order: &Order) -> CheckoutRequest {
    CheckoutRequest {
        order_id: order.order_id.clone(),
        order_number: order.order_number,
        lines: order
            .items
            .iter()
            .map(|item| CheckoutLine {
                name: item.name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
            })
            .collect(),
        delivery_fee: order.delivery_fee,
        discount: order.discount,
    }
}

fn require_admin(caller: &CurrentUser, operation: &str) -> DispatchResult<()> {
    if caller.is_admin() {
        return Ok(());
    }
    security_log!(
        "WARN",
        "admin_required",
        user_id = caller.id.as_str(),
        operation = operation
    );
    Err(DispatchError::forbidden(
        ErrorCode::AdminRequired,
        "Admin role required",
    ))
}

fn require_rider(caller: &CurrentUser) -> DispatchResult<()> {
    if caller.role == Role::Rider {
        return Ok(());
    }
    Err(DispatchError::forbidden(
        ErrorCode::RoleRequired,
        "Rider role required",
    ))
}

fn rider_not_found(rider_id: &str) -> DispatchError {
    DispatchError::NotFound(ErrorCode::RiderNotFound, format!("Rider not found: {rider_id}"))
}

#[cfg(test)]
mod tests;
