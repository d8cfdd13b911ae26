//! Order lifecycle
//!
//! - **storage**: redb-backed order records with a revision guard
//! - **machine**: pure status transition rules
//! - **assignment**: rider assignment (admin only, snapshot copy)
//! - **manager**: the [`DispatchManager`] façade used by the HTTP layer
//!
//! ```text
//! HTTP handler → DispatchManager → machine / assignment (pure)
//!                      │                  ↓
//!                      │         OrderStorage::update_guarded (redb)
//!                      ↓
//!                DispatchHub → rider queue / broadcast
//! ```

pub mod assignment;
pub mod machine;
pub mod manager;
pub mod requests;
pub mod storage;

pub use assignment::{AssignmentCoordinator, AssignmentError};
pub use machine::{Transition, TransitionError};
pub use manager::{DispatchError, DispatchManager, DispatchResult};
pub use requests::{
    AddressInput, AssignRiderRequest, PaymentOutcome, PlaceOrderItem, PlaceOrderRequest,
    PlaceOrderResponse, RiderProfileInput, UpdateStatusRequest, VerifyPaymentRequest,
};
pub use storage::{OrderStorage, StorageError, StorageResult};
