//! External collaborators of the dispatch engine
//!
//! - [`PaymentGateway`] - hosted checkout sessions and webhook verification
//! - [`ProofStorage`] - delivery proof images

pub mod payment;
pub mod proof_storage;

pub use payment::{
    CheckoutLine, CheckoutRequest, PaymentError, PaymentGateway, StripeGateway,
    parse_webhook_outcome, verify_webhook_signature,
};
pub use proof_storage::{LocalProofStorage, ProofError, ProofStorage};
