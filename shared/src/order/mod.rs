//! Order domain types
//!
//! - [`OrderStatus`]: the fixed forward-only delivery sequence
//! - [`Order`]: the canonical record owned by the order store
//! - [`RiderProfile`]: directory entry snapshotted onto assignments

pub mod status;
pub mod types;

// Re-exports
pub use status::{OrderStatus, ParseStatusError, Role};
pub use types::*;
