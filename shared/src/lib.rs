//! Shared types for the dispatch engine
//!
//! Domain records, the WebSocket event protocol and the unified error
//! system used by the dispatch server and its clients (admin console,
//! rider app, customer tracking page).

pub mod error;
pub mod message;
pub mod order;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use message::{ClientMessage, DispatchEvent, ServerMessage};
pub use order::{Order, OrderStatus, Role};
pub use util::now_millis;
