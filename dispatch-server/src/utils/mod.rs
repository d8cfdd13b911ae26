//! Utilities
//!
//! - [`AppError`] / [`ApiResponse`] - unified error envelope (from shared::error)
//! - [`logger`] - tracing setup

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
