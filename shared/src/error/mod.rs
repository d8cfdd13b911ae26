//! Unified error system for the dispatch engine
//!
//! - [`ErrorCode`]: stable numeric reasons for every rejection
//! - [`ErrorCategory`]: classification of codes by range
//! - [`AppError`]: code + message + optional details
//! - [`ApiResponse`]: the `{success, code, message, data, details}` envelope
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order lifecycle errors
//! - 5xxx: Payment errors
//! - 6xxx: Delivery proof errors
//! - 7xxx: Rider errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::EvidenceRequired)
//!     .with_detail("order_id", "3f1c");
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert!(!response.success);
//! assert_eq!(response.code, 4013);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
