//! Caller resolution
//!
//! - [`JwtService`] - token validation (`resolve_caller`)
//! - [`CurrentUser`] - caller identity and role, also an axum extractor

pub mod extractor;
pub mod jwt;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
