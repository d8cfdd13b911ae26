//! JWT Extractor
//!
//! Resolves the caller from `Authorization: Bearer <token>`.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::AppError;

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved earlier in this request
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match auth_header {
            Some(header) => JwtService::extract_from_header(header)
                .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
            None => {
                security_log!("WARN", "auth_missing", uri = format!("{:?}", parts.uri));
                return Err(AppError::not_authenticated());
            }
        };

        let user = resolve(state.jwt_service(), token, &parts.uri)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Resolve a raw token, logging failures
pub fn resolve(jwt: &JwtService, token: &str, uri: &http::Uri) -> Result<CurrentUser, AppError> {
    jwt.resolve_caller(token).map_err(|e| {
        security_log!(
            "WARN",
            "auth_failed",
            error = format!("{}", e),
            uri = format!("{:?}", uri)
        );
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })
}
