//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::RiderNotFound
            | Self::ProofNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (state machine rejections and guard failures)
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::OrderAlreadyDelivered
            | Self::OrderNotPending
            | Self::InvalidTransition
            | Self::BackwardTransition
            | Self::RiderNotAssigned
            | Self::EvidenceRequired
            | Self::EvidenceInvalid
            | Self::RiderStageOnly
            | Self::ConcurrentModification => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied
            | Self::RoleRequired
            | Self::AdminRequired
            | Self::NotAssignedRider
            | Self::NotOrderOwner => StatusCode::FORBIDDEN,

            // 413 Payload Too Large
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // 503 Service Unavailable (collaborator down, client can retry)
            Self::PaymentUnavailable
            | Self::ProofStorageUnavailable
            | Self::NetworkError
            | Self::TimeoutError
            | Self::SystemBusy => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::StorageFull
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
