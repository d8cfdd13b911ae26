//! Unified error codes for the dispatch engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order lifecycle errors
//! - 5xxx: Payment errors
//! - 6xxx: Delivery proof / file errors
//! - 7xxx: Rider errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a bare u16 so the rider app and the admin console can
/// switch on stable numeric reasons instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Rider is not the one assigned to this order
    NotAssignedRider = 2004,
    /// Customer does not own this order
    NotOrderOwner = 2005,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order has already been delivered
    OrderAlreadyDelivered = 4003,
    /// Order is no longer awaiting payment
    OrderNotPending = 4004,
    /// Order has no items
    OrderEmpty = 4007,
    /// Computed order amount is negative
    NegativeAmount = 4008,
    /// Generic state machine rejection
    InvalidTransition = 4010,
    /// Status may not move backward
    BackwardTransition = 4011,
    /// Status requires an assigned rider
    RiderNotAssigned = 4012,
    /// Delivered requires delivery evidence
    EvidenceRequired = 4013,
    /// Delivery evidence does not reference a stored proof
    EvidenceInvalid = 4014,
    /// Riders may only move an order through the delivery stages
    RiderStageOnly = 4015,
    /// Order was modified concurrently, re-fetch and retry
    ConcurrentModification = 4020,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Payment provider is not configured or unreachable
    PaymentUnavailable = 5006,
    /// Webhook signature verification failed
    WebhookSignatureInvalid = 5007,
    /// Webhook payload could not be interpreted
    WebhookPayloadInvalid = 5008,

    // ==================== 6xxx: Proof ====================
    /// Uploaded file exceeds the size limit
    FileTooLarge = 6001,
    /// File extension is not an accepted image format
    UnsupportedFileFormat = 6002,
    /// File content is not a decodable image
    InvalidImageFile = 6003,
    /// Multipart request has no file field
    NoFileProvided = 6004,
    /// Uploaded file is empty
    EmptyFile = 6005,
    /// Proof reference does not exist
    ProofNotFound = 6006,
    /// Proof storage failed or is unreachable
    ProofStorageUnavailable = 6007,

    // ==================== 7xxx: Rider ====================
    /// Rider not found (or not authorized as rider)
    RiderNotFound = 7001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "A different role is required",
            ErrorCode::AdminRequired => "Admin role required",
            ErrorCode::NotAssignedRider => "Order is not assigned to this rider",
            ErrorCode::NotOrderOwner => "Order belongs to another customer",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderAlreadyDelivered => "Order has already been delivered",
            ErrorCode::OrderNotPending => "Order is no longer awaiting payment",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::NegativeAmount => "Order amount cannot be negative",
            ErrorCode::InvalidTransition => "Invalid status transition",
            ErrorCode::BackwardTransition => "Order status cannot move backward",
            ErrorCode::RiderNotAssigned => "No rider is assigned to this order",
            ErrorCode::EvidenceRequired => "Delivery proof is required",
            ErrorCode::EvidenceInvalid => "Delivery proof reference is unknown",
            ErrorCode::RiderStageOnly => "Riders may only update delivery stages",
            ErrorCode::ConcurrentModification => "Order was modified concurrently",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentUnavailable => "Payment provider unavailable",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",
            ErrorCode::WebhookPayloadInvalid => "Webhook payload is invalid",

            // Proof
            ErrorCode::FileTooLarge => "File is too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::InvalidImageFile => "File is not a valid image",
            ErrorCode::NoFileProvided => "No file provided",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::ProofNotFound => "Delivery proof not found",
            ErrorCode::ProofStorageUnavailable => "Proof storage unavailable",

            // Rider
            ErrorCode::RiderNotFound => "Rider not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),
            2004 => Ok(ErrorCode::NotAssignedRider),
            2005 => Ok(ErrorCode::NotOrderOwner),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderAlreadyDelivered),
            4004 => Ok(ErrorCode::OrderNotPending),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::NegativeAmount),
            4010 => Ok(ErrorCode::InvalidTransition),
            4011 => Ok(ErrorCode::BackwardTransition),
            4012 => Ok(ErrorCode::RiderNotAssigned),
            4013 => Ok(ErrorCode::EvidenceRequired),
            4014 => Ok(ErrorCode::EvidenceInvalid),
            4015 => Ok(ErrorCode::RiderStageOnly),
            4020 => Ok(ErrorCode::ConcurrentModification),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5006 => Ok(ErrorCode::PaymentUnavailable),
            5007 => Ok(ErrorCode::WebhookSignatureInvalid),
            5008 => Ok(ErrorCode::WebhookPayloadInvalid),

            // Proof
            6001 => Ok(ErrorCode::FileTooLarge),
            6002 => Ok(ErrorCode::UnsupportedFileFormat),
            6003 => Ok(ErrorCode::InvalidImageFile),
            6004 => Ok(ErrorCode::NoFileProvided),
            6005 => Ok(ErrorCode::EmptyFile),
            6006 => Ok(ErrorCode::ProofNotFound),
            6007 => Ok(ErrorCode::ProofStorageUnavailable),

            // Rider
            7001 => Ok(ErrorCode::RiderNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9401 => Ok(ErrorCode::StorageFull),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::NotAssignedRider.code(), 2004);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::EvidenceRequired.code(), 4013);
        assert_eq!(ErrorCode::ConcurrentModification.code(), 4020);
        assert_eq!(ErrorCode::PaymentUnavailable.code(), 5006);
        assert_eq!(ErrorCode::FileTooLarge.code(), 6001);
        assert_eq!(ErrorCode::RiderNotFound.code(), 7001);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::OrderNotFound.is_success());
    }

    #[test]
    fn test_try_from_every_variant() {
        let all = [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::TokenExpired,
            ErrorCode::NotOrderOwner,
            ErrorCode::OrderNotPending,
            ErrorCode::RiderStageOnly,
            ErrorCode::WebhookPayloadInvalid,
            ErrorCode::ProofStorageUnavailable,
            ErrorCode::RiderNotFound,
            ErrorCode::SystemBusy,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(3001), Err(InvalidErrorCode(3001)));
        assert_eq!(ErrorCode::try_from(65535), Err(InvalidErrorCode(65535)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::EvidenceRequired).unwrap();
        assert_eq!(json, "4013");

        let code: ErrorCode = serde_json::from_str("4020").unwrap();
        assert_eq!(code, ErrorCode::ConcurrentModification);

        assert!(serde_json::from_str::<ErrorCode>("4999").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::OrderNotFound), "4001");
        assert_eq!(
            format!("{}", InvalidErrorCode(12)),
            "invalid error code: 12"
        );
    }
}
