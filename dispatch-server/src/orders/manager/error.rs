use super::super::assignment::AssignmentError;
use super::super::machine::TransitionError;
use super::super::storage::StorageError;
use crate::riders::DirectoryError;
use crate::services::{PaymentError, ProofError};
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Façade errors
///
/// Each variant is one kind of the rejection taxonomy; the carried
/// [`ErrorCode`] is the stable reason clients branch on.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{1}")]
    Forbidden(ErrorCode, String),

    #[error("{1}")]
    NotFound(ErrorCode, String),

    #[error("{1}")]
    InvalidTransition(ErrorCode, String),

    #[error("Concurrent modification of order {0}, re-fetch and retry")]
    Conflict(String),

    #[error("{1}")]
    UpstreamUnavailable(ErrorCode, String),

    #[error("{1}")]
    Validation(ErrorCode, String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl DispatchError {
    pub fn forbidden(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Forbidden(code, message.into())
    }

    pub fn order_not_found(order_id: &str) -> Self {
        Self::NotFound(ErrorCode::OrderNotFound, format!("Order not found: {order_id}"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ErrorCode::ValidationFailed, message.into())
    }

    /// Stable reason code
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::Forbidden(code, _)
            | DispatchError::NotFound(code, _)
            | DispatchError::InvalidTransition(code, _)
            | DispatchError::UpstreamUnavailable(code, _)
            | DispatchError::Validation(code, _) => *code,
            DispatchError::Conflict(_) => ErrorCode::ConcurrentModification,
            DispatchError::Storage(e) => classify_storage_error(e),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<StorageError> for DispatchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OrderNotFound(id) => DispatchError::order_not_found(&id),
            StorageError::Conflict(id) => DispatchError::Conflict(id),
            other => DispatchError::Storage(other),
        }
    }
}

impl From<TransitionError> for DispatchError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::Forbidden(_) => {
                DispatchError::Forbidden(ErrorCode::RoleRequired, message)
            }
            TransitionError::NotAssignedRider(_) => {
                DispatchError::Forbidden(ErrorCode::NotAssignedRider, message)
            }
            TransitionError::EvidenceRequired => {
                DispatchError::InvalidTransition(ErrorCode::EvidenceRequired, message)
            }
            TransitionError::Backward { .. } => {
                DispatchError::InvalidTransition(ErrorCode::BackwardTransition, message)
            }
            TransitionError::RiderNotAssigned(_) => {
                DispatchError::InvalidTransition(ErrorCode::RiderNotAssigned, message)
            }
            TransitionError::RiderStageOnly(_) => {
                DispatchError::InvalidTransition(ErrorCode::RiderStageOnly, message)
            }
        }
    }
}

impl From<AssignmentError> for DispatchError {
    fn from(err: AssignmentError) -> Self {
        let message = err.to_string();
        match err {
            AssignmentError::AdminRequired => {
                DispatchError::Forbidden(ErrorCode::AdminRequired, message)
            }
            AssignmentError::RiderNotFound(_) => {
                DispatchError::NotFound(ErrorCode::RiderNotFound, message)
            }
            AssignmentError::AlreadyDelivered(_) => {
                DispatchError::InvalidTransition(ErrorCode::OrderAlreadyDelivered, message)
            }
        }
    }
}

impl From<DirectoryError> for DispatchError {
    fn from(err: DirectoryError) -> Self {
        DispatchError::UpstreamUnavailable(ErrorCode::SystemBusy, err.to_string())
    }
}

impl From<PaymentError> for DispatchError {
    fn from(err: PaymentError) -> Self {
        let message = err.to_string();
        match err {
            PaymentError::InvalidSignature(_) => {
                DispatchError::Forbidden(ErrorCode::WebhookSignatureInvalid, message)
            }
            PaymentError::InvalidPayload(_) => {
                DispatchError::Validation(ErrorCode::WebhookPayloadInvalid, message)
            }
            PaymentError::Network(_) | PaymentError::Rejected(_) => {
                DispatchError::UpstreamUnavailable(ErrorCode::PaymentUnavailable, message)
            }
        }
    }
}

impl From<ProofError> for DispatchError {
    fn from(err: ProofError) -> Self {
        let message = err.to_string();
        match err {
            ProofError::TooLarge { .. } => DispatchError::Validation(ErrorCode::FileTooLarge, message),
            ProofError::Empty => DispatchError::Validation(ErrorCode::EmptyFile, message),
            ProofError::UnsupportedFormat(_) => {
                DispatchError::Validation(ErrorCode::UnsupportedFileFormat, message)
            }
            ProofError::InvalidImage(_) => {
                DispatchError::Validation(ErrorCode::InvalidImageFile, message)
            }
            ProofError::InvalidReference(_) => {
                DispatchError::InvalidTransition(ErrorCode::EvidenceInvalid, message)
            }
            ProofError::NotFound(_) => DispatchError::NotFound(ErrorCode::ProofNotFound, message),
            ProofError::Io(_) | ProofError::Backend(_) => {
                DispatchError::UpstreamUnavailable(ErrorCode::ProofStorageUnavailable, message)
            }
        }
    }
}

impl From<validator::ValidationErrors> for DispatchError {
    fn from(err: validator::ValidationErrors) -> Self {
        DispatchError::validation(err.to_string())
    }
}

/// Map a storage failure to an error code
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::Serialization(_) => return ErrorCode::InternalError,
        StorageError::OrderNotFound(_) => return ErrorCode::OrderNotFound,
        StorageError::Conflict(_) => return ErrorCode::ConcurrentModification,
        _ => {}
    }

    // redb errors are classified by message
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    if err_str.contains("database already open") || err_str.contains("lock") {
        return ErrorCode::SystemBusy;
    }

    ErrorCode::DatabaseError
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let code = err.code();
        match err {
            DispatchError::Storage(e) => {
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            DispatchError::Conflict(ref order_id) => {
                AppError::with_message(code, err.to_string()).with_detail("order_id", order_id.as_str())
            }
            other => AppError::with_message(code, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderStatus, Role};

    #[test]
    fn test_transition_errors_keep_reason_codes() {
        let cases = [
            (TransitionError::Forbidden(Role::Customer), ErrorCode::RoleRequired, 403),
            (TransitionError::NotAssignedRider("o1".into()), ErrorCode::NotAssignedRider, 403),
            (TransitionError::EvidenceRequired, ErrorCode::EvidenceRequired, 409),
            (
                TransitionError::Backward {
                    from: OrderStatus::PickedUp,
                    to: OrderStatus::Processing,
                },
                ErrorCode::BackwardTransition,
                409,
            ),
            (
                TransitionError::RiderNotAssigned(OrderStatus::PickedUp),
                ErrorCode::RiderNotAssigned,
                409,
            ),
            (
                TransitionError::RiderStageOnly(OrderStatus::Processing),
                ErrorCode::RiderStageOnly,
                409,
            ),
        ];

        for (err, code, status) in cases {
            let app: AppError = DispatchError::from(err).into();
            assert_eq!(app.code, code);
            assert_eq!(app.http_status().as_u16(), status);
        }
    }

    #[test]
    fn test_storage_conflict_and_missing() {
        let conflict: DispatchError = StorageError::Conflict("o1".into()).into();
        assert!(matches!(conflict, DispatchError::Conflict(_)));
        assert_eq!(conflict.code(), ErrorCode::ConcurrentModification);

        let missing: DispatchError = StorageError::OrderNotFound("o1".into()).into();
        assert_eq!(missing.code(), ErrorCode::OrderNotFound);
        let app: AppError = missing.into();
        assert_eq!(app.http_status().as_u16(), 404);
    }

    #[test]
    fn test_upstream_failures_are_503() {
        let app: AppError = DispatchError::from(ProofError::Backend("disk".into())).into();
        assert_eq!(app.code, ErrorCode::ProofStorageUnavailable);
        assert_eq!(app.http_status().as_u16(), 503);

        let app: AppError = DispatchError::from(PaymentError::Rejected("nope".into())).into();
        assert_eq!(app.code, ErrorCode::PaymentUnavailable);
        assert_eq!(app.http_status().as_u16(), 503);
    }
}
