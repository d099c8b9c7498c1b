//! Document and researcher-verification lifecycles
//!
//! Pure state machines: every function here takes the observed state and an
//! intended action and returns either the next state or the guard that
//! refused it. Persistence applies the result with a conditional update on
//! the observed state (see `db::repository`).

pub mod document;
pub mod policy;
pub mod verification;

pub use document::{ApprovalStatus, DocumentDecision, DocumentStatus};
pub use policy::{Role, UploadPolicy};
pub use verification::{
    AccountVerificationStatus, ReviewAction, StatusHistory, StatusHistoryEntry,
    VerificationStatus,
};

use crate::errors::AppError;
use thiserror::Error;

/// A refused lifecycle transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Document has already been {0}")]
    DocumentAlreadyDecided(ApprovalStatus),

    #[error("You are already verified as a researcher")]
    AlreadyVerified,

    #[error("You already have a pending verification request")]
    ActiveRequestExists,

    #[error("Cannot {action} a verification request that is {from}")]
    InvalidTransition {
        from: VerificationStatus,
        action: &'static str,
    },

    #[error("Rejection reason is required")]
    MissingReason,
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::MissingReason => AppError::validation("reason", err.to_string()),
            other => AppError::Conflict {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_missing_reason_is_validation() {
        let err: AppError = LifecycleError::MissingReason.into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_guard_violations_are_conflicts() {
        let cases = [
            LifecycleError::AlreadyVerified,
            LifecycleError::ActiveRequestExists,
            LifecycleError::DocumentAlreadyDecided(ApprovalStatus::Approved),
            LifecycleError::InvalidTransition {
                from: VerificationStatus::Rejected,
                action: "approve",
            },
        ];
        for case in cases {
            let err: AppError = case.into();
            assert_eq!(err.code(), ErrorCode::Conflict);
        }
    }

    #[test]
    fn test_messages_name_the_state() {
        let err = LifecycleError::InvalidTransition {
            from: VerificationStatus::UnderReview,
            action: "mark under review",
        };
        assert_eq!(
            err.to_string(),
            "Cannot mark under review a verification request that is under_review"
        );
        assert_eq!(
            LifecycleError::DocumentAlreadyDecided(ApprovalStatus::Rejected).to_string(),
            "Document has already been rejected"
        );
    }
}
