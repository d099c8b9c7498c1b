//! Document lifecycle
//!
//! ```text
//! upload(admin)        -> published / approved
//! upload(other)        -> pending_approval / pending
//! AI processing ok     -> processed            (approval untouched)
//! approve  [pending]   -> published / approved
//! reject   [pending]   -> rejected / rejected
//! ```
//!
//! `status` and `approval_status` move together on human decisions, but
//! `status` also records the asynchronous processing outcome, which is why
//! the decision guard reads `approval_status` only.

use super::policy::{Role, UploadPolicy};
use super::LifecycleError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason stored when an admin rejects without giving one
pub const DEFAULT_REJECTION_REASON: &str = "No reason provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::PendingApproval => "pending_approval",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Published => "published",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Archived => "archived",
        }
    }

    /// Statuses a document can hold while it waits in the review queue
    pub fn awaiting_review() -> [DocumentStatus; 2] {
        [DocumentStatus::PendingApproval, DocumentStatus::Processed]
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of statuses a document carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentState {
    pub status: DocumentStatus,
    pub approval_status: ApprovalStatus,
}

/// Initial state chosen from the uploader's role
pub fn initial_state(uploader: Role) -> DocumentState {
    match uploader.upload_policy() {
        UploadPolicy::Publish => DocumentState {
            status: DocumentStatus::Published,
            approval_status: ApprovalStatus::Approved,
        },
        UploadPolicy::Review => DocumentState {
            status: DocumentStatus::PendingApproval,
            approval_status: ApprovalStatus::Pending,
        },
    }
}

/// An admin decision on a queued document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl DocumentDecision {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentDecision::Approve => "approved",
            DocumentDecision::Reject { .. } => "rejected",
        }
    }
}

/// Result of applying a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub state: DocumentState,
    pub rejection_reason: Option<String>,
}

/// Apply an admin decision. Only documents still awaiting approval accept one.
pub fn decide(
    current: ApprovalStatus,
    decision: &DocumentDecision,
) -> Result<DecisionOutcome, LifecycleError> {
    if current != ApprovalStatus::Pending {
        return Err(LifecycleError::DocumentAlreadyDecided(current));
    }

    Ok(match decision {
        DocumentDecision::Approve => DecisionOutcome {
            state: DocumentState {
                status: DocumentStatus::Published,
                approval_status: ApprovalStatus::Approved,
            },
            rejection_reason: None,
        },
        DocumentDecision::Reject { reason } => {
            let reason = reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_REJECTION_REASON)
                .to_string();
            DecisionOutcome {
                state: DocumentState {
                    status: DocumentStatus::Rejected,
                    approval_status: ApprovalStatus::Rejected,
                },
                rejection_reason: Some(reason),
            }
        }
    })
}

/// Status after the AI collaborator accepted the file.
///
/// Returns `None` when the document already left the review queue; a
/// published or rejected document keeps its visible status and only the
/// processing timestamp is recorded.
pub fn after_processing(current: DocumentStatus) -> Option<DocumentStatus> {
    match current {
        DocumentStatus::Pending | DocumentStatus::PendingApproval => Some(DocumentStatus::Processed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_by_role() {
        let admin = initial_state(Role::Admin);
        assert_eq!(admin.status, DocumentStatus::Published);
        assert_eq!(admin.approval_status, ApprovalStatus::Approved);

        for role in [Role::Researcher, Role::Student] {
            let state = initial_state(role);
            assert_eq!(state.status, DocumentStatus::PendingApproval);
            assert_eq!(state.approval_status, ApprovalStatus::Pending);
        }
    }

    #[test]
    fn test_approve_pending() {
        let outcome = decide(ApprovalStatus::Pending, &DocumentDecision::Approve).unwrap();
        assert_eq!(outcome.state.status, DocumentStatus::Published);
        assert_eq!(outcome.state.approval_status, ApprovalStatus::Approved);
        assert_eq!(outcome.rejection_reason, None);
    }

    #[test]
    fn test_second_decision_is_refused() {
        assert_eq!(
            decide(ApprovalStatus::Approved, &DocumentDecision::Approve),
            Err(LifecycleError::DocumentAlreadyDecided(ApprovalStatus::Approved))
        );
        assert_eq!(
            decide(
                ApprovalStatus::Rejected,
                &DocumentDecision::Reject { reason: Some("dup".into()) }
            ),
            Err(LifecycleError::DocumentAlreadyDecided(ApprovalStatus::Rejected))
        );
    }

    #[test]
    fn test_reject_reason_defaults() {
        let outcome = decide(
            ApprovalStatus::Pending,
            &DocumentDecision::Reject { reason: Some("   ".into()) },
        )
        .unwrap();
        assert_eq!(outcome.state.status, DocumentStatus::Rejected);
        assert_eq!(outcome.rejection_reason.as_deref(), Some(DEFAULT_REJECTION_REASON));

        let outcome = decide(
            ApprovalStatus::Pending,
            &DocumentDecision::Reject { reason: Some(" Off topic ".into()) },
        )
        .unwrap();
        assert_eq!(outcome.rejection_reason.as_deref(), Some("Off topic"));
    }

    #[test]
    fn test_processing_only_moves_queued_documents() {
        assert_eq!(
            after_processing(DocumentStatus::PendingApproval),
            Some(DocumentStatus::Processed)
        );
        assert_eq!(after_processing(DocumentStatus::Published), None);
        assert_eq!(after_processing(DocumentStatus::Rejected), None);
    }
}
