//! Researcher verification lifecycle
//!
//! ```text
//! (none)       --submit-------------> pending
//! rejected     --submit-------------> pending   (same record, decision cleared)
//! pending      --mark_under_review--> under_review
//! pending      --approve------------> approved
//! pending      --reject-------------> rejected
//! under_review --approve------------> approved
//! under_review --reject-------------> rejected
//! ```
//!
//! `approved` is terminal. The account mirrors the request status through
//! [`AccountVerificationStatus::from`].

use super::LifecycleError;
use chrono::{DateTime, Utc};
use regex_lite::Regex;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 4] = [
        VerificationStatus::Pending,
        VerificationStatus::UnderReview,
        VerificationStatus::Approved,
        VerificationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::UnderReview => "under_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Pending and under-review requests count as the account's active request
    pub fn is_active(&self) -> bool {
        matches!(self, VerificationStatus::Pending | VerificationStatus::UnderReview)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        VerificationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::validation("status", format!("Unknown status '{}'", s)))
    }
}

/// Verification status as seen on the account
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AccountVerificationStatus {
    #[sea_orm(string_value = "unverified")]
    #[default]
    Unverified,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl AccountVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountVerificationStatus::Unverified => "unverified",
            AccountVerificationStatus::Pending => "pending",
            AccountVerificationStatus::UnderReview => "under_review",
            AccountVerificationStatus::Verified => "verified",
            AccountVerificationStatus::Rejected => "rejected",
        }
    }

    /// Mirror of an optional linked request; `unverified` when there is none
    pub fn mirror(request: Option<VerificationStatus>) -> Self {
        request.map(Self::from).unwrap_or(AccountVerificationStatus::Unverified)
    }
}

impl From<VerificationStatus> for AccountVerificationStatus {
    fn from(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Pending => AccountVerificationStatus::Pending,
            VerificationStatus::UnderReview => AccountVerificationStatus::UnderReview,
            VerificationStatus::Approved => AccountVerificationStatus::Verified,
            VerificationStatus::Rejected => AccountVerificationStatus::Rejected,
        }
    }
}

impl fmt::Display for AccountVerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a submission lands in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPlan {
    /// First request for this account
    Create,
    /// Overwrite the rejected request in place
    Reactivate,
}

/// Guard for submit / resubmit given the account's existing request, if any
pub fn plan_submission(existing: Option<VerificationStatus>) -> Result<SubmissionPlan, LifecycleError> {
    match existing {
        None => Ok(SubmissionPlan::Create),
        Some(VerificationStatus::Rejected) => Ok(SubmissionPlan::Reactivate),
        Some(VerificationStatus::Approved) => Err(LifecycleError::AlreadyVerified),
        Some(VerificationStatus::Pending | VerificationStatus::UnderReview) => {
            Err(LifecycleError::ActiveRequestExists)
        }
    }
}

/// Admin actions on an existing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    MarkUnderReview,
    Approve { notes: Option<String> },
    Reject { reason: String },
}

impl ReviewAction {
    /// Build a rejection, refusing blank reasons
    pub fn reject(reason: Option<&str>) -> Result<Self, LifecycleError> {
        let reason = reason.map(str::trim).unwrap_or_default();
        if reason.is_empty() {
            return Err(LifecycleError::MissingReason);
        }
        Ok(ReviewAction::Reject {
            reason: reason.to_string(),
        })
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ReviewAction::MarkUnderReview => "mark under review",
            ReviewAction::Approve { .. } => "approve",
            ReviewAction::Reject { .. } => "reject",
        }
    }

    /// Notes recorded in the history entry
    pub fn notes(&self) -> Option<String> {
        match self {
            ReviewAction::MarkUnderReview => None,
            ReviewAction::Approve { notes } => notes.clone(),
            ReviewAction::Reject { reason } => Some(reason.clone()),
        }
    }
}

/// Next status for an admin action, or the guard that refused it
pub fn transition(
    current: VerificationStatus,
    action: &ReviewAction,
) -> Result<VerificationStatus, LifecycleError> {
    use VerificationStatus::*;

    let next = match (current, action) {
        (Pending, ReviewAction::MarkUnderReview) => UnderReview,
        (Pending | UnderReview, ReviewAction::Approve { .. }) => Approved,
        (Pending | UnderReview, ReviewAction::Reject { .. }) => Rejected,
        (from, action) => {
            return Err(LifecycleError::InvalidTransition {
                from,
                action: action.verb(),
            })
        }
    };
    Ok(next)
}

/// One entry of the append-only audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: VerificationStatus,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Ordered status history, stored as a JSON column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StatusHistory(pub Vec<StatusHistoryEntry>);

impl StatusHistory {
    /// History with one more entry. The existing entries are never touched.
    pub fn appended(&self, entry: StatusHistoryEntry) -> Self {
        let mut entries = self.0.clone();
        entries.push(entry);
        StatusHistory(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn statuses(&self) -> Vec<VerificationStatus> {
        self.0.iter().map(|e| e.status).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    #[sea_orm(string_value = "national_id")]
    NationalId,
    #[sea_orm(string_value = "passport")]
    Passport,
    #[sea_orm(string_value = "university_id")]
    UniversityId,
    #[sea_orm(string_value = "drivers_license")]
    DriversLicense,
}

impl FromStr for IdType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        match s.trim() {
            "national_id" => Ok(IdType::NationalId),
            "passport" => Ok(IdType::Passport),
            "university_id" => Ok(IdType::UniversityId),
            "drivers_license" => Ok(IdType::DriversLicense),
            other => Err(AppError::validation("idType", format!("Unknown ID type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum AcademicPosition {
    #[sea_orm(string_value = "Professor")]
    Professor,
    #[sea_orm(string_value = "Associate Professor")]
    #[serde(rename = "Associate Professor")]
    AssociateProfessor,
    #[sea_orm(string_value = "Assistant Professor")]
    #[serde(rename = "Assistant Professor")]
    AssistantProfessor,
    #[sea_orm(string_value = "Lecturer")]
    Lecturer,
    #[sea_orm(string_value = "Research Fellow")]
    #[serde(rename = "Research Fellow")]
    ResearchFellow,
    #[sea_orm(string_value = "Postdoctoral Researcher")]
    #[serde(rename = "Postdoctoral Researcher")]
    PostdoctoralResearcher,
    #[sea_orm(string_value = "PhD Student")]
    #[serde(rename = "PhD Student")]
    PhdStudent,
    #[sea_orm(string_value = "Research Assistant")]
    #[serde(rename = "Research Assistant")]
    ResearchAssistant,
    #[sea_orm(string_value = "Other")]
    Other,
}

impl AcademicPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicPosition::Professor => "Professor",
            AcademicPosition::AssociateProfessor => "Associate Professor",
            AcademicPosition::AssistantProfessor => "Assistant Professor",
            AcademicPosition::Lecturer => "Lecturer",
            AcademicPosition::ResearchFellow => "Research Fellow",
            AcademicPosition::PostdoctoralResearcher => "Postdoctoral Researcher",
            AcademicPosition::PhdStudent => "PhD Student",
            AcademicPosition::ResearchAssistant => "Research Assistant",
            AcademicPosition::Other => "Other",
        }
    }
}

impl FromStr for AcademicPosition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        use AcademicPosition::*;
        [
            Professor,
            AssociateProfessor,
            AssistantProfessor,
            Lecturer,
            ResearchFellow,
            PostdoctoralResearcher,
            PhdStudent,
            ResearchAssistant,
            Other,
        ]
        .into_iter()
        .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| AppError::validation("position", format!("Unknown position '{}'", s)))
    }
}

fn orcid_pattern() -> &'static Regex {
    static ORCID: OnceLock<Regex> = OnceLock::new();
    ORCID.get_or_init(|| Regex::new(r"^\d{4}-\d{4}-\d{4}-\d{3}[\dX]$").expect("valid ORCID pattern"))
}

/// ORCID iDs are four dash-separated blocks; the last digit may be `X`
pub fn is_valid_orcid(orcid: &str) -> bool {
    orcid_pattern().is_match(orcid)
}
