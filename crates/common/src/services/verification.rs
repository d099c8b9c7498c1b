//! Researcher verification workflow

use super::{Page, PageRequest, Pagination, ServiceDeps};
use crate::config::StorageConfig;
use crate::db::models::{Account, StringList, VerificationRequest};
use crate::db::{Repository, SubmissionFields};
use crate::errors::{AppError, Result};
use crate::lifecycle::verification::{
    is_valid_orcid, plan_submission, transition, AcademicPosition, IdType, SubmissionPlan,
};
use crate::lifecycle::{AccountVerificationStatus, ReviewAction, VerificationStatus};
use crate::metrics;
use crate::notify::{self, Notification, Notifier};
use crate::storage::{self, FileStore, ARTIFACT_TYPES};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// An uploaded identity document or photo
#[derive(Debug, Clone, Default)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Submission form as received; every field is still raw text
#[derive(Debug, Clone, Default)]
pub struct SubmitInput {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    /// JSON array or comma separated
    pub research_areas: Option<String>,
    pub orcid_id: Option<String>,
    pub google_scholar_id: Option<String>,
    pub linkedin_profile: Option<String>,
    pub personal_website: Option<String>,
    pub id_document: Option<Artifact>,
    pub profile_photo: Option<Artifact>,
}

/// The caller's own verification state
#[derive(Debug, Clone)]
pub struct VerificationSummary {
    pub status: AccountVerificationStatus,
    pub request: Option<VerificationRequest>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed form fields, files not yet stored
struct ValidatedSubmission {
    fields: SubmissionFields,
    id_document: Artifact,
    profile_photo: Artifact,
}

impl SubmitInput {
    fn validate(self, limit: usize) -> Result<ValidatedSubmission> {
        let full_name = non_empty(self.full_name);
        let id_type = non_empty(self.id_type);
        let id_number = non_empty(self.id_number);
        let institution = non_empty(self.institution);

        let (Some(full_name), Some(id_type), Some(id_number), Some(institution)) =
            (full_name, id_type, id_number, institution)
        else {
            return Err(AppError::validation(
                "fields",
                "Please provide all required fields: fullName, idType, idNumber, institution",
            ));
        };

        let orcid_id = non_empty(self.orcid_id);
        if let Some(orcid) = &orcid_id {
            if !is_valid_orcid(orcid) {
                return Err(AppError::validation(
                    "orcidId",
                    "Invalid ORCID format. Expected: 0000-0000-0000-0000",
                ));
            }
        }

        let position = non_empty(self.position)
            .map(|p| AcademicPosition::from_str(&p))
            .transpose()?;

        let (Some(id_document), Some(profile_photo)) = (self.id_document, self.profile_photo) else {
            return Err(AppError::validation(
                "files",
                "Both ID document and profile photo are required",
            ));
        };
        check_artifact("idDocument", &id_document, limit)?;
        check_artifact("profilePhoto", &profile_photo, limit)?;

        Ok(ValidatedSubmission {
            fields: SubmissionFields {
                full_name,
                date_of_birth: non_empty(self.date_of_birth),
                id_type: IdType::from_str(&id_type)?,
                id_number,
                institution,
                department: non_empty(self.department),
                position,
                research_areas: self
                    .research_areas
                    .as_deref()
                    .map(StringList::from_json_or_csv)
                    .unwrap_or_default(),
                orcid_id,
                google_scholar_id: non_empty(self.google_scholar_id),
                linkedin_profile: non_empty(self.linkedin_profile),
                personal_website: non_empty(self.personal_website),
                id_document_url: String::new(),
                profile_photo_url: String::new(),
            },
            id_document,
            profile_photo,
        })
    }
}

fn check_artifact(field: &str, artifact: &Artifact, limit: usize) -> Result<()> {
    if artifact.bytes.is_empty() {
        return Err(AppError::validation(field, "File is empty"));
    }
    let content_type = artifact.content_type.as_deref().unwrap_or_default();
    if !ARTIFACT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(content_type)) {
        return Err(AppError::InvalidFormat {
            message: "Only JPEG, PNG and PDF files are allowed".to_string(),
        });
    }
    if artifact.bytes.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: artifact.bytes.len(),
            limit,
        });
    }
    Ok(())
}

#[derive(Clone)]
pub struct VerificationService {
    repo: Repository,
    notifier: Arc<dyn Notifier>,
    files: Arc<dyn FileStore>,
    storage: StorageConfig,
}

impl VerificationService {
    pub fn new(deps: &ServiceDeps) -> Self {
        Self {
            repo: deps.repo.clone(),
            notifier: deps.notifier.clone(),
            files: deps.files.clone(),
            storage: deps.config.storage.clone(),
        }
    }

    pub async fn status(&self, account: &Account) -> Result<VerificationSummary> {
        let request = self.repo.find_verification_by_account(account.id).await?;
        Ok(VerificationSummary {
            status: AccountVerificationStatus::mirror(request.as_ref().map(|r| r.status)),
            request,
        })
    }

    /// Submit a first request, or resubmit after a rejection
    pub async fn submit(&self, account: &Account, input: SubmitInput) -> Result<VerificationRequest> {
        let existing = self.repo.find_verification_by_account(account.id).await?;
        let plan = plan_submission(existing.as_ref().map(|r| r.status))?;

        let ValidatedSubmission {
            mut fields,
            id_document,
            profile_photo,
        } = input.validate(self.storage.max_artifact_bytes)?;

        fields.id_document_url = self
            .files
            .save("id_document", &id_document.file_name, &id_document.bytes)
            .await?
            .url;
        fields.profile_photo_url = match self
            .files
            .save("profile_photo", &profile_photo.file_name, &profile_photo.bytes)
            .await
        {
            Ok(stored) => stored.url,
            Err(e) => {
                storage::discard(self.files.as_ref(), &[fields.id_document_url.as_str()]).await;
                return Err(e);
            }
        };

        let saved = [fields.id_document_url.clone(), fields.profile_photo_url.clone()];
        let request = match self.repo.submit_verification(account.id, plan, fields).await {
            Ok(request) => request,
            Err(e) => {
                let urls: Vec<&str> = saved.iter().map(String::as_str).collect();
                storage::discard(self.files.as_ref(), &urls).await;
                return Err(e);
            }
        };

        metrics::record_verification_transition(request.status.as_str());
        info!(
            request_id = %request.id,
            account_id = %account.id,
            resubmission = plan == SubmissionPlan::Reactivate,
            "Verification request submitted"
        );

        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> Result<VerificationRequest> {
        self.repo
            .find_verification_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Verification request", id))
    }

    /// Admin listing; `None` or `"all"` lists every status
    pub async fn list(
        &self,
        status: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<VerificationRequest>> {
        let status = match status.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(s) => Some(VerificationStatus::from_str(s)?),
        };

        let (items, total) = self
            .repo
            .list_verifications(status, page.page, page.limit)
            .await?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn stats(&self) -> Result<Vec<(VerificationStatus, u64)>> {
        self.repo.verification_counts().await
    }

    pub async fn mark_under_review(&self, id: Uuid, admin: &Account) -> Result<VerificationRequest> {
        self.review(id, admin, ReviewAction::MarkUnderReview).await
    }

    pub async fn approve(
        &self,
        id: Uuid,
        admin: &Account,
        notes: Option<String>,
    ) -> Result<VerificationRequest> {
        self.review(id, admin, ReviewAction::Approve { notes: non_empty(notes) })
            .await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        admin: &Account,
        reason: Option<&str>,
    ) -> Result<VerificationRequest> {
        let action = ReviewAction::reject(reason)?;
        self.review(id, admin, action).await
    }

    async fn review(
        &self,
        id: Uuid,
        admin: &Account,
        action: ReviewAction,
    ) -> Result<VerificationRequest> {
        let observed = self.get(id).await?;
        let next = transition(observed.status, &action)?;

        let request = self
            .repo
            .transition_verification(&observed, next, &action, admin.id)
            .await?;

        metrics::record_verification_transition(next.as_str());
        info!(
            request_id = %id,
            admin = %admin.id,
            from = %observed.status,
            to = %next,
            "Verification request reviewed"
        );

        self.notify_applicant(&request).await;
        Ok(request)
    }

    async fn notify_applicant(&self, request: &VerificationRequest) {
        let account = match self.repo.find_account_by_id(request.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Could not load applicant for notification");
                return;
            }
        };

        notify::dispatch(
            self.notifier.clone(),
            account.email,
            Notification::VerificationStatus {
                name: account.name,
                status: request.status,
                reason: request.rejection_reason.clone(),
            },
        );
    }
}
