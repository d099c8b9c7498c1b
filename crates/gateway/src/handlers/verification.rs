//! Researcher verification handlers

use super::{field_file, field_text, multipart_error, optional_json};
use crate::extract::{AdminAccount, CurrentAccount, Path, Query};
use crate::response::ApiResponse;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
};
use intellilib_common::{
    db::models::VerificationRequest,
    errors::Result,
    lifecycle::{AccountVerificationStatus, VerificationStatus},
    services::verification::{Artifact, SubmitInput},
    services::PageRequest,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub verification_status: AccountVerificationStatus,
    pub request: Option<VerificationRequest>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub pending: u64,
    pub under_review: u64,
    pub approved: u64,
    pub rejected: u64,
    pub total: u64,
}

impl FromIterator<(VerificationStatus, u64)> for StatsResponse {
    fn from_iter<I: IntoIterator<Item = (VerificationStatus, u64)>>(counts: I) -> Self {
        let mut stats = StatsResponse::default();
        for (status, count) in counts {
            match status {
                VerificationStatus::Pending => stats.pending = count,
                VerificationStatus::UnderReview => stats.under_review = count,
                VerificationStatus::Approved => stats.approved = count,
                VerificationStatus::Rejected => stats.rejected = count,
            }
            stats.total += count;
        }
        stats
    }
}

pub async fn status(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<ApiResponse<StatusResponse>> {
    let summary = state.services.verification.status(&account).await?;
    Ok(ApiResponse::ok(StatusResponse {
        verification_status: summary.status,
        request: summary.request,
    }))
}

pub async fn submit(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    mut multipart: Multipart,
) -> Result<ApiResponse<VerificationRequest>> {
    let limit = state.config.storage.max_artifact_bytes;
    let mut input = SubmitInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "idDocument" | "profilePhoto" => {
                let (file_name, content_type, bytes) = field_file(field, limit).await?;
                let artifact = Some(Artifact {
                    file_name,
                    content_type,
                    bytes,
                });
                if name == "idDocument" {
                    input.id_document = artifact;
                } else {
                    input.profile_photo = artifact;
                }
            }
            "fullName" => input.full_name = Some(field_text(field, limit).await?),
            "dateOfBirth" => input.date_of_birth = Some(field_text(field, limit).await?),
            "idType" => input.id_type = Some(field_text(field, limit).await?),
            "idNumber" => input.id_number = Some(field_text(field, limit).await?),
            "institution" => input.institution = Some(field_text(field, limit).await?),
            "department" => input.department = Some(field_text(field, limit).await?),
            "position" => input.position = Some(field_text(field, limit).await?),
            "researchAreas" => input.research_areas = Some(field_text(field, limit).await?),
            "orcidId" => input.orcid_id = Some(field_text(field, limit).await?),
            "googleScholarId" => input.google_scholar_id = Some(field_text(field, limit).await?),
            "linkedinProfile" => input.linkedin_profile = Some(field_text(field, limit).await?),
            "personalWebsite" => input.personal_website = Some(field_text(field, limit).await?),
            _ => {}
        }
    }

    let request = state.services.verification.submit(&account, input).await?;
    Ok(ApiResponse::created(request)
        .with_message("Verification request submitted successfully. We will review it shortly."))
}

/// Admin listing, pending requests unless `status` says otherwise
pub async fn pending(
    State(state): State<AppState>,
    AdminAccount(_admin): AdminAccount,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Vec<VerificationRequest>>> {
    let status = params.status.as_deref().unwrap_or("pending");
    let page = state
        .services
        .verification
        .list(Some(status), PageRequest::new(params.page, params.limit))
        .await?;
    Ok(ApiResponse::page(page))
}

pub async fn stats(
    State(state): State<AppState>,
    AdminAccount(_admin): AdminAccount,
) -> Result<ApiResponse<StatsResponse>> {
    let counts = state.services.verification.stats().await?;
    Ok(ApiResponse::ok(counts.into_iter().collect()))
}

pub async fn get(
    State(state): State<AppState>,
    AdminAccount(_admin): AdminAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<VerificationRequest>> {
    let request = state.services.verification.get(id).await?;
    Ok(ApiResponse::ok(request))
}

pub async fn review(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<VerificationRequest>> {
    let request = state
        .services
        .verification
        .mark_under_review(id, &admin)
        .await?;
    Ok(ApiResponse::ok(request).with_message("Verification marked as under review"))
}

pub async fn approve(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<ApiResponse<VerificationRequest>> {
    let request: ApproveRequest = optional_json(&body)?;
    let approved = state
        .services
        .verification
        .approve(id, &admin, request.notes)
        .await?;
    Ok(ApiResponse::ok(approved).with_message("Researcher verification approved"))
}

pub async fn reject(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<ApiResponse<VerificationRequest>> {
    let request: RejectRequest = optional_json(&body)?;
    let rejected = state
        .services
        .verification
        .reject(id, &admin, request.reason.as_deref())
        .await?;
    Ok(ApiResponse::ok(rejected).with_message("Verification request rejected"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_total() {
        let stats: StatsResponse = vec![
            (VerificationStatus::Pending, 2),
            (VerificationStatus::UnderReview, 0),
            (VerificationStatus::Approved, 3),
            (VerificationStatus::Rejected, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            stats,
            StatsResponse {
                pending: 2,
                under_review: 0,
                approved: 3,
                rejected: 1,
                total: 6,
            }
        );
    }
}
