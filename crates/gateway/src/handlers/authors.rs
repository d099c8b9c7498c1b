//! Author directory handlers

use crate::extract::{AdminAccount, Json, Path, Query};
use crate::response::ApiResponse;
use crate::AppState;
use axum::extract::State;
use intellilib_common::{
    db::models::Author,
    db::{AuthorQuery, AuthorSort},
    errors::Result,
    services::authors::{AuthorInput, AuthorProfile, DEFAULT_AUTHOR_PAGE_SIZE},
    services::PageRequest,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthorRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Author name is required"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    #[serde(default)]
    pub affiliation: Option<String>,

    #[serde(default)]
    pub bio: Option<String>,

    /// Comma separated
    #[serde(default)]
    pub research_interests: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<AuthorListParams>,
) -> Result<ApiResponse<Vec<Author>>> {
    let query = AuthorQuery {
        search: params.search.filter(|s| !s.trim().is_empty()),
        sort: AuthorSort::from_str(params.sort_by.as_deref().unwrap_or_default())?,
    };
    let page = PageRequest::new(params.page, Some(params.limit.unwrap_or(DEFAULT_AUTHOR_PAGE_SIZE)));

    let page = state.services.authors.list(&query, page).await?;
    Ok(ApiResponse::page(page))
}

pub async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Result<ApiResponse<Vec<Author>>> {
    let authors = state.services.authors.top(params.limit).await?;
    Ok(ApiResponse::ok(authors))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<AuthorProfile>> {
    let profile = state.services.authors.profile(id).await?;
    Ok(ApiResponse::ok(profile))
}

/// Existing entries are returned as they are; new ones answer 201
pub async fn create_or_get(
    State(state): State<AppState>,
    AdminAccount(_admin): AdminAccount,
    Json(request): Json<CreateAuthorRequest>,
) -> Result<ApiResponse<Author>> {
    request.validate()?;

    let (author, created) = state
        .services
        .authors
        .create_or_get(AuthorInput {
            name: request.name,
            email: request.email.filter(|e| !e.trim().is_empty()),
            affiliation: request.affiliation,
            bio: request.bio,
            research_interests: request.research_interests,
        })
        .await?;

    Ok(if created {
        ApiResponse::created(author).with_message("Author created")
    } else {
        ApiResponse::ok(author)
    })
}
