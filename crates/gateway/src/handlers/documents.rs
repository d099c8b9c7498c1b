//! Document catalogue, upload and approval handlers

use super::{field_file, field_text, multipart_error, optional_json};
use crate::extract::{AdminAccount, CurrentAccount, Json, MaybeAccount, Path, Query};
use crate::response::ApiResponse;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
};
use intellilib_common::{
    db::models::{Account, Document},
    db::{DocumentQuery, DocumentSort},
    errors::{AppError, Result},
    lifecycle::{DocumentStatus, Role},
    services::documents::{SearchOutcome, UploadInput},
    services::PageRequest,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<(DocumentQuery, PageRequest)> {
        let query = DocumentQuery {
            category: self.category.filter(|c| !c.trim().is_empty()),
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort: DocumentSort::from_str(self.sort.as_deref().unwrap_or_default())?,
        };
        Ok((query, PageRequest::new(self.page, self.limit)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploader {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<Account> for Uploader {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocument {
    #[serde(flatten)]
    pub document: Document,
    pub uploader: Option<Uploader>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub file_url: String,
    pub file_name: String,
    pub download_count: i64,
}

fn search_response(outcome: SearchOutcome) -> ApiResponse<Vec<Document>> {
    ApiResponse::ok(outcome.documents).with_fallback(outcome.fallback)
}

/// Public catalogue of published documents
pub async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Vec<Document>>> {
    let (query, page) = params.into_query()?;
    let page = state.services.documents.list_published(&query, page).await?;
    Ok(ApiResponse::page(page))
}

pub async fn get_article(
    State(state): State<AppState>,
    MaybeAccount(viewer): MaybeAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Document>> {
    let document = state.services.documents.get(id, viewer.as_ref()).await?;
    Ok(ApiResponse::ok(document))
}

pub async fn search_articles(
    State(state): State<AppState>,
    MaybeAccount(viewer): MaybeAccount,
    Json(request): Json<SearchRequest>,
) -> Result<ApiResponse<Vec<Document>>> {
    let outcome = state
        .services
        .documents
        .semantic_search(&request.query, viewer.as_ref())
        .await?;
    Ok(search_response(outcome))
}

/// Same listing as the public catalogue, for signed-in users
pub async fn list_documents(
    State(state): State<AppState>,
    CurrentAccount(_account): CurrentAccount,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Vec<Document>>> {
    let (query, page) = params.into_query()?;
    let page = state.services.documents.list_published(&query, page).await?;
    Ok(ApiResponse::page(page))
}

pub async fn recommendations(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<ApiResponse<Vec<Document>>> {
    let outcome = state.services.documents.recommendations(&account).await?;
    Ok(search_response(outcome))
}

pub async fn search(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(request): Json<SearchRequest>,
) -> Result<ApiResponse<Vec<Document>>> {
    let outcome = state
        .services
        .documents
        .semantic_search(&request.query, Some(&account))
        .await?;
    Ok(search_response(outcome))
}

pub async fn upload(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    mut multipart: Multipart,
) -> Result<ApiResponse<Document>> {
    let limit = state.config.storage.max_document_bytes;
    let mut input = UploadInput::default();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let (file_name, content_type, bytes) = field_file(field, limit).await?;
                input.file_name = file_name;
                input.content_type = content_type;
                input.bytes = bytes;
                has_file = true;
            }
            "title" => input.title = Some(field_text(field, limit).await?),
            "description" => input.description = Some(field_text(field, limit).await?),
            "author" => input.author = Some(field_text(field, limit).await?),
            "category" => input.category = Some(field_text(field, limit).await?),
            "tags" => input.tags = Some(field_text(field, limit).await?),
            "publisher" => input.publisher = Some(field_text(field, limit).await?),
            "publicationDate" | "publication_date" => {
                input.publication_date = Some(field_text(field, limit).await?)
            }
            "doi" => input.doi = Some(field_text(field, limit).await?),
            "isbn" => input.isbn = Some(field_text(field, limit).await?),
            _ => {}
        }
    }

    if !has_file {
        return Err(AppError::validation("file", "Please upload a file"));
    }

    let document = state.services.documents.upload(&account, input).await?;
    let message = if document.status == DocumentStatus::Published {
        "Document uploaded and published"
    } else {
        "Document uploaded and awaiting admin approval"
    };
    Ok(ApiResponse::created(document).with_message(message))
}

/// Review queue for admins
pub async fn pending(
    State(state): State<AppState>,
    AdminAccount(_admin): AdminAccount,
    Query(params): Query<PageParams>,
) -> Result<ApiResponse<Vec<PendingDocument>>> {
    let page = state
        .services
        .documents
        .list_pending(PageRequest::new(params.page, params.limit))
        .await?;

    Ok(ApiResponse::page(page.map(|(document, uploader)| {
        PendingDocument {
            document,
            uploader: uploader.map(Uploader::from),
        }
    })))
}

pub async fn get_document(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Document>> {
    let document = state.services.documents.get(id, Some(&account)).await?;
    Ok(ApiResponse::ok(document))
}

pub async fn download(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<DownloadResponse>> {
    let document = state
        .services
        .documents
        .record_download(id, Some(&account))
        .await?;

    Ok(ApiResponse::ok(DownloadResponse {
        file_url: document.file_url,
        file_name: document.file_name,
        download_count: document.download_count,
    }))
}

pub async fn approve(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Document>> {
    let document = state.services.documents.approve(id, &admin).await?;
    Ok(ApiResponse::ok(document).with_message("Document approved successfully"))
}

pub async fn reject(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<ApiResponse<Document>> {
    let request: RejectRequest = optional_json(&body)?;
    let document = state
        .services
        .documents
        .reject(id, &admin, request.reason)
        .await?;
    Ok(ApiResponse::ok(document).with_message("Document rejected"))
}
