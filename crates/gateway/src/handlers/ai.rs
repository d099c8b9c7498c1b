//! Assistant handlers: chat, summaries and citations

use crate::extract::{CurrentAccount, Json, Path};
use crate::response::ApiResponse;
use crate::AppState;
use axum::extract::State;
use intellilib_common::{
    ai::ChatReply,
    errors::Result,
    services::assistant::CitationStyle,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationRequest {
    pub document_id: Uuid,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct CitationResponse {
    pub citation: String,
    pub style: String,
}

pub async fn chat(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(body): Json<ChatBody>,
) -> Result<ApiResponse<ChatReply>> {
    let reply = state
        .services
        .assistant
        .chat(&account, &body.message, body.context)
        .await?;
    Ok(ApiResponse::ok(reply))
}

pub async fn summarize(
    State(state): State<AppState>,
    CurrentAccount(_account): CurrentAccount,
    Path(document_id): Path<Uuid>,
) -> Result<ApiResponse<SummaryResponse>> {
    let summary = state.services.assistant.summarize(document_id).await?;
    Ok(ApiResponse::ok(SummaryResponse { summary }))
}

pub async fn citation(
    State(state): State<AppState>,
    CurrentAccount(_account): CurrentAccount,
    Json(request): Json<CitationRequest>,
) -> Result<ApiResponse<CitationResponse>> {
    let style: CitationStyle = request
        .style
        .as_deref()
        .unwrap_or_default()
        .parse()
        .unwrap_or_default();

    let citation = state
        .services
        .assistant
        .citation(request.document_id, style)
        .await?;

    Ok(ApiResponse::ok(CitationResponse {
        citation,
        style: style.to_string(),
    }))
}
