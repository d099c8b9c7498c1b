//! Chat, summaries and citations

use super::ServiceDeps;
use crate::ai::{AiService, ChatReply, ChatRequest};
use crate::db::models::{Account, Document};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use chrono::Datelike;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
    /// Anything unrecognised: `<title> by <author>`
    Plain,
}

impl FromStr for CitationStyle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "apa" => CitationStyle::Apa,
            "mla" => CitationStyle::Mla,
            "chicago" => CitationStyle::Chicago,
            _ => CitationStyle::Plain,
        })
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Chicago => "Chicago",
            CitationStyle::Plain => "plain",
        })
    }
}

/// Format a citation. The year comes from the publication date when it
/// parses, otherwise from the upload date.
pub fn format_citation(document: &Document, style: CitationStyle) -> String {
    let author = document
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("Unknown");
    let year = document
        .metadata
        .publication_year()
        .unwrap_or_else(|| document.created_at.year());
    let publisher = document.metadata.publisher.as_deref().unwrap_or_default();
    let title = &document.title;

    match style {
        CitationStyle::Apa => format!("{}. ({}). {}. {}.", author, year, title, publisher),
        CitationStyle::Mla | CitationStyle::Chicago => {
            format!("{}. \"{}.\" {}, {}.", author, title, publisher, year)
        }
        CitationStyle::Plain => format!("{} by {}", title, author),
    }
}

#[derive(Clone)]
pub struct AssistantService {
    repo: Repository,
    ai: Arc<dyn AiService>,
}

impl AssistantService {
    pub fn new(deps: &ServiceDeps) -> Self {
        Self {
            repo: deps.repo.clone(),
            ai: deps.ai.clone(),
        }
    }

    /// Relay a chat message; unlike search there is no local fallback
    pub async fn chat(
        &self,
        account: &Account,
        message: &str,
        context: Option<String>,
    ) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::validation("message", "Please provide a message"));
        }

        self.ai
            .chat(&ChatRequest {
                message: message.to_string(),
                context,
                user_id: Some(account.id.to_string()),
                user_role: Some(account.role.to_string()),
            })
            .await
    }

    /// Summarize a document and keep the summary on the record
    pub async fn summarize(&self, document_id: Uuid) -> Result<String> {
        let document = self.document(document_id).await?;
        let text = document
            .extracted_text
            .as_deref()
            .or(document.description.as_deref());

        let summary = self.ai.summarize(document_id, text).await?;
        self.repo.set_summary(document_id, summary.clone()).await?;

        info!(document_id = %document_id, length = summary.len(), "Stored document summary");
        Ok(summary)
    }

    pub async fn citation(&self, document_id: Uuid, style: CitationStyle) -> Result<String> {
        let document = self.document(document_id).await?;
        Ok(format_citation(&document, style))
    }

    async fn document(&self, id: Uuid) -> Result<Document> {
        self.repo
            .find_document_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Document", id))
    }
}
