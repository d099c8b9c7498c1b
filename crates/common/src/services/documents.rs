//! Document upload, catalogue queries and the approval workflow

use super::{Page, PageRequest, Pagination, ServiceDeps};
use crate::ai::AiService;
use crate::config::StorageConfig;
use crate::db::models::{Account, Document, DocumentMetadata, StringList};
use crate::db::{DocumentQuery, NewDocument, Repository};
use crate::errors::{AppError, Result};
use crate::lifecycle::document::{after_processing, decide, initial_state, DocumentDecision};
use crate::lifecycle::{DocumentStatus, Role};
use crate::metrics;
use crate::storage::{self, FileStore, PDF};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Results returned when the AI search fails
pub const FALLBACK_SEARCH_LIMIT: u64 = 20;

/// Recent documents returned when recommendations fail
pub const FALLBACK_RECOMMENDATION_LIMIT: u64 = 10;

/// A file and its form fields as received from the client
#[derive(Debug, Clone, Default)]
pub struct UploadInput {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Comma separated
    pub tags: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub isbn: Option<String>,
}

/// Documents found by a search, and whether the local fallback produced them
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub documents: Vec<Document>,
    pub fallback: bool,
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Repository,
    ai: Arc<dyn AiService>,
    files: Arc<dyn FileStore>,
    storage: StorageConfig,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-published documents are visible only to their uploader and admins
fn can_view(document: &Document, viewer: Option<&Account>) -> bool {
    document.status == DocumentStatus::Published
        || viewer.is_some_and(|v| v.role == Role::Admin || v.id == document.uploaded_by)
}

impl DocumentService {
    pub fn new(deps: &ServiceDeps) -> Self {
        Self {
            repo: deps.repo.clone(),
            ai: deps.ai.clone(),
            files: deps.files.clone(),
            storage: deps.config.storage.clone(),
        }
    }

    /// Store the file, create the record in the state the uploader's role
    /// dictates, then hand the file to the AI service in the background.
    pub async fn upload(&self, uploader: &Account, input: UploadInput) -> Result<Document> {
        if input.bytes.is_empty() {
            return Err(AppError::validation("file", "Please upload a file"));
        }
        let content_type = input.content_type.as_deref().unwrap_or_default();
        if !content_type.eq_ignore_ascii_case(PDF) {
            return Err(AppError::InvalidFormat {
                message: "Only PDF files are allowed".to_string(),
            });
        }
        if input.bytes.len() > self.storage.max_document_bytes {
            return Err(AppError::PayloadTooLarge {
                size: input.bytes.len(),
                limit: self.storage.max_document_bytes,
            });
        }

        let stored = self.files.save("file", &input.file_name, &input.bytes).await?;
        let state = initial_state(uploader.role);

        let file_url = stored.url.clone();
        let created = self
            .repo
            .create_document(NewDocument {
                title: non_empty(input.title).unwrap_or_else(|| input.file_name.clone()),
                description: non_empty(input.description),
                author: non_empty(input.author),
                category: non_empty(input.category),
                tags: input
                    .tags
                    .as_deref()
                    .map(StringList::from_csv)
                    .unwrap_or_default(),
                file_url: stored.url,
                file_name: input.file_name.clone(),
                file_size: i64::try_from(stored.size).unwrap_or(i64::MAX),
                mime_type: PDF.to_string(),
                metadata: DocumentMetadata {
                    pages: None,
                    publication_date: non_empty(input.publication_date),
                    publisher: non_empty(input.publisher),
                    isbn: non_empty(input.isbn),
                    doi: non_empty(input.doi),
                },
                state,
                uploaded_by: uploader.id,
            })
            .await;

        let document = match created {
            Ok(document) => document,
            Err(e) => {
                storage::discard(self.files.as_ref(), &[file_url.as_str()]).await;
                return Err(e);
            }
        };

        metrics::record_upload(uploader.role.as_str());
        info!(
            document_id = %document.id,
            uploader = %uploader.id,
            role = %uploader.role,
            trusted = uploader.role.is_trusted_uploader(),
            status = %document.status,
            "Document uploaded"
        );

        self.spawn_processing(&document, input.file_name, input.bytes);
        Ok(document)
    }

    /// Fire-and-forget hand-off; failures leave the record as it was
    fn spawn_processing(&self, document: &Document, file_name: String, bytes: Vec<u8>) {
        let repo = self.repo.clone();
        let ai = self.ai.clone();
        let document_id = document.id;

        tokio::spawn(async move {
            let processed = match ai.process_document(document_id, &file_name, bytes).await {
                Ok(processed) => processed,
                Err(e) => {
                    warn!(document_id = %document_id, error = %e, "AI processing failed");
                    return;
                }
            };

            let result = async {
                let current = repo
                    .find_document_by_id(document_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Document", document_id))?;
                repo.record_processing(
                    document_id,
                    current.status,
                    after_processing(current.status),
                    processed.extracted_text,
                )
                .await
            }
            .await;

            if let Err(e) = result {
                warn!(document_id = %document_id, error = %e, "Failed to record processing result");
            }
        });
    }

    pub async fn list_published(
        &self,
        query: &DocumentQuery,
        page: PageRequest,
    ) -> Result<Page<Document>> {
        let (items, total) = self.repo.list_published(query, page.page, page.limit).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    /// Fetch a document and count the view
    pub async fn get(&self, id: Uuid, viewer: Option<&Account>) -> Result<Document> {
        let document = self.visible(id, viewer).await?;
        self.repo.increment_view_count(document.id).await?;
        Ok(Document {
            view_count: document.view_count + 1,
            ..document
        })
    }

    /// Count a download and return the file's url
    pub async fn record_download(&self, id: Uuid, viewer: Option<&Account>) -> Result<Document> {
        let document = self.visible(id, viewer).await?;
        self.repo.increment_download_count(document.id).await?;
        Ok(Document {
            download_count: document.download_count + 1,
            ..document
        })
    }

    async fn visible(&self, id: Uuid, viewer: Option<&Account>) -> Result<Document> {
        self.repo
            .find_document_by_id(id)
            .await?
            .filter(|d| can_view(d, viewer))
            .ok_or_else(|| AppError::not_found("Document", id))
    }

    /// AI-ranked search over published documents, falling back to keyword
    /// search when the AI service fails
    pub async fn semantic_search(&self, query: &str, viewer: Option<&Account>) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("query", "Please provide a search query"));
        }

        match self.ai.semantic_search(query, viewer.map(|v| v.id)).await {
            Ok(ids) => {
                let documents = self.repo.find_published_by_ids(&ids).await?;
                if let Some(viewer) = viewer {
                    if let Err(e) = self.repo.append_search_history(viewer.id, query).await {
                        warn!(account_id = %viewer.id, error = %e, "Failed to save search history");
                    }
                }
                Ok(SearchOutcome {
                    documents,
                    fallback: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "Semantic search unavailable, using keyword search");
                metrics::record_ai_fallback("semantic_search");
                Ok(SearchOutcome {
                    documents: self.repo.keyword_search(query, FALLBACK_SEARCH_LIMIT).await?,
                    fallback: true,
                })
            }
        }
    }

    pub async fn recommendations(&self, account: &Account) -> Result<SearchOutcome> {
        match self.ai.recommendations(account.id).await {
            Ok(ids) => Ok(SearchOutcome {
                documents: self.repo.find_published_by_ids(&ids).await?,
                fallback: false,
            }),
            Err(e) => {
                warn!(error = %e, "Recommendations unavailable, using recent documents");
                metrics::record_ai_fallback("recommendations");
                Ok(SearchOutcome {
                    documents: self
                        .repo
                        .recent_published(FALLBACK_RECOMMENDATION_LIMIT)
                        .await?,
                    fallback: true,
                })
            }
        }
    }

    /// Review queue, newest first, with each uploader
    pub async fn list_pending(&self, page: PageRequest) -> Result<Page<(Document, Option<Account>)>> {
        let (items, total) = self.repo.list_pending(page.page, page.limit).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn approve(&self, id: Uuid, admin: &Account) -> Result<Document> {
        self.apply_decision(id, admin, DocumentDecision::Approve).await
    }

    pub async fn reject(&self, id: Uuid, admin: &Account, reason: Option<String>) -> Result<Document> {
        self.apply_decision(id, admin, DocumentDecision::Reject { reason })
            .await
    }

    async fn apply_decision(
        &self,
        id: Uuid,
        admin: &Account,
        decision: DocumentDecision,
    ) -> Result<Document> {
        let document = self
            .repo
            .find_document_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Document", id))?;

        let outcome = decide(document.approval_status, &decision)?;

        let applied = self
            .repo
            .decide_document(id, document.approval_status, &outcome, admin.id)
            .await?;
        if !applied {
            return Err(AppError::conflict("Document has already been decided"));
        }

        metrics::record_document_decision(decision.label());
        info!(
            document_id = %id,
            admin = %admin.id,
            decision = decision.label(),
            "Document decision recorded"
        );

        self.repo
            .find_document_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Document", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiService;
    use crate::lifecycle::ApprovalStatus;
    use crate::lifecycle::document::DEFAULT_REJECTION_REASON;
    use crate::services::testing::{harness, harness_with, Harness};
    use axum::http::StatusCode;
    use std::time::Duration;

    fn pdf(title: &str) -> UploadInput {
        UploadInput {
            file_name: format!("{}.pdf", title),
            content_type: Some(PDF.to_string()),
            bytes: b"%PDF-1.4 test".to_vec(),
            title: Some(title.to_string()),
            description: Some("Transformers for citation graphs".to_string()),
            tags: Some("nlp, graphs, nlp".to_string()),
            ..Default::default()
        }
    }

    async fn published_titles(h: &Harness) -> Vec<String> {
        h.services
            .documents
            .list_published(&DocumentQuery::default(), PageRequest::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.title)
            .collect()
    }

    async fn pending_titles(h: &Harness) -> Vec<String> {
        h.services
            .documents
            .list_pending(PageRequest::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|(d, _)| d.title)
            .collect()
    }

    async fn wait_processed(h: &Harness, id: Uuid) -> Document {
        for _ in 0..200 {
            let doc = h.repo.find_document_by_id(id).await.unwrap().unwrap();
            if doc.processed_at.is_some() {
                return doc;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("document {} was never processed", id);
    }

    #[tokio::test]
    async fn test_upload_state_follows_role() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let researcher = h.account("r@x.org", Role::Researcher).await;
        let student = h.account("s@x.org", Role::Student).await;

        let by_admin = h.services.documents.upload(&admin, pdf("Admin Doc")).await.unwrap();
        assert_eq!(by_admin.status, DocumentStatus::Published);
        assert_eq!(by_admin.approval_status, ApprovalStatus::Approved);

        for who in [&researcher, &student] {
            let doc = h.services.documents.upload(who, pdf("Queued")).await.unwrap();
            assert_eq!(doc.status, DocumentStatus::PendingApproval);
            assert_eq!(doc.approval_status, ApprovalStatus::Pending);
        }

        assert_eq!(published_titles(&h).await, vec!["Admin Doc"]);
        assert_eq!(pending_titles(&h).await.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let h = harness().await;
        let student = h.account("s@x.org", Role::Student).await;

        let mut not_pdf = pdf("x");
        not_pdf.content_type = Some("image/png".into());
        let err = h.services.documents.upload(&student, not_pdf).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));

        let mut empty = pdf("x");
        empty.bytes.clear();
        assert!(h.services.documents.upload(&student, empty).await.is_err());
        assert!(h.files.is_empty());
    }

    #[tokio::test]
    async fn test_upload_normalizes_fields() {
        let h = harness().await;
        let student = h.account("s@x.org", Role::Student).await;
        let mut input = pdf("ignored");
        input.title = Some("   ".into());

        let doc = h.services.documents.upload(&student, input).await.unwrap();
        assert_eq!(doc.title, "ignored.pdf");
        assert_eq!(doc.tags.0, vec!["nlp", "graphs"]);
        assert!(doc.file_url.starts_with("/uploads/file-"));
    }

    #[tokio::test]
    async fn test_processing_keeps_document_in_queue() {
        let h = harness().await;
        let student = h.account("s@x.org", Role::Student).await;
        let doc = h.services.documents.upload(&student, pdf("Doc")).await.unwrap();

        let doc = wait_processed(&h, doc.id).await;
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.approval_status, ApprovalStatus::Pending);
        assert_eq!(pending_titles(&h).await, vec!["Doc"]);
        assert_eq!(h.ai.processed(), vec![doc.id]);
    }

    #[tokio::test]
    async fn test_processing_failure_is_not_fatal() {
        let h = harness_with(MockAiService::unavailable()).await;
        let student = h.account("s@x.org", Role::Student).await;
        let doc = h.services.documents.upload(&student, pdf("Doc")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let doc = h.repo.find_document_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::PendingApproval);
        assert!(doc.processed_at.is_none());
    }

    #[tokio::test]
    async fn test_student_upload_end_to_end() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let student = h.account("s@x.org", Role::Student).await;

        let doc = h.services.documents.upload(&student, pdf("Doc A")).await.unwrap();
        assert_eq!(pending_titles(&h).await, vec!["Doc A"]);
        assert!(published_titles(&h).await.is_empty());

        let approved = h.services.documents.approve(doc.id, &admin).await.unwrap();
        assert_eq!(approved.status, DocumentStatus::Published);
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert_eq!(approved.approved_by, Some(admin.id));

        assert_eq!(published_titles(&h).await, vec!["Doc A"]);
        assert!(pending_titles(&h).await.is_empty());
    }

    #[tokio::test]
    async fn test_second_decision_conflicts() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let student = h.account("s@x.org", Role::Student).await;
        let doc = h.services.documents.upload(&student, pdf("Doc")).await.unwrap();

        h.services.documents.approve(doc.id, &admin).await.unwrap();
        let err = h.services.documents.approve(doc.id, &admin).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err = h
            .services
            .documents
            .reject(doc.id, &admin, Some("late".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let doc = h.repo.find_document_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Published);
        assert_eq!(doc.rejection_reason, None);
    }

    #[tokio::test]
    async fn test_reject_defaults_reason() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let student = h.account("s@x.org", Role::Student).await;
        let doc = h.services.documents.upload(&student, pdf("Doc")).await.unwrap();

        let rejected = h.services.documents.reject(doc.id, &admin, None).await.unwrap();
        assert_eq!(rejected.status, DocumentStatus::Rejected);
        assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some(DEFAULT_REJECTION_REASON));
        assert!(published_titles(&h).await.is_empty());

        let err = h.services.documents.approve(Uuid::new_v4(), &admin).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_queued_documents_hidden_from_strangers() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let student = h.account("s@x.org", Role::Student).await;
        let other = h.account("o@x.org", Role::Student).await;
        let doc = h.services.documents.upload(&student, pdf("Doc")).await.unwrap();

        assert!(h.services.documents.get(doc.id, None).await.is_err());
        assert!(h.services.documents.get(doc.id, Some(&other)).await.is_err());
        assert!(h.services.documents.get(doc.id, Some(&student)).await.is_ok());
        let seen = h.services.documents.get(doc.id, Some(&admin)).await.unwrap();
        assert_eq!(seen.view_count, 2);
    }

    #[tokio::test]
    async fn test_semantic_search_uses_ai_ranking() {
        let h = harness().await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        let a = h.services.documents.upload(&admin, pdf("A")).await.unwrap();
        let b = h.services.documents.upload(&admin, pdf("B")).await.unwrap();
        h.ai.set_ranking(vec![b.id, a.id]);

        let outcome = h
            .services
            .documents
            .semantic_search("graphs", Some(&admin))
            .await
            .unwrap();
        assert!(!outcome.fallback);
        let ids: Vec<Uuid> = outcome.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let account = h.repo.find_account_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(account.search_history.0.len(), 1);
        assert_eq!(account.search_history.0[0].query, "graphs");

        let err = h.services.documents.semantic_search("  ", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_falls_back_to_keywords() {
        let h = harness_with(MockAiService::unavailable()).await;
        let admin = h.account("admin@x.org", Role::Admin).await;
        h.services.documents.upload(&admin, pdf("Citation Graphs")).await.unwrap();
        h.services.documents.upload(&admin, pdf("Protein Folding")).await.unwrap();

        let outcome = h
            .services
            .documents
            .semantic_search("citation", None)
            .await
            .unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.documents.len(), 2);

        let outcome = h.services.documents.semantic_search("protein", None).await.unwrap();
        assert_eq!(outcome.documents.len(), 1);

        let recs = h.services.documents.recommendations(&admin).await.unwrap();
        assert!(recs.fallback);
        assert_eq!(recs.documents.len(), 2);
    }
}
