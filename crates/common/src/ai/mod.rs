//! AI service abstraction
//!
//! The AI microservice owns text extraction, embeddings, ranking and chat.
//! This module only speaks its HTTP contract:
//! - `POST /api/ai/process-document` (multipart `file` + `documentId`)
//! - `POST /api/ai/semantic-search` `{query, userId}` -> `{documentIds}`
//! - `GET  /api/ai/recommendations?userId=` -> `{documentIds}`
//! - `POST /api/ai/chat`
//! - `POST /api/ai/summarize` -> `{summary}`

use crate::config::AiServiceConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Result of handing a file to the AI service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub text_length: Option<u64>,
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,
}

/// Trait for the AI collaborator
#[async_trait]
pub trait AiService: Send + Sync {
    /// Hand a stored file over for extraction and indexing
    async fn process_document(
        &self,
        document_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessedDocument>;

    /// Ranked document ids for a query
    async fn semantic_search(&self, query: &str, account_id: Option<Uuid>) -> Result<Vec<Uuid>>;

    /// Ranked document ids recommended for an account
    async fn recommendations(&self, account_id: Uuid) -> Result<Vec<Uuid>>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;

    async fn summarize(&self, document_id: Uuid, text: Option<&str>) -> Result<String>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    #[serde(default)]
    text_length: Option<u64>,
    #[serde(default)]
    extracted_text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdsResponse {
    #[serde(default)]
    document_ids: Vec<String>,
}

impl IdsResponse {
    /// Ids the service returned, skipping any that are not UUIDs
    fn into_ids(self) -> Vec<Uuid> {
        self.document_ids
            .iter()
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest<'a> {
    document_id: String,
    text: Option<&'a str>,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// HTTP client for the AI microservice
pub struct HttpAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAiClient {
    pub fn new(config: &AiServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create AI service client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/ai/{}", self.base_url, path)
    }

    /// Send, check the status and decode, recording latency either way
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let start = Instant::now();
        let result = Self::send(request).await;
        metrics::record_ai_call(start.elapsed().as_secs_f64(), operation, result.is_ok());

        result.map_err(|message| {
            tracing::warn!(operation, error = %message, "AI service call failed");
            AppError::UpstreamUnavailable {
                service: "AI".to_string(),
                message,
            }
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, String> {
        let response = request.send().await.map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    }
}

#[async_trait]
impl AiService for HttpAiClient {
    async fn process_document(
        &self,
        document_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessedDocument> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("documentId", document_id.to_string());

        let response: ProcessResponse = self
            .call(
                "process_document",
                self.client.post(self.url("process-document")).multipart(form),
            )
            .await?;

        Ok(ProcessedDocument {
            text_length: response.text_length,
            extracted_text: response.extracted_text,
        })
    }

    async fn semantic_search(&self, query: &str, account_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        let body = SearchRequest {
            query,
            user_id: account_id.map(|id| id.to_string()),
        };

        let response: IdsResponse = self
            .call(
                "semantic_search",
                self.client.post(self.url("semantic-search")).json(&body),
            )
            .await?;

        Ok(response.into_ids())
    }

    async fn recommendations(&self, account_id: Uuid) -> Result<Vec<Uuid>> {
        let response: IdsResponse = self
            .call(
                "recommendations",
                self.client
                    .get(self.url("recommendations"))
                    .query(&[("userId", account_id.to_string())]),
            )
            .await?;

        Ok(response.into_ids())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.call("chat", self.client.post(self.url("chat")).json(request))
            .await
    }

    async fn summarize(&self, document_id: Uuid, text: Option<&str>) -> Result<String> {
        let body = SummarizeRequest {
            document_id: document_id.to_string(),
            text,
        };

        let response: SummarizeResponse = self
            .call("summarize", self.client.post(self.url("summarize")).json(&body))
            .await?;

        Ok(response.summary)
    }
}

/// Mock AI service for testing.
///
/// Scripted rankings are returned as-is; when `available` is false every
/// call fails like an unreachable service.
#[derive(Default)]
pub struct MockAiService {
    available: bool,
    ranking: Mutex<Vec<Uuid>>,
    processed: Mutex<Vec<Uuid>>,
}

impl MockAiService {
    pub fn new() -> Self {
        Self {
            available: true,
            ..Default::default()
        }
    }

    /// A service that is always down
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Ids returned by the next searches and recommendations
    pub fn set_ranking(&self, ids: Vec<Uuid>) {
        if let Ok(mut ranking) = self.ranking.lock() {
            *ranking = ids;
        }
    }

    /// Documents handed over for processing so far
    pub fn processed(&self) -> Vec<Uuid> {
        self.processed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable {
                service: "AI".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn ranking(&self) -> Vec<Uuid> {
        self.ranking.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AiService for MockAiService {
    async fn process_document(
        &self,
        document_id: Uuid,
        _file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessedDocument> {
        self.check()?;
        if let Ok(mut processed) = self.processed.lock() {
            processed.push(document_id);
        }
        Ok(ProcessedDocument {
            text_length: Some(bytes.len() as u64),
            extracted_text: None,
        })
    }

    async fn semantic_search(&self, _query: &str, _account_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        self.check()?;
        Ok(self.ranking())
    }

    async fn recommendations(&self, _account_id: Uuid) -> Result<Vec<Uuid>> {
        self.check()?;
        Ok(self.ranking())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.check()?;
        Ok(ChatReply {
            response: format!("You asked about: {}", request.message),
        })
    }

    async fn summarize(&self, _document_id: Uuid, text: Option<&str>) -> Result<String> {
        self.check()?;
        let text = text.unwrap_or_default();
        Ok(text.chars().take(200).collect())
    }
}

/// Create the AI client from configuration
pub fn create_ai_service(config: &AiServiceConfig) -> Result<Arc<dyn AiService>> {
    Ok(Arc::new(HttpAiClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_response_skips_malformed_ids() {
        let id = Uuid::new_v4();
        let response: IdsResponse = serde_json::from_value(serde_json::json!({
            "documentIds": [id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6"]
        }))
        .unwrap();
        assert_eq!(response.into_ids(), vec![id]);

        let empty: IdsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_ids().is_empty());
    }

    #[test]
    fn test_url_building() {
        let client = HttpAiClient::new(&AiServiceConfig {
            base_url: "http://ai:8000/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("chat"), "http://ai:8000/api/ai/chat");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_upstream_error() {
        let client = HttpAiClient::new(&AiServiceConfig {
            base_url: "http://127.0.0.1:9".into(),
            connect_timeout_ms: 200,
            timeout_secs: 1,
        })
        .unwrap();

        let err = client.semantic_search("graphs", None).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_mock_service() {
        let ai = MockAiService::new();
        let id = Uuid::new_v4();
        ai.set_ranking(vec![id]);
        assert_eq!(ai.semantic_search("q", None).await.unwrap(), vec![id]);

        let down = MockAiService::unavailable();
        assert!(down.recommendations(id).await.is_err());
    }
}
