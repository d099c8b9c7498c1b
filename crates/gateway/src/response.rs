//! Success envelope: `{ success, data, pagination?, fallback?, message? }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use intellilib_common::services::{Page, Pagination};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    status: Option<StatusCode>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            pagination: None,
            fallback: None,
            message: None,
            status: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: Some(StatusCode::CREATED),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Mark results produced without the AI service
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::ok(page.items)
        }
    }
}

impl ApiResponse<()> {
    /// Envelope with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            pagination: None,
            fallback: None,
            message: Some(message.into()),
            status: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
