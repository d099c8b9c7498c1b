//! API handlers module

pub mod ai;
pub mod auth;
pub mod authors;
pub mod documents;
pub mod health;
pub mod verification;

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use intellilib_common::errors::{AppError, Result};
use serde::de::DeserializeOwned;

/// Parse a JSON body that may be absent
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation("body", e.to_string()))
}

pub(crate) fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            size: limit.saturating_add(1),
            limit,
        }
    } else {
        AppError::InvalidFormat {
            message: err.body_text(),
        }
    }
}

pub(crate) async fn field_text(field: Field<'_>, limit: usize) -> Result<String> {
    field.text().await.map_err(|e| multipart_error(e, limit))
}

/// Name, content type and bytes of a file part
pub(crate) async fn field_file(
    field: Field<'_>,
    limit: usize,
) -> Result<(String, Option<String>, Vec<u8>)> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
    Ok((file_name, content_type, bytes.to_vec()))
}
