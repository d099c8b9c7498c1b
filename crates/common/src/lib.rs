//! IntelliLib Common Library
//!
//! Shared code for the IntelliLib gateway including:
//! - Document and researcher-verification lifecycles
//! - Database models and repository patterns
//! - AI service, notifier and file storage abstractions
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use services::{ServiceDeps, Services};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
