//! Configuration management for IntelliLib services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication and account configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// AI microservice configuration
    #[serde(default)]
    pub ai_service: AiServiceConfig,

    /// Outbound notification configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Uploaded file storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables from the entity definitions on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Lifetime of email and password-reset codes
    #[serde(default = "default_otp_expiry_minutes")]
    pub otp_expiry_minutes: i64,

    /// Minimum gap between two email codes for the same account
    #[serde(default = "default_otp_resend_cooldown")]
    pub otp_resend_cooldown_secs: i64,

    /// Honor the role requested at signup instead of forcing `student`
    #[serde(default)]
    pub allow_self_assigned_role: bool,

    /// Operator-provisioned admin created at startup when absent
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiServiceConfig {
    /// Base URL of the AI microservice
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_ai_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    /// Notifier kind: log, webhook
    #[serde(default = "default_notifier_kind")]
    pub kind: String,

    /// Mail relay endpoint for the webhook notifier
    pub webhook_url: Option<String>,

    /// Sender display name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to
    #[serde(default = "default_upload_root")]
    pub upload_root: String,

    /// URL prefix the gateway serves uploads under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,

    /// Maximum size of an uploaded document
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,

    /// Maximum size of a verification artifact (ID scan, photo)
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_jwt_expiration() -> u64 { 30 * 24 * 3600 }
fn default_otp_expiry_minutes() -> i64 { 10 }
fn default_otp_resend_cooldown() -> i64 { 60 }
fn default_admin_name() -> String { "Administrator".to_string() }
fn default_ai_base_url() -> String { "http://localhost:8000".to_string() }
fn default_ai_connect_timeout() -> u64 { 2000 }
fn default_ai_timeout() -> u64 { 10 }
fn default_notifier_kind() -> String { "log".to_string() }
fn default_from_name() -> String { "IntelliLib".to_string() }
fn default_from_address() -> String { "noreply@intellilib.com".to_string() }
fn default_upload_root() -> String { "uploads".to_string() }
fn default_public_prefix() -> String { "/uploads".to_string() }
fn default_max_document_bytes() -> usize { 50 * 1024 * 1024 }
fn default_max_artifact_bytes() -> usize { 5 * 1024 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "intellilib".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// Largest request body the gateway must accept
    pub fn body_limit(&self) -> usize {
        // multipart framing and text fields on top of the file itself
        self.storage.max_document_bytes + 1024 * 1024
    }
}

impl DatabaseConfig {
    /// Single-connection in-memory SQLite, schema created on connect
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            read_url: None,
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: 3600,
            auto_migrate: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            otp_expiry_minutes: default_otp_expiry_minutes(),
            otp_resend_cooldown_secs: default_otp_resend_cooldown(),
            allow_self_assigned_role: false,
            bootstrap_admin: None,
        }
    }
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            connect_timeout_ms: default_ai_connect_timeout(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: default_notifier_kind(),
            webhook_url: None,
            from_name: default_from_name(),
            from_address: default_from_address(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            public_prefix: default_public_prefix(),
            max_document_bytes: default_max_document_bytes(),
            max_artifact_bytes: default_max_artifact_bytes(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/intellilib".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                auto_migrate: false,
            },
            auth: AuthConfig::default(),
            ai_service: AiServiceConfig::default(),
            notifier: NotifierConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.otp_expiry_minutes, 10);
        assert_eq!(config.storage.max_document_bytes, 50 * 1024 * 1024);
        assert!(!config.auth.allow_self_assigned_role);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/intellilib");
    }

    #[test]
    fn test_body_limit_covers_largest_upload() {
        let config = AppConfig::default();
        assert!(config.body_limit() > config.storage.max_document_bytes);
        assert!(config.body_limit() > config.storage.max_artifact_bytes);
    }

    #[test]
    fn test_in_memory_database_is_single_connection() {
        let db = DatabaseConfig::in_memory();
        assert_eq!(db.max_connections, 1);
        assert!(db.auto_migrate);
    }
}
