//! Authentication utilities
//!
//! Provides:
//! - Password hashing (Argon2id, PHC strings)
//! - JWT token generation and validation
//! - One-time codes for email verification and password reset
//! - Token context extraction

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use crate::lifecycle::Role;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Claims carried by a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,

    /// Role at issue time. Authorization re-reads the stored role.
    pub token_role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (account ID)
    pub sub: String,

    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: i64::try_from(expiration_secs).unwrap_or(i64::MAX / 2),
        }
    }

    /// Build from config. Without a configured secret a random one is used,
    /// so issued tokens do not survive a restart.
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                warn!("auth.jwt_secret is not set; using an ephemeral signing key");
                hex::encode(rand::random::<[u8; 32]>())
            }
        };
        Self::new(&secret, config.jwt_expiration_secs)
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, account_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: account_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Not authorized, token failed".to_string(),
                },
            })
    }
}

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).map_err(|e| AppError::Internal {
        message: format!("Failed to encode salt: {}", e),
    })?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Generate a six digit one-time code
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

/// Hash a one-time code for storage
pub fn hash_otp(otp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(otp.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from a `Bearer` Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Not authorized, no token".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Not authorized, no token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;
        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Not authorized, token failed".to_string(),
        })?;

        Ok(AuthContext {
            account_id,
            token_role: claims.role,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_otp_shape() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(hash_otp("123456"), hash_otp(" 123456 "));
        assert_ne!(hash_otp("123456"), hash_otp("654321"));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let account_id = Uuid::new_v4();

        let token = manager.generate_token(account_id, Role::Researcher).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.role, Role::Researcher);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_foreign_token_is_unauthorized() {
        let ours = JwtManager::new("ours", 3600);
        let theirs = JwtManager::new("theirs", 3600);
        let token = theirs.generate_token(Uuid::new_v4(), Role::Admin).unwrap();

        let err = ours.validate_token(&token).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
