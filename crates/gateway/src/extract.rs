//! Request extractors
//!
//! `Json`, `Path` and `Query` wrap axum's extractors so that malformed input
//! is answered with the regular error envelope.
//!
//! The bearer token only proves identity. The account, and with it the
//! role, is re-read from the store on every request so that a verification
//! approval takes effect without logging in again.

use crate::AppState;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use intellilib_common::auth::AuthContext;
use intellilib_common::db::models::Account;
use intellilib_common::errors::{AppError, Result};

/// Signed-in account
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let context = AuthContext::from_request_parts(parts, state).await?;

        let account = state
            .repo
            .find_account_by_id(context.account_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized {
                message: "Not authorized, account no longer exists".to_string(),
            })?;

        if account.role != context.token_role {
            tracing::debug!(
                account_id = %account.id,
                token_role = %context.token_role,
                role = %account.role,
                "Stored role differs from token role"
            );
        }

        Ok(CurrentAccount(account))
    }
}

/// Signed-in admin; any other role is `FORBIDDEN`
#[derive(Debug, Clone)]
pub struct AdminAccount(pub Account);

impl FromRequestParts<AppState> for AdminAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
        account.role.require_admin()?;
        Ok(AdminAccount(account))
    }
}

/// Account when a valid token is present. Public routes ignore bad tokens.
#[derive(Debug, Clone)]
pub struct MaybeAccount(pub Option<Account>);

impl FromRequestParts<AppState> for MaybeAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeAccount(None));
        }

        match CurrentAccount::from_request_parts(parts, state).await {
            Ok(CurrentAccount(account)) => Ok(MaybeAccount(Some(account))),
            Err(AppError::Database(e)) => Err(AppError::Database(e)),
            Err(_) => Ok(MaybeAccount(None)),
        }
    }
}

/// JSON body; a malformed body is a `VALIDATION_ERROR`
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

/// Path parameters; a malformed id is a `VALIDATION_ERROR`
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query string; unparsable parameters are a `VALIDATION_ERROR`
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);
