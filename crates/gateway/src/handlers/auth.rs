//! Registration, login, email verification and password reset

use crate::extract::{CurrentAccount, Json};
use crate::response::ApiResponse;
use crate::AppState;
use axum::{extract::State, http::HeaderMap};
use intellilib_common::{
    db::models::Account,
    errors::Result,
    lifecycle::Role,
    services::accounts::{ClientInfo, RegisterInput, Session},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    pub password: String,

    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Account,
    pub token: String,
    pub requires_verification: bool,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user: session.account,
            token: session.token,
            requires_verification: session.requires_verification,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    /// Seconds until the code expires
    pub expires_in: i64,
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    ClientInfo {
        ip_address: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header("x-real-ip")),
        user_agent: header("user-agent"),
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse<SessionResponse>> {
    request.validate()?;

    let session = state
        .services
        .accounts
        .register(RegisterInput {
            name: request.name,
            email: request.email,
            password: request.password,
            requested_role: request.role,
        })
        .await?;

    Ok(ApiResponse::created(session.into())
        .with_message("Registration successful. Please check your email for the verification code."))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<ApiResponse<SessionResponse>> {
    let session = state
        .services
        .accounts
        .login(&request.email, &request.password, client_info(&headers))
        .await?;

    Ok(ApiResponse::ok(session.into()))
}

pub async fn me(CurrentAccount(account): CurrentAccount) -> ApiResponse<Account> {
    ApiResponse::ok(account)
}

pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<ApiResponse<OtpIssued>> {
    let expires_in = state.services.accounts.send_email_otp(&request.email).await?;
    Ok(ApiResponse::ok(OtpIssued { expires_in }).with_message("Verification code sent to your email"))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<ApiResponse<OtpIssued>> {
    let expires_in = state
        .services
        .accounts
        .resend_email_otp(&request.email)
        .await?;
    Ok(ApiResponse::ok(OtpIssued { expires_in }).with_message("A new verification code has been sent"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<ApiResponse<Account>> {
    let account = state
        .services
        .accounts
        .verify_email(&request.email, &request.otp)
        .await?;
    Ok(ApiResponse::ok(account).with_message("Email verified successfully"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<ApiResponse<()>> {
    state.services.accounts.forgot_password(&request.email).await?;
    Ok(ApiResponse::message(
        "If an account exists for this email, a reset code has been sent",
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>> {
    state
        .services
        .accounts
        .reset_password(&request.email, &request.otp, &request.new_password)
        .await?;
    Ok(ApiResponse::message("Password has been reset. You can now log in."))
}
