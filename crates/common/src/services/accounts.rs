//! Account registration, login and email one-time codes

use super::ServiceDeps;
use crate::auth::{self, JwtManager, MIN_PASSWORD_LEN};
use crate::config::{AuthConfig, BootstrapAdmin};
use crate::db::models::{Account, LoginEntry};
use crate::db::{NewAccount, Repository};
use crate::errors::{AppError, Result};
use crate::lifecycle::Role;
use crate::notify::{self, Notification, Notifier};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub requested_role: Option<Role>,
}

/// An account together with a freshly issued token
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub token: String,
    pub requires_verification: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    repo: Repository,
    jwt: Arc<JwtManager>,
    notifier: Arc<dyn Notifier>,
    auth: AuthConfig,
}

/// Lower-cased, trimmed email; the form every lookup uses
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::MissingField {
            field: "email".to_string(),
        });
    }
    if !email.contains('@') {
        return Err(AppError::validation("email", "Please provide a valid email"));
    }
    Ok(email)
}

impl AccountService {
    pub fn new(deps: &ServiceDeps) -> Self {
        Self {
            repo: deps.repo.clone(),
            jwt: deps.jwt.clone(),
            notifier: deps.notifier.clone(),
            auth: deps.config.auth.clone(),
        }
    }

    fn otp_expiry(&self) -> Duration {
        Duration::minutes(self.auth.otp_expiry_minutes)
    }

    fn session(&self, account: Account) -> Result<Session> {
        let token = self.jwt.generate_token(account.id, account.role)?;
        Ok(Session {
            requires_verification: !account.email_verified,
            account,
            token,
        })
    }

    pub async fn register(&self, input: RegisterInput) -> Result<Session> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::MissingField {
                field: "name".to_string(),
            });
        }
        let email = require_email(&input.email)?;
        auth::validate_password(&input.password)?;

        let role = Role::for_signup(input.requested_role, self.auth.allow_self_assigned_role);
        let account = self
            .repo
            .create_account(NewAccount {
                name,
                email,
                password_hash: auth::hash_password(&input.password)?,
                role,
                email_verified: false,
            })
            .await?;

        info!(account_id = %account.id, role = %account.role, "Account registered");

        self.issue_email_otp(&account, Utc::now()).await?;
        self.session(account)
    }

    pub async fn login(&self, email: &str, password: &str, client: ClientInfo) -> Result<Session> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation(
                "email",
                "Please provide an email and password",
            ));
        }

        let account = self
            .repo
            .find_account_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !auth::verify_password(password, &account.password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        let account = self
            .repo
            .record_login(
                account.id,
                LoginEntry {
                    timestamp: Utc::now(),
                    ip_address: client.ip_address,
                    user_agent: client.user_agent,
                },
            )
            .await?;

        self.session(account)
    }

    pub async fn me(&self, account_id: Uuid) -> Result<Account> {
        self.repo
            .find_account_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Account", account_id))
    }

    async fn unverified_account(&self, email: &str) -> Result<Account> {
        let email = require_email(email)?;
        let account = self
            .repo
            .find_account_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("Account", &email))?;

        if account.email_verified {
            return Err(AppError::conflict("Email is already verified"));
        }
        Ok(account)
    }

    async fn issue_email_otp(&self, account: &Account, now: DateTime<Utc>) -> Result<()> {
        let otp = auth::generate_otp();
        self.repo
            .set_email_otp(account.id, auth::hash_otp(&otp), now, now + self.otp_expiry())
            .await?;

        notify::dispatch(
            self.notifier.clone(),
            account.email.clone(),
            Notification::EmailOtp {
                name: account.name.clone(),
                otp,
                expires_in_minutes: self.auth.otp_expiry_minutes,
            },
        );
        Ok(())
    }

    /// Issue a new email code, replacing any previous one. Returns its lifetime in seconds.
    pub async fn send_email_otp(&self, email: &str) -> Result<i64> {
        let account = self.unverified_account(email).await?;
        self.issue_email_otp(&account, Utc::now()).await?;
        Ok(self.otp_expiry().num_seconds())
    }

    /// Like [`send_email_otp`](Self::send_email_otp), throttled per account
    pub async fn resend_email_otp(&self, email: &str) -> Result<i64> {
        let account = self.unverified_account(email).await?;
        let now = Utc::now();

        if let Some(issued_at) = account.email_otp_issued_at {
            let cooldown = Duration::seconds(self.auth.otp_resend_cooldown_secs);
            let elapsed = now - issued_at;
            if elapsed < cooldown {
                let wait = (cooldown - elapsed).num_seconds().max(1);
                return Err(AppError::RateLimited {
                    retry_after_secs: u64::try_from(wait).unwrap_or(1),
                });
            }
        }

        self.issue_email_otp(&account, now).await?;
        Ok(self.otp_expiry().num_seconds())
    }

    pub async fn verify_email(&self, email: &str, otp: &str) -> Result<Account> {
        if otp.trim().is_empty() {
            return Err(AppError::MissingField {
                field: "otp".to_string(),
            });
        }
        let account = self.unverified_account(email).await?;

        check_otp(
            otp,
            account.email_otp_hash.as_deref(),
            account.email_otp_expires_at,
            "Invalid verification code",
        )?;

        let account = self.repo.mark_email_verified(account.id).await?;
        info!(account_id = %account.id, "Email verified");
        Ok(account)
    }

    /// Issue a password reset code. Unknown emails succeed silently.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = require_email(email)?;
        let Some(account) = self.repo.find_account_by_email(&email).await? else {
            return Ok(());
        };

        let otp = auth::generate_otp();
        self.repo
            .set_reset_otp(account.id, auth::hash_otp(&otp), Utc::now() + self.otp_expiry())
            .await?;

        notify::dispatch(
            self.notifier.clone(),
            account.email.clone(),
            Notification::PasswordReset {
                name: account.name,
                otp,
                expires_in_minutes: self.auth.otp_expiry_minutes,
            },
        );
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> Result<()> {
        let email = require_email(email)?;
        if otp.trim().is_empty() {
            return Err(AppError::MissingField {
                field: "otp".to_string(),
            });
        }
        auth::validate_password(new_password)?;

        let account = self
            .repo
            .find_account_by_email(&email)
            .await?
            .ok_or_else(|| AppError::validation("otp", "Invalid or expired reset code"))?;

        check_otp(
            otp,
            account.reset_otp_hash.as_deref(),
            account.reset_otp_expires_at,
            "Invalid or expired reset code",
        )?;

        self.repo
            .update_password(account.id, auth::hash_password(new_password)?)
            .await?;
        info!(account_id = %account.id, "Password reset");
        Ok(())
    }

    /// Provision the configured operator admin if it does not exist yet
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<Option<Account>> {
        let email = require_email(&admin.email)?;
        if self.repo.find_account_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        if admin.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Configuration {
                message: "auth.bootstrap_admin.password is too short".to_string(),
            });
        }

        let account = self
            .repo
            .create_account(NewAccount {
                name: admin.name.clone(),
                email,
                password_hash: auth::hash_password(&admin.password)?,
                role: Role::Admin,
                email_verified: true,
            })
            .await?;

        info!(account_id = %account.id, "Bootstrap admin provisioned");
        Ok(Some(account))
    }
}

fn check_otp(
    otp: &str,
    stored_hash: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    invalid_message: &str,
) -> Result<()> {
    let matches = stored_hash.is_some_and(|hash| hash == auth::hash_otp(otp));
    if !matches {
        return Err(AppError::validation("otp", invalid_message));
    }
    if expires_at.map_or(true, |at| at < Utc::now()) {
        return Err(AppError::validation(
            "otp",
            "Code has expired. Please request a new one.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::harness;
    use axum::http::StatusCode;

    fn input(email: &str, role: Option<Role>) -> RegisterInput {
        RegisterInput {
            name: "Ada Lovelace".into(),
            email: email.into(),
            password: "secret1".into(),
            requested_role: role,
        }
    }

    /// Read the code out of the most recent notification
    async fn last_otp(h: &crate::services::testing::Harness, count: usize) -> String {
        let sent = h.notifier.wait_for(count, std::time::Duration::from_secs(2)).await;
        match &sent[count - 1].1 {
            Notification::EmailOtp { otp, .. } | Notification::PasswordReset { otp, .. } => {
                otp.clone()
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_ignores_requested_role() {
        let h = harness().await;
        let session = h
            .services
            .accounts
            .register(input("  Ada@Example.ORG ", Some(Role::Admin)))
            .await
            .unwrap();

        assert_eq!(session.account.email, "ada@example.org");
        assert_eq!(session.account.role, Role::Student);
        assert!(session.requires_verification);

        let err = h
            .services
            .accounts
            .register(input("ada@example.org", None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let h = harness().await;
        let mut short = input("a@x.org", None);
        short.password = "123".into();
        let err = h.services.accounts.register(short).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let mut nameless = input("b@x.org", None);
        nameless.name = "  ".into();
        assert!(h.services.accounts.register(nameless).await.is_err());
    }

    #[tokio::test]
    async fn test_login_records_history() {
        let h = harness().await;
        h.services.accounts.register(input("a@x.org", None)).await.unwrap();

        let err = h
            .services
            .accounts
            .login("a@x.org", "wrong!", ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let err = h
            .services
            .accounts
            .login("nobody@x.org", "secret1", ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let session = h
            .services
            .accounts
            .login(
                "A@X.org",
                "secret1",
                ClientInfo {
                    ip_address: Some("10.1.1.1".into()),
                    user_agent: Some("test".into()),
                },
            )
            .await
            .unwrap();
        assert!(session.account.last_login_at.is_some());
        assert_eq!(session.account.login_history.0.len(), 1);
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn test_email_verification_flow() {
        let h = harness().await;
        h.services.accounts.register(input("a@x.org", None)).await.unwrap();
        let otp = last_otp(&h, 1).await;

        let wrong = if otp == "999999" { "100000" } else { "999999" };
        let err = h.services.accounts.verify_email("a@x.org", wrong).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let account = h.services.accounts.verify_email("a@x.org", &otp).await.unwrap();
        assert!(account.email_verified);
        assert!(account.email_otp_hash.is_none());

        let err = h.services.accounts.send_email_otp("a@x.org").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_resend_is_throttled() {
        let h = harness().await;
        h.services.accounts.register(input("a@x.org", None)).await.unwrap();

        let err = h.services.accounts.resend_email_otp("a@x.org").await.unwrap_err();
        match err {
            AppError::RateLimited { retry_after_secs } => assert!(retry_after_secs <= 60),
            other => panic!("expected rate limit, got {:?}", other),
        }

        let err = h.services.accounts.resend_email_otp("ghost@x.org").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let h = harness().await;
        h.services.accounts.register(input("a@x.org", None)).await.unwrap();

        // Unknown email does not leak
        h.services.accounts.forgot_password("ghost@x.org").await.unwrap();

        h.services.accounts.forgot_password("a@x.org").await.unwrap();
        let otp = last_otp(&h, 2).await;

        let err = h
            .services
            .accounts
            .reset_password("a@x.org", &otp, "123")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        h.services
            .accounts
            .reset_password("a@x.org", &otp, "new-secret")
            .await
            .unwrap();
        h.services
            .accounts
            .login("a@x.org", "new-secret", ClientInfo::default())
            .await
            .unwrap();

        // The code is single use
        assert!(h
            .services
            .accounts
            .reset_password("a@x.org", &otp, "another1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let h = harness().await;
        let admin = BootstrapAdmin {
            email: "root@intellilib.org".into(),
            password: "change-me".into(),
            name: "Root".into(),
        };

        let created = h.services.accounts.bootstrap_admin(&admin).await.unwrap();
        assert_eq!(created.map(|a| a.role), Some(Role::Admin));
        assert!(h.services.accounts.bootstrap_admin(&admin).await.unwrap().is_none());
    }

    #[test]
    fn test_expired_code_is_rejected() {
        let hash = auth::hash_otp("123456");
        let past = Utc::now() - Duration::minutes(1);
        let err = check_otp("123456", Some(&hash), Some(past), "bad").unwrap_err();
        assert!(err.to_string().contains("expired"));
        assert!(check_otp("123456", Some(&hash), Some(Utc::now() + Duration::minutes(5)), "bad").is_ok());
        assert!(check_otp("654321", Some(&hash), None, "bad").is_err());
    }
}
