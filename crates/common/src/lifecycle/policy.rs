//! Account roles and the privilege gate shared by both lifecycles
//!
//! The gate is evaluated at the request boundary; the lifecycles themselves
//! never look at who is calling.

use crate::errors::{AppError, Result};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "student")]
    #[default]
    Student,
    #[sea_orm(string_value = "researcher")]
    Researcher,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Researcher => "researcher",
            Role::Admin => "admin",
        }
    }

    /// Admins skip every approval gate
    pub fn bypasses_approval(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Researchers and admins are the trusted uploaders
    pub fn is_trusted_uploader(&self) -> bool {
        matches!(self, Role::Researcher | Role::Admin)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        if self.bypasses_approval() {
            UploadPolicy::Publish
        } else {
            UploadPolicy::Review
        }
    }

    /// Fail with `FORBIDDEN` unless this is an admin
    pub fn require_admin(&self) -> Result<()> {
        if *self == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Role '{}' is not authorized to access this route",
                self
            )))
        }
    }

    /// Role assigned at self-service signup.
    ///
    /// Role elevation is earned through researcher verification and admins
    /// are provisioned by operators, so a requested role is only honored when
    /// `trust_requested` is set.
    pub fn for_signup(requested: Option<Role>, trust_requested: bool) -> Role {
        match requested {
            Some(role) if trust_requested => role,
            _ => Role::Student,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "researcher" => Ok(Role::Researcher),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::validation("role", format!("Unknown role '{}'", other))),
        }
    }
}

/// What happens to a freshly uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPolicy {
    /// Visible immediately
    Publish,
    /// Queued for an admin decision
    Review,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_bypasses_approval() {
        assert!(Role::Admin.bypasses_approval());
        assert!(!Role::Researcher.bypasses_approval());
        assert!(!Role::Student.bypasses_approval());
        assert_eq!(Role::Admin.upload_policy(), UploadPolicy::Publish);
        assert_eq!(Role::Researcher.upload_policy(), UploadPolicy::Review);
        assert_eq!(Role::Student.upload_policy(), UploadPolicy::Review);
    }

    #[test]
    fn test_trusted_uploaders() {
        assert!(Role::Admin.is_trusted_uploader());
        assert!(Role::Researcher.is_trusted_uploader());
        assert!(!Role::Student.is_trusted_uploader());
    }

    #[test]
    fn test_require_admin() {
        assert!(Role::Admin.require_admin().is_ok());
        let err = Role::Researcher.require_admin().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_signup_role_is_student_unless_trusted() {
        assert_eq!(Role::for_signup(Some(Role::Admin), false), Role::Student);
        assert_eq!(Role::for_signup(Some(Role::Researcher), false), Role::Student);
        assert_eq!(Role::for_signup(None, true), Role::Student);
        assert_eq!(Role::for_signup(Some(Role::Researcher), true), Role::Researcher);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!("Researcher".parse::<Role>().unwrap(), Role::Researcher);
        assert!("librarian".parse::<Role>().is_err());
    }
}
