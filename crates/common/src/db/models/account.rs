//! Account entity

use super::values::{LoginHistory, SearchHistory, StringList};
use crate::lifecycle::{AccountVerificationStatus, Role};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Always stored lower-cased
    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    pub role: Role,

    pub verification_status: AccountVerificationStatus,

    /// Id lookup only; no foreign key
    pub verification_request_id: Option<Uuid>,

    pub email_verified: bool,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub email_otp_hash: Option<String>,

    pub email_otp_issued_at: Option<DateTimeUtc>,

    pub email_otp_expires_at: Option<DateTimeUtc>,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub reset_otp_hash: Option<String>,

    pub reset_otp_expires_at: Option<DateTimeUtc>,

    // Researcher profile, copied from an approved verification request
    #[sea_orm(column_type = "Text", nullable)]
    pub institution: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub department: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub position: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub orcid_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub google_scholar_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub linkedin_profile: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub profile_photo: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub research_areas: StringList,

    #[sea_orm(column_type = "Json")]
    pub login_history: LoginHistory,

    #[sea_orm(column_type = "Json")]
    pub search_history: SearchHistory,

    pub last_login_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document::Entity")]
    Documents,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
