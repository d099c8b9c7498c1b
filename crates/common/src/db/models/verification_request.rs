//! Researcher verification request entity

use super::values::StringList;
use crate::lifecycle::verification::{AcademicPosition, IdType};
use crate::lifecycle::{StatusHistory, VerificationStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_requests")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// One request per account; resubmissions reuse the row
    #[sea_orm(unique)]
    pub account_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub full_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub date_of_birth: Option<String>,

    pub id_type: IdType,

    #[sea_orm(column_type = "Text")]
    pub id_number: String,

    #[sea_orm(column_type = "Text")]
    pub institution: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub department: Option<String>,

    pub position: Option<AcademicPosition>,

    #[sea_orm(column_type = "Json")]
    pub research_areas: StringList,

    #[sea_orm(column_type = "Text", nullable)]
    pub orcid_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub google_scholar_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub linkedin_profile: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub personal_website: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub id_document_url: String,

    #[sea_orm(column_type = "Text")]
    pub profile_photo_url: String,

    pub status: VerificationStatus,

    pub submitted_at: DateTimeUtc,

    pub reviewed_by: Option<Uuid>,

    pub reviewed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub review_notes: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub status_history: StatusHistory,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
