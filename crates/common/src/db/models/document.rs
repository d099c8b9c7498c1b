//! Document entity

use super::values::{DocumentMetadata, StringList};
use crate::lifecycle::{ApprovalStatus, DocumentStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub author: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub category: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub tags: StringList,

    /// Public path of the stored file
    #[sea_orm(column_type = "Text")]
    pub file_url: String,

    /// Original filename as uploaded
    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    pub file_size: i64,

    #[sea_orm(column_type = "Text")]
    pub mime_type: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_text: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub metadata: DocumentMetadata,

    pub status: DocumentStatus,

    pub approval_status: ApprovalStatus,

    pub uploaded_by: Uuid,

    pub approved_by: Option<Uuid>,

    pub approved_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    pub processed_at: Option<DateTimeUtc>,

    pub view_count: i64,

    pub download_count: i64,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::UploadedBy",
        to = "super::account::Column::Id"
    )]
    Uploader,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
