//! Author directory entity

use super::values::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authors")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Lower-cased name; one directory entry per name
    #[sea_orm(column_type = "Text", unique)]
    #[serde(skip_serializing)]
    pub name_key: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub affiliation: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub profile_image: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub research_interests: StringList,

    pub citation_count: i64,

    pub h_index: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub orcid: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub google_scholar_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub website: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
