use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

pub const STATUS_SUBMITTED: &str = "submitted";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "file_download_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub list_name: String,
    pub user_name: String,
    pub status: String, // "submitted", "processing", "complete", "failed"
    pub created_time: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
