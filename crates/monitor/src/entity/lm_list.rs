use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

pub const LIST_TYPE_DYNAMIC: &str = "DYNAMIC";

/// Substring of `message` marking a list whose last run failed inside the
/// search backend rather than being skipped.
pub const SEARCH_BACKEND_FAILURE: &str = "Elasticsearch exception";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "lm_lists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_name = "type")]
    pub list_type: String,
    pub enabled: bool,
    pub autorun: bool,
    /// `HHmm` wall-clock start for scheduled lists; empty or null for lists
    /// that run automatically.
    pub autorun_time: Option<String>,
    pub message: Option<String>,
    pub updated_time: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
