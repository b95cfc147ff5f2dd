use sea_orm::Condition;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Completion state written back by the campaign send check.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SendState {
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "alarm")]
    Alarm,
}

/// One attempt by the sending pipeline to deliver a letter.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "nl_send")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub letter_id: String,
    pub scheduled_send_time: OffsetDateTime,
    /// Unix milliseconds; set when the send entered the wait queue.
    pub status_wait_timestamp: i64,
    pub status_done_timestamp: Option<OffsetDateTime>,
    pub metrics_sent_emails: i64,
    pub metrics_sent_emails_err: i64,
    pub total_send_size: i64,
    pub send_state: Option<SendState>,
    pub queue_tag: i32,
    pub personalize: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const QUEUE_TAG_NEWSLETTER: i32 = 1000;
pub const QUEUE_TAG_TRANSACTIONAL: i32 = 10000;
pub const QUEUE_TAG_ALERT: i32 = 50000;

/// Send category, identified by its queue tag and personalization flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SendCategory {
    Personalized,
    Nonpersonalized,
    Transactional,
    Alert,
}

impl SendCategory {
    pub const ALL: [SendCategory; 4] = [
        SendCategory::Personalized,
        SendCategory::Nonpersonalized,
        SendCategory::Transactional,
        SendCategory::Alert,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SendCategory::Personalized => "personalized",
            SendCategory::Nonpersonalized => "nonpersonalized",
            SendCategory::Transactional => "transactional",
            SendCategory::Alert => "alert",
        }
    }

    pub const fn queue_tag(self) -> i32 {
        match self {
            SendCategory::Personalized | SendCategory::Nonpersonalized => QUEUE_TAG_NEWSLETTER,
            SendCategory::Transactional => QUEUE_TAG_TRANSACTIONAL,
            SendCategory::Alert => QUEUE_TAG_ALERT,
        }
    }

    /// `None` means the category matches regardless of the flag.
    pub const fn personalize(self) -> Option<bool> {
        match self {
            SendCategory::Personalized => Some(true),
            SendCategory::Nonpersonalized => Some(false),
            SendCategory::Transactional | SendCategory::Alert => None,
        }
    }

    pub fn condition(self) -> Condition {
        let condition = Condition::all().add(Column::QueueTag.eq(self.queue_tag()));
        match self.personalize() {
            Some(flag) => condition.add(Column::Personalize.eq(flag)),
            None => condition,
        }
    }

    /// Human readable filter, quoted in alert descriptions.
    pub fn filter_description(self) -> String {
        match self.personalize() {
            Some(flag) => format!(
                "{{\"queue_tag\":{},\"personalize\":{flag}}}",
                self.queue_tag()
            ),
            None => format!("{{\"queue_tag\":{}}}", self.queue_tag()),
        }
    }
}

impl std::fmt::Display for SendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_descriptions() {
        assert_eq!(
            SendCategory::Personalized.filter_description(),
            r#"{"queue_tag":1000,"personalize":true}"#
        );
        assert_eq!(
            SendCategory::Alert.filter_description(),
            r#"{"queue_tag":50000}"#
        );
    }
}
