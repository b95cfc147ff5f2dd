//! Canary sends: schedule a letter on each campaign and alert when the
//! campaign service refuses.

use crate::alerts::{AlertKind, AlertSink};
use crate::client::carta::{LetterService, SendFinalStatus};
use crate::config::CampaignsConfig;
use crate::error::{CampaignServiceError, MonitorError};
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LetterType {
    NonPersonalized,
    Personalized,
    Transactional,
}

impl LetterType {
    /// Scheduling order.
    pub const ALL: [LetterType; 3] = [
        LetterType::NonPersonalized,
        LetterType::Personalized,
        LetterType::Transactional,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            LetterType::NonPersonalized => "nonPersonalized",
            LetterType::Personalized => "personalized",
            LetterType::Transactional => "transactional",
        }
    }

    pub const fn alert(self) -> AlertKind {
        match self {
            LetterType::NonPersonalized => AlertKind::ScheduleNonpersonalizedSend,
            LetterType::Personalized => AlertKind::SchedulePersonalizedSend,
            LetterType::Transactional => AlertKind::ScheduleTransactionalSend,
        }
    }

    pub fn campaign_id(self, campaigns: &CampaignsConfig) -> &str {
        match self {
            LetterType::NonPersonalized => &campaigns.nonpersonalized_id,
            LetterType::Personalized => &campaigns.personalized_id,
            LetterType::Transactional => &campaigns.transactional_id,
        }
    }
}

/// `p0-<type>-yyyy-MM-dd HH:mm:ss`
pub fn letter_name(letter_type: LetterType, now: OffsetDateTime) -> String {
    format!(
        "p0-{}-{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        letter_type.as_str(),
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScheduledLetter {
    pub letter_type: LetterType,
    pub letter_id: String,
    pub name: String,
}

async fn schedule_letter<L: LetterService>(
    letters: &L,
    letter_type: LetterType,
    campaign_id: &str,
    now: OffsetDateTime,
) -> Result<ScheduledLetter, CampaignServiceError> {
    let name = letter_name(letter_type, now);
    tracing::info!(
        name = "checks.send_scheduling.create_letter",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        letter = %name,
        campaign_id = %campaign_id,
        message = "Creating canary letter"
    );
    let letter_id = letters.create_letter(&name, campaign_id).await?;

    match letters.send_final(&letter_id, campaign_id, now).await? {
        SendFinalStatus::Success => {
            tracing::info!(
                name = "checks.send_scheduling.scheduled",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                letter_id = %letter_id,
                campaign_id = %campaign_id,
                message = "Scheduled canary send"
            );
            Ok(ScheduledLetter {
                letter_type,
                letter_id,
                name,
            })
        }
        SendFinalStatus::Failure => Err(CampaignServiceError::Rejected {
            operation: "send_final",
            reason: format!("send of letter {letter_id} returned a failure"),
        }),
    }
}

/// Schedule one canary letter per campaign, in order. The first failure,
/// including a failure to close the campaign's alert afterwards, opens that
/// campaign's alert and ends the run.
#[tracing::instrument(skip_all)]
pub async fn schedule_canary_sends<L: LetterService, A: AlertSink>(
    letters: &L,
    alerts: &A,
    campaigns: &CampaignsConfig,
    now: OffsetDateTime,
) -> Result<Vec<ScheduledLetter>, MonitorError> {
    let mut scheduled = Vec::with_capacity(LetterType::ALL.len());
    for letter_type in LetterType::ALL {
        let kind = letter_type.alert();
        let attempt = async {
            let letter =
                schedule_letter(letters, letter_type, letter_type.campaign_id(campaigns), now)
                    .await?;
            alerts.close_open(kind).await?;
            Ok::<_, MonitorError>(letter)
        };
        match attempt.await {
            Ok(letter) => scheduled.push(letter),
            Err(e) => {
                tracing::error!(
                    name = "checks.send_scheduling.failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    letter_type = letter_type.as_str(),
                    error = %e,
                    message = "Failed to schedule canary send"
                );
                alerts.create(kind, Some(e.to_string())).await?;
                return Err(e);
            }
        }
    }
    Ok(scheduled)
}
