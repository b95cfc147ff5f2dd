//! Completion tracking for recent campaign sends.
//!
//! Each recent send gets a grace period proportional to how many emails it
//! has attempted: one segment's worth of minutes, plus one more segment's
//! worth for every full segment of attempts. A send whose success ratio is
//! below the threshold once the grace period runs out is a `warning`; an hour
//! later it is an `alarm`.

use crate::alerts::{AlertKind, AlertSink, Priority};
use crate::config::CampaignSendConfig;
use crate::entity::nl_send::{self, SendState};
use crate::error::MonitorError;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveEnum, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Grace period settings for a send.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionThresholds {
    pub sends_per_segment: u64,
    pub minutes_per_segment: u64,
    pub success_ratio_threshold: f64,
    pub escalation_minutes: u64,
}

impl From<&CampaignSendConfig> for CompletionThresholds {
    fn from(config: &CampaignSendConfig) -> Self {
        Self {
            sends_per_segment: config.sends_per_segment,
            minutes_per_segment: config.minutes_per_segment,
            success_ratio_threshold: config.success_ratio_threshold,
            escalation_minutes: config.escalation_minutes,
        }
    }
}

impl CompletionThresholds {
    /// Minutes after the scheduled time before an incomplete send is a warning.
    pub fn warn_minutes(&self, attempted: u64) -> u64 {
        let segments = attempted / self.sends_per_segment.max(1);
        (1 + segments).saturating_mul(self.minutes_per_segment)
    }

    /// Minutes after the scheduled time before an incomplete send is an alarm.
    pub fn alarm_minutes(&self, attempted: u64) -> u64 {
        self.warn_minutes(attempted)
            .saturating_add(self.escalation_minutes)
    }
}

/// The fields of a send the evaluation looks at.
#[derive(Clone, Copy, Debug)]
pub struct SendProgress<'a> {
    pub id: &'a str,
    pub scheduled_send_time: OffsetDateTime,
    pub sent_ok: i64,
    pub sent_err: i64,
}

impl<'a> From<&'a nl_send::Model> for SendProgress<'a> {
    fn from(model: &'a nl_send::Model) -> Self {
        Self {
            id: &model.id,
            scheduled_send_time: model.scheduled_send_time,
            sent_ok: model.metrics_sent_emails,
            sent_err: model.metrics_sent_emails_err,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendVerdict {
    pub id: String,
    pub state: SendState,
}

/// Decide the state of one send at `now`.
///
/// `None` means nothing can be said yet: no attempts so far, or the send is
/// incomplete but still inside its grace period. Threshold boundaries are
/// exclusive.
pub fn evaluate_send(
    send: SendProgress<'_>,
    thresholds: &CompletionThresholds,
    now: OffsetDateTime,
) -> Option<SendVerdict> {
    let sent_ok = send.sent_ok.max(0) as u64;
    let attempted = sent_ok + send.sent_err.max(0) as u64;
    if attempted == 0 {
        return None;
    }

    let verdict = |state| {
        Some(SendVerdict {
            id: send.id.to_string(),
            state,
        })
    };

    let ratio = sent_ok as f64 / attempted as f64;
    if ratio >= thresholds.success_ratio_threshold {
        return verdict(SendState::Done);
    }

    let elapsed_minutes = (now - send.scheduled_send_time).abs().as_seconds_f64() / 60.0;
    if elapsed_minutes > thresholds.alarm_minutes(attempted) as f64 {
        verdict(SendState::Alarm)
    } else if elapsed_minutes > thresholds.warn_minutes(attempted) as f64 {
        verdict(SendState::Warning)
    } else {
        None
    }
}

/// Send ids grouped by verdict.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SendBuckets {
    pub done: Vec<String>,
    pub warning: Vec<String>,
    pub alarm: Vec<String>,
    /// Sends that produced no verdict.
    pub pending: usize,
}

impl SendBuckets {
    pub fn push(&mut self, verdict: Option<SendVerdict>) {
        match verdict {
            Some(SendVerdict { id, state }) => match state {
                SendState::Done => self.done.push(id),
                SendState::Warning => self.warning.push(id),
                SendState::Alarm => self.alarm.push(id),
            },
            None => self.pending += 1,
        }
    }

    pub fn ids(&self, state: SendState) -> &[String] {
        match state {
            SendState::Done => &self.done,
            SendState::Warning => &self.warning,
            SendState::Alarm => &self.alarm,
        }
    }
}

pub fn partition_sends<'a>(
    sends: impl IntoIterator<Item = SendProgress<'a>>,
    thresholds: &CompletionThresholds,
    now: OffsetDateTime,
) -> SendBuckets {
    let mut buckets = SendBuckets::default();
    for send in sends {
        buckets.push(evaluate_send(send, thresholds, now));
    }
    buckets
}

/// What to do with the `Multiple_Campaign_Send_Delay` alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDecision {
    Close,
    /// Create (or refresh) the alert, then optionally raise it to P0.
    Raise { escalate: bool },
}

pub fn decide_alert(buckets: &SendBuckets) -> AlertDecision {
    if buckets.warning.len() <= 1 && buckets.alarm.is_empty() {
        AlertDecision::Close
    } else {
        AlertDecision::Raise {
            escalate: !buckets.alarm.is_empty(),
        }
    }
}

/// Summary returned by [`check_campaign_sends`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignSendSummary {
    pub eligible: usize,
    pub buckets: SendBuckets,
    pub alert_raised: bool,
    pub escalated: bool,
}

/// Recent sends that have not finished and are large enough to matter.
///
/// `status_wait_timestamp` is indexed and lands within a minute of the
/// scheduled time, so the window is applied to it.
pub async fn find_eligible_sends(
    db: &DatabaseConnection,
    settings: &CampaignSendConfig,
    now: OffsetDateTime,
) -> Result<Vec<nl_send::Model>, MonitorError> {
    let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64;
    let from_ms = now_ms - settings.lookback_hours * 60 * 60 * 1000;

    let sends = nl_send::Entity::find()
        .filter(nl_send::Column::StatusWaitTimestamp.between(from_ms, now_ms))
        .filter(
            Condition::any()
                .add(nl_send::Column::SendState.is_null())
                .add(nl_send::Column::SendState.ne(SendState::Done.to_value())),
        )
        .filter(nl_send::Column::TotalSendSize.gt(settings.min_send_size))
        .all(db)
        .await?;
    Ok(sends)
}

/// Write `state` to every send in `ids` in one statement.
pub async fn update_send_state(
    db: &DatabaseConnection,
    ids: &[String],
    state: SendState,
) -> Result<u64, MonitorError> {
    if ids.is_empty() {
        return Ok(0);
    }

    tracing::info!(
        name = "checks.campaign_send.update_state",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        state = %state.to_value(),
        ids = %ids.join(", "),
        message = "Marking sends"
    );
    let result = nl_send::Entity::update_many()
        .col_expr(nl_send::Column::SendState, Expr::value(state.to_value()))
        .filter(nl_send::Column::Id.is_in(ids.iter().cloned()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[tracing::instrument(skip_all)]
pub async fn check_campaign_sends<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    settings: &CampaignSendConfig,
    status_page_url: &str,
    now: OffsetDateTime,
) -> Result<CampaignSendSummary, MonitorError> {
    let sends = find_eligible_sends(db, settings, now).await?;
    if sends.is_empty() {
        tracing::info!(
            name = "checks.campaign_send.none_pending",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            message = "No pending campaign sends found"
        );
        alerts.close_open(AlertKind::MultipleCampaignSendDelay).await?;
        return Ok(CampaignSendSummary::default());
    }

    let thresholds = CompletionThresholds::from(settings);
    let buckets = partition_sends(sends.iter().map(SendProgress::from), &thresholds, now);
    tracing::info!(
        name = "checks.campaign_send.evaluated",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        eligible = sends.len(),
        done = buckets.done.len(),
        warning = buckets.warning.len(),
        alarm = buckets.alarm.len(),
        pending = buckets.pending,
        message = "Evaluated campaign sends"
    );

    for state in [SendState::Done, SendState::Warning, SendState::Alarm] {
        update_send_state(db, buckets.ids(state), state).await?;
    }

    let mut summary = CampaignSendSummary {
        eligible: sends.len(),
        buckets,
        alert_raised: false,
        escalated: false,
    };

    match decide_alert(&summary.buckets) {
        AlertDecision::Close => {
            alerts.close_open(AlertKind::MultipleCampaignSendDelay).await?;
        }
        AlertDecision::Raise { escalate } => {
            let mut delayed = summary.buckets.warning.clone();
            delayed.extend(summary.buckets.alarm.iter().cloned());
            let detail = format!(
                "View campaign send statuses on Carta: {status_page_url}\nIncomplete nl_send ids: {}",
                delayed.join(", ")
            );
            alerts
                .create(AlertKind::MultipleCampaignSendDelay, Some(detail))
                .await?;
            summary.alert_raised = true;
            if escalate {
                alerts
                    .escalate(AlertKind::MultipleCampaignSendDelay, Priority::P0)
                    .await?;
                summary.escalated = true;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn thresholds() -> CompletionThresholds {
        CompletionThresholds {
            sends_per_segment: 1_000,
            minutes_per_segment: 10,
            success_ratio_threshold: 0.9,
            escalation_minutes: 60,
        }
    }

    #[test]
    fn grace_period_grows_per_full_segment() {
        let t = thresholds();
        assert_eq!(t.warn_minutes(1), 10);
        assert_eq!(t.warn_minutes(999), 10);
        assert_eq!(t.warn_minutes(1_000), 20);
        assert_eq!(t.alarm_minutes(2_500), 90);
    }

    #[test]
    fn boundary_is_exclusive() {
        let scheduled = datetime!(2024-05-01 12:00 UTC);
        let send = SendProgress {
            id: "a",
            scheduled_send_time: scheduled,
            sent_ok: 1,
            sent_err: 9,
        };
        let t = thresholds();
        assert_eq!(
            evaluate_send(send, &t, scheduled + time::Duration::minutes(10)),
            None
        );
        assert_eq!(
            evaluate_send(send, &t, scheduled + time::Duration::minutes(70))
                .map(|v| v.state),
            Some(SendState::Warning)
        );
    }

    #[test]
    fn elapsed_is_absolute() {
        let scheduled = datetime!(2024-05-01 12:00 UTC);
        let send = SendProgress {
            id: "future",
            scheduled_send_time: scheduled,
            sent_ok: 0,
            sent_err: 5,
        };
        let verdict = evaluate_send(send, &thresholds(), scheduled - time::Duration::minutes(15));
        assert_eq!(verdict.map(|v| v.state), Some(SendState::Warning));
    }

    #[test]
    fn decision_table() {
        let mut buckets = SendBuckets::default();
        assert_eq!(decide_alert(&buckets), AlertDecision::Close);
        buckets.warning.push("a".into());
        assert_eq!(decide_alert(&buckets), AlertDecision::Close);
        buckets.warning.push("b".into());
        assert_eq!(
            decide_alert(&buckets),
            AlertDecision::Raise { escalate: false }
        );
        buckets.warning.clear();
        buckets.alarm.push("c".into());
        assert_eq!(
            decide_alert(&buckets),
            AlertDecision::Raise { escalate: true }
        );
    }
}
