//! Detects categories that have stopped delivering.
//!
//! For each send category the most recently completed send is looked up; the
//! longer ago it finished, the louder the category's delay alert.

use crate::alerts::{AlertKind, AlertSink, Priority};
use crate::config::SendDelayConfig;
use crate::entity::nl_send::{self, SendCategory};
use crate::error::MonitorError;
use futures::future::join_all;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayThresholds {
    pub p2: Duration,
    pub p1: Duration,
}

impl From<&SendDelayConfig> for DelayThresholds {
    fn from(config: &SendDelayConfig) -> Self {
        Self {
            p2: Duration::minutes(config.p2_minutes),
            p1: Duration::minutes(config.p1_minutes),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DelayVerdict {
    /// Finished recently enough; any open delay alert is closed.
    Healthy,
    /// Past the lower threshold; the alert is opened at its catalog priority.
    Delayed,
    /// Past the upper threshold; the alert is opened and escalated to P1.
    Critical,
}

/// Classify how long ago the last send of a category completed.
pub fn evaluate_delay(
    completed_at: OffsetDateTime,
    now: OffsetDateTime,
    thresholds: &DelayThresholds,
) -> DelayVerdict {
    let elapsed = now - completed_at;
    if elapsed >= thresholds.p1 {
        DelayVerdict::Critical
    } else if elapsed >= thresholds.p2 {
        DelayVerdict::Delayed
    } else {
        DelayVerdict::Healthy
    }
}

pub async fn find_most_recent_send(
    db: &DatabaseConnection,
    category: SendCategory,
) -> Result<Option<nl_send::Model>, MonitorError> {
    let send = nl_send::Entity::find()
        .filter(category.condition())
        .filter(nl_send::Column::StatusDoneTimestamp.is_not_null())
        .order_by_desc(nl_send::Column::StatusDoneTimestamp)
        .one(db)
        .await?;
    Ok(send)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryDelay {
    pub category: SendCategory,
    /// `None` when the category has no completed send at all.
    pub verdict: Option<DelayVerdict>,
    pub minutes_since_last_send: Option<i64>,
}

async fn check_category<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    category: SendCategory,
    thresholds: &DelayThresholds,
    now: OffsetDateTime,
) -> Result<CategoryDelay, MonitorError> {
    let kind = AlertKind::send_delay(category);
    let Some(send) = find_most_recent_send(db, category).await? else {
        tracing::warn!(
            name = "checks.send_delay.no_completed_send",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            category = %category,
            message = "No completed send found for category; delay cannot be judged"
        );
        return Ok(CategoryDelay {
            category,
            verdict: None,
            minutes_since_last_send: None,
        });
    };

    // Filtered on non-null above.
    let Some(completed_at) = send.status_done_timestamp else {
        return Ok(CategoryDelay {
            category,
            verdict: None,
            minutes_since_last_send: None,
        });
    };

    let verdict = evaluate_delay(completed_at, now, thresholds);
    let minutes = (now - completed_at).whole_minutes();

    match verdict {
        DelayVerdict::Healthy => {
            alerts.close_open(kind).await?;
        }
        DelayVerdict::Delayed | DelayVerdict::Critical => {
            tracing::info!(
                name = "checks.send_delay.delayed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                category = %category,
                send_id = %send.id,
                minutes_since_last_send = minutes,
                verdict = ?verdict,
                message = "Category send is delayed"
            );
            let detail = format!(
                "Latest {category} send {} completed at {completed_at} ({minutes} minutes ago)",
                send.id
            );
            alerts.create(kind, Some(detail)).await?;
            if verdict == DelayVerdict::Critical {
                alerts.escalate(kind, Priority::P1).await?;
            }
        }
    }

    Ok(CategoryDelay {
        category,
        verdict: Some(verdict),
        minutes_since_last_send: Some(minutes),
    })
}

/// Check every category concurrently. All categories run to completion; the
/// first failure is returned afterwards.
#[tracing::instrument(skip_all)]
pub async fn check_send_delays<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    thresholds: &DelayThresholds,
    now: OffsetDateTime,
) -> Result<Vec<CategoryDelay>, MonitorError> {
    let results = join_all(
        SendCategory::ALL
            .into_iter()
            .map(|category| check_category(db, alerts, category, thresholds, now)),
    )
    .await;

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn thresholds_are_inclusive() {
        let thresholds = DelayThresholds {
            p2: Duration::minutes(15),
            p1: Duration::minutes(30),
        };
        let now = datetime!(2024-05-01 12:00 UTC);

        assert_eq!(
            evaluate_delay(now - Duration::minutes(14), now, &thresholds),
            DelayVerdict::Healthy
        );
        assert_eq!(
            evaluate_delay(now - Duration::minutes(15), now, &thresholds),
            DelayVerdict::Delayed
        );
        assert_eq!(
            evaluate_delay(now - Duration::minutes(30), now, &thresholds),
            DelayVerdict::Critical
        );
    }
}
