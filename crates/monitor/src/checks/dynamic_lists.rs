//! Detects dynamic lists that did not run when they should have.
//!
//! Lists refresh once a day. The check looks at a fifteen minute slice a day
//! and a bit ago: a list last updated in that slice, and due again in it,
//! has missed its run.

use crate::alerts::{AlertKind, AlertSink};
use crate::entity::lm_list::{self, LIST_TYPE_DYNAMIC, SEARCH_BACKEND_FAILURE};
use crate::error::MonitorError;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};
use utoipa::ToSchema;

/// Window of `updated_time` values, plus the same bounds as `HHmm` strings
/// for comparing against `autorun_time`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct QueryWindow {
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub end: OffsetDateTime,
    pub start_hhmm: String,
    /// Midnight is `2400` so the half-open range stays ordered.
    pub end_hhmm: String,
}

pub fn most_recent_quarter_hour(now: OffsetDateTime) -> OffsetDateTime {
    now - Duration::minutes(i64::from(now.minute() % 15))
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()))
}

fn hhmm(at: OffsetDateTime) -> String {
    format!("{:02}{:02}", at.hour(), at.minute())
}

/// Compute the window in the list scheduler's wall clock.
pub fn query_window(now: OffsetDateTime, offset: UtcOffset) -> QueryWindow {
    let quarter = most_recent_quarter_hour(now.to_offset(offset));
    let start = quarter - Duration::hours(25) - Duration::minutes(45);
    let end = quarter - Duration::hours(25) - Duration::minutes(30);

    let mut end_hhmm = hhmm(end);
    if end_hhmm == "0000" {
        end_hhmm = "2400".to_string();
    }

    QueryWindow {
        start,
        end,
        start_hhmm: hhmm(start),
        end_hhmm,
    }
}

fn tardy_condition(window: &QueryWindow) -> Condition {
    Condition::all()
        .add(lm_list::Column::ListType.eq(LIST_TYPE_DYNAMIC))
        .add(lm_list::Column::Enabled.eq(true))
        .add(lm_list::Column::Autorun.eq(true))
        .add(
            Condition::any()
                .add(lm_list::Column::Message.is_null())
                .add(lm_list::Column::Message.not_like(format!("%{SEARCH_BACKEND_FAILURE}%"))),
        )
        .add(lm_list::Column::UpdatedTime.gte(window.start.to_offset(UtcOffset::UTC)))
        .add(lm_list::Column::UpdatedTime.lt(window.end.to_offset(UtcOffset::UTC)))
}

pub async fn find_tardy_automatic_lists(
    db: &DatabaseConnection,
    window: &QueryWindow,
) -> Result<Vec<lm_list::Model>, MonitorError> {
    let lists = lm_list::Entity::find()
        .filter(tardy_condition(window))
        .filter(
            Condition::any()
                .add(lm_list::Column::AutorunTime.is_null())
                .add(lm_list::Column::AutorunTime.eq("")),
        )
        .order_by_asc(lm_list::Column::Name)
        .all(db)
        .await?;
    Ok(lists)
}

pub async fn find_tardy_scheduled_lists(
    db: &DatabaseConnection,
    window: &QueryWindow,
) -> Result<Vec<lm_list::Model>, MonitorError> {
    let lists = lm_list::Entity::find()
        .filter(tardy_condition(window))
        .filter(lm_list::Column::AutorunTime.is_not_null())
        .filter(lm_list::Column::AutorunTime.ne(""))
        .filter(lm_list::Column::AutorunTime.gte(window.start_hhmm.as_str()))
        .filter(lm_list::Column::AutorunTime.lt(window.end_hhmm.as_str()))
        .order_by_asc(lm_list::Column::Name)
        .all(db)
        .await?;
    Ok(lists)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct DynamicListReport {
    pub window: QueryWindow,
    pub automatic: Vec<String>,
    pub scheduled: Vec<String>,
}

async fn raise_or_close<A: AlertSink>(
    alerts: &A,
    kind: AlertKind,
    prefix: &str,
    names: &[String],
) -> Result<(), MonitorError> {
    if names.is_empty() {
        alerts.close_open(kind).await?;
        return Ok(());
    }

    let detail = format!("{prefix}: {}", names.join(","));
    tracing::warn!(
        name = "checks.dynamic_lists.tardy",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        alias = kind.alias(),
        lists = %names.join(","),
        message = "Dynamic lists missed their run"
    );
    alerts.create(kind, Some(detail)).await?;
    Ok(())
}

#[tracing::instrument(skip(db, alerts))]
pub async fn check_dynamic_lists<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<DynamicListReport, MonitorError> {
    let window = query_window(now, offset);

    let automatic: Vec<String> = find_tardy_automatic_lists(db, &window)
        .await?
        .into_iter()
        .map(|list| list.name)
        .collect();
    raise_or_close(
        alerts,
        AlertKind::AutomaticDynamicList,
        "Auto-running dynamic list(s) failed to run",
        &automatic,
    )
    .await?;

    let scheduled: Vec<String> = find_tardy_scheduled_lists(db, &window)
        .await?
        .into_iter()
        .map(|list| list.name)
        .collect();
    raise_or_close(
        alerts,
        AlertKind::ScheduledDynamicList,
        "Scheduled dynamic list(s) failed to run",
        &scheduled,
    )
    .await?;

    Ok(DynamicListReport {
        window,
        automatic,
        scheduled,
    })
}
