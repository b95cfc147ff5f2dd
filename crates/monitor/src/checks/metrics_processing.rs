//! Backlog check on the metrics `events` table.

use crate::alerts::{AlertKind, AlertSink};
use crate::entity::event;
use crate::error::MonitorError;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsBacklog {
    pub events: u64,
    pub threshold: u64,
    pub above_threshold: bool,
}

#[tracing::instrument(skip(db, alerts))]
pub async fn check_metrics_processing<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    threshold: u64,
) -> Result<MetricsBacklog, MonitorError> {
    let events = event::Entity::find().count(db).await?;
    let above_threshold = events >= threshold;

    if above_threshold {
        tracing::warn!(
            name = "checks.metrics_processing.backlog",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            events,
            threshold,
            message = "Events table is above the backlog threshold"
        );
        alerts
            .create(
                AlertKind::MetricsProcessingAboveThreshold,
                Some(format!("{events} pending events (threshold {threshold})")),
            )
            .await?;
    } else {
        alerts
            .close_open(AlertKind::MetricsProcessingAboveThreshold)
            .await?;
    }

    Ok(MetricsBacklog {
        events,
        threshold,
        above_threshold,
    })
}
