//! Detects file downloads stuck in the `submitted` state.

use crate::alerts::{AlertKind, AlertSink};
use crate::entity::file_download::{self, STATUS_SUBMITTED};
use crate::error::MonitorError;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StalledDownloads {
    /// `list: <name> user: <user>` per stalled download.
    pub stalled: Vec<String>,
}

pub async fn find_stalled_downloads(
    db: &DatabaseConnection,
    threshold: Duration,
    now: OffsetDateTime,
) -> Result<Vec<file_download::Model>, MonitorError> {
    let cutoff = now - threshold;
    let rows = file_download::Entity::find()
        .filter(file_download::Column::Status.eq(STATUS_SUBMITTED))
        .filter(file_download::Column::CreatedTime.lte(cutoff))
        .order_by_asc(file_download::Column::CreatedTime)
        .all(db)
        .await?;
    Ok(rows)
}

#[tracing::instrument(skip(db, alerts))]
pub async fn check_file_downloads<A: AlertSink>(
    db: &DatabaseConnection,
    alerts: &A,
    threshold: Duration,
    now: OffsetDateTime,
) -> Result<StalledDownloads, MonitorError> {
    let rows = find_stalled_downloads(db, threshold, now).await?;
    if rows.is_empty() {
        alerts
            .close_open(AlertKind::FileDownloadProcessingDelay)
            .await?;
        return Ok(StalledDownloads::default());
    }

    let stalled: Vec<String> = rows
        .iter()
        .map(|row| format!("list: {} user: {}", row.list_name, row.user_name))
        .collect();
    let detail = format!(
        "{} file(s) currently processing: {}",
        stalled.len(),
        stalled.join(", ")
    );
    tracing::warn!(
        name = "checks.file_download.stalled",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        count = stalled.len(),
        message = "File downloads stuck in submitted state"
    );
    alerts
        .create(AlertKind::FileDownloadProcessingDelay, Some(detail))
        .await?;

    Ok(StalledDownloads { stalled })
}
