//! The monitoring checks and the watchdog every invocation runs under.
//!
//! ## Submodules
//!
//! - `campaign_send` - send-state evaluation and the batch campaign send monitor
//! - `send_delay` - per-category delivery delay detection
//! - `send_scheduling` - canary letters through the campaign service
//! - `metrics_processing` - events backlog
//! - `file_download` - stalled file downloads
//! - `dynamic_lists` - dynamic lists that missed their run
//! - `alert_send` - alert send probe through list management
//! - `sender` - sender endpoint probe

pub mod alert_send;
pub mod campaign_send;
pub mod dynamic_lists;
pub mod file_download;
pub mod metrics_processing;
pub mod send_delay;
pub mod send_scheduling;
pub mod sender;

use crate::MonitorResources;
use crate::alerts::{AlertKind, AlertSink};
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;

pub use campaign_send::CampaignSendSummary;
pub use dynamic_lists::DynamicListReport;
pub use file_download::StalledDownloads;
pub use metrics_processing::MetricsBacklog;
pub use send_delay::CategoryDelay;
pub use send_scheduling::ScheduledLetter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    CampaignSend,
    SendDelay,
    SendScheduling,
    MetricsProcessing,
    FileDownloadProcessing,
    DynamicListProcessing,
    AlertSend,
    Sender,
}

impl CheckName {
    pub const ALL: [CheckName; 8] = [
        CheckName::CampaignSend,
        CheckName::SendDelay,
        CheckName::SendScheduling,
        CheckName::MetricsProcessing,
        CheckName::FileDownloadProcessing,
        CheckName::DynamicListProcessing,
        CheckName::AlertSend,
        CheckName::Sender,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CheckName::CampaignSend => "campaign_send",
            CheckName::SendDelay => "send_delay",
            CheckName::SendScheduling => "send_scheduling",
            CheckName::MetricsProcessing => "metrics_processing",
            CheckName::FileDownloadProcessing => "file_download_processing",
            CheckName::DynamicListProcessing => "dynamic_list_processing",
            CheckName::AlertSend => "alert_send",
            CheckName::Sender => "sender",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            CheckName::CampaignSend => "Evaluate recent campaign sends and persist their send state",
            CheckName::SendDelay => "Alert when a send category has not delivered recently",
            CheckName::SendScheduling => "Schedule a canary letter on each campaign",
            CheckName::MetricsProcessing => "Alert when the events backlog is above threshold",
            CheckName::FileDownloadProcessing => "Alert on file downloads stuck in submitted state",
            CheckName::DynamicListProcessing => "Alert on dynamic lists that missed their run",
            CheckName::AlertSend => "Send a test alert through list management",
            CheckName::Sender => "Send a canary email through the sender endpoint",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown check: {0}")]
pub struct UnknownCheck(pub String);

impl FromStr for CheckName {
    type Err = UnknownCheck;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckName::ALL
            .into_iter()
            .find(|check| check.as_str() == s)
            .ok_or_else(|| UnknownCheck(s.to_string()))
    }
}

/// Result of a probe-style check. A failed probe raises its alert but does
/// not fail the invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: Some(reason.into()),
        }
    }
}

/// What a successful invocation found.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckReport {
    CampaignSend(CampaignSendSummary),
    SendDelay(Vec<CategoryDelay>),
    SendScheduling(Vec<ScheduledLetter>),
    MetricsProcessing(MetricsBacklog),
    FileDownloadProcessing(StalledDownloads),
    DynamicListProcessing(DynamicListReport),
    AlertSend(ProbeOutcome),
    Sender(ProbeOutcome),
}

/// Run one check to completion against the shared resources.
pub async fn run_check(
    resources: &MonitorResources,
    check: CheckName,
) -> Result<CheckReport, MonitorError> {
    let config = &resources.config;
    let db = resources.db.as_ref();
    let alerts = resources.alerts.as_ref();
    let now = OffsetDateTime::now_utc();

    let report = match check {
        CheckName::CampaignSend => CheckReport::CampaignSend(
            campaign_send::check_campaign_sends(
                db,
                alerts,
                &config.campaign_send,
                &config.carta.status_page_url(),
                now,
            )
            .await?,
        ),
        CheckName::SendDelay => CheckReport::SendDelay(
            send_delay::check_send_delays(
                db,
                alerts,
                &send_delay::DelayThresholds::from(&config.send_delay),
                now,
            )
            .await?,
        ),
        CheckName::SendScheduling => CheckReport::SendScheduling(
            send_scheduling::schedule_canary_sends(
                resources.letters.as_ref(),
                alerts,
                &config.campaigns,
                now,
            )
            .await?,
        ),
        CheckName::MetricsProcessing => CheckReport::MetricsProcessing(
            metrics_processing::check_metrics_processing(
                db,
                alerts,
                config.metrics.events_count_alert_threshold,
            )
            .await?,
        ),
        CheckName::FileDownloadProcessing => CheckReport::FileDownloadProcessing(
            file_download::check_file_downloads(
                db,
                alerts,
                Duration::minutes(config.file_download.threshold_minutes),
                now,
            )
            .await?,
        ),
        CheckName::DynamicListProcessing => CheckReport::DynamicListProcessing(
            dynamic_lists::check_dynamic_lists(
                db,
                alerts,
                config.dynamic_lists.utc_offset(),
                now,
            )
            .await?,
        ),
        CheckName::AlertSend => CheckReport::AlertSend(
            alert_send::probe_alert_send(
                &resources.http,
                &resources.secrets,
                alerts,
                &config.list_management,
                &config.campaigns,
                now,
            )
            .await?,
        ),
        CheckName::Sender => CheckReport::Sender(
            sender::probe_sender(&resources.http, &resources.secrets, alerts, &config.sender)
                .await?,
        ),
    };
    Ok(report)
}

/// Status and body of one invocation, as reported to the scheduler and the
/// HTTP API.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct InvocationOutcome {
    pub check: CheckName,
    pub invocation_id: Uuid,
    /// 200 on success, 500 when the check failed.
    pub status_code: u16,
    pub message: String,
    pub report: Option<CheckReport>,
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Run `work` under the watchdog.
///
/// A failure raises `Carta_Monitor_Error` naming the check and invocation and
/// yields a 500 outcome. A success closes that alert if it is open. Alert
/// errors inside the watchdog are logged, never propagated.
pub async fn run_guarded<A, F>(alerts: &A, check: CheckName, work: F) -> InvocationOutcome
where
    A: AlertSink,
    F: Future<Output = Result<CheckReport, MonitorError>>,
{
    let invocation_id = Uuid::new_v4();
    match work.await {
        Ok(report) => {
            if let Err(e) = alerts.close_open(AlertKind::CartaMonitorError).await {
                tracing::warn!(
                    name = "checks.watchdog.close_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    check = %check,
                    invocation_id = %invocation_id,
                    error = %e,
                    message = "Failed to close monitor error alert"
                );
            }
            tracing::info!(
                name = "checks.watchdog.succeeded",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                check = %check,
                invocation_id = %invocation_id,
                message = "Check completed"
            );
            InvocationOutcome {
                check,
                invocation_id,
                status_code: 200,
                message: "Success".to_string(),
                report: Some(report),
            }
        }
        Err(e) => {
            let detail = format!("Error from {check} ({invocation_id}): {e}");
            tracing::error!(
                name = "checks.watchdog.failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                check = %check,
                invocation_id = %invocation_id,
                retryable = e.is_retryable(),
                error = %e,
                message = "Check failed"
            );
            if let Err(alert_err) = alerts
                .create(AlertKind::CartaMonitorError, Some(detail.clone()))
                .await
            {
                tracing::error!(
                    name = "checks.watchdog.alert_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    check = %check,
                    invocation_id = %invocation_id,
                    error = %alert_err,
                    message = "Failed to raise monitor error alert"
                );
            }
            InvocationOutcome {
                check,
                invocation_id,
                status_code: 500,
                message: detail,
                report: None,
            }
        }
    }
}

/// Run one check under the watchdog with the shared resources, waiting for
/// a running invocation of the same check to finish first.
pub async fn invoke(resources: &MonitorResources, check: CheckName) -> InvocationOutcome {
    let _guard = resources.locks.acquire(check).await;
    run_guarded(resources.alerts.as_ref(), check, run_check(resources, check)).await
}

/// Like [`invoke`], but `None` if the check is already running.
pub async fn try_invoke(
    resources: &MonitorResources,
    check: CheckName,
) -> Option<InvocationOutcome> {
    let _guard = resources.locks.try_acquire(check)?;
    Some(run_guarded(resources.alerts.as_ref(), check, run_check(resources, check)).await)
}
