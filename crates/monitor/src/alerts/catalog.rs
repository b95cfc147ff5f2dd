//! Every alert the monitor can raise, keyed by a stable alias.
//!
//! The alias doubles as the deduplication key on the alerting side: creating
//! an alert whose alias is already open only refreshes it.

use crate::config::AppConfig;
use crate::entity::nl_send::SendCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    /// Least urgent priority; every alert outside production is sent with it.
    pub const LOWEST: Priority = Priority::P3;

    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AlertKind {
    ScheduleTransactionalSend,
    SchedulePersonalizedSend,
    ScheduleNonpersonalizedSend,
    AlertSend,
    TransactionalSendDelay,
    PersonalizedSendDelay,
    NonPersonalizedSendDelay,
    AlertSendDelay,
    MetricsProcessingAboveThreshold,
    FileDownloadProcessingDelay,
    AutomaticDynamicList,
    ScheduledDynamicList,
    MultipleCampaignSendDelay,
    CartaSender,
    CartaMonitorError,
}

impl AlertKind {
    pub const ALL: [AlertKind; 15] = [
        AlertKind::ScheduleTransactionalSend,
        AlertKind::SchedulePersonalizedSend,
        AlertKind::ScheduleNonpersonalizedSend,
        AlertKind::AlertSend,
        AlertKind::TransactionalSendDelay,
        AlertKind::PersonalizedSendDelay,
        AlertKind::NonPersonalizedSendDelay,
        AlertKind::AlertSendDelay,
        AlertKind::MetricsProcessingAboveThreshold,
        AlertKind::FileDownloadProcessingDelay,
        AlertKind::AutomaticDynamicList,
        AlertKind::ScheduledDynamicList,
        AlertKind::MultipleCampaignSendDelay,
        AlertKind::CartaSender,
        AlertKind::CartaMonitorError,
    ];

    /// Alias used as the alert identifier on the alerting side.
    pub const fn alias(self) -> &'static str {
        match self {
            AlertKind::ScheduleTransactionalSend => "Schedule_Transactional_Send",
            AlertKind::SchedulePersonalizedSend => "Schedule_Personalized_Send",
            AlertKind::ScheduleNonpersonalizedSend => "Schedule_Nonpersonalized_Send",
            AlertKind::AlertSend => "Alert_Send",
            AlertKind::TransactionalSendDelay => "Transactional_Send_Delay",
            AlertKind::PersonalizedSendDelay => "Personalized_Send_Delay",
            AlertKind::NonPersonalizedSendDelay => "NonPersonalized_Send_Delay",
            AlertKind::AlertSendDelay => "Alert_Send_Delay",
            AlertKind::MetricsProcessingAboveThreshold => "Metrics_Processing_Above_Threshold",
            AlertKind::FileDownloadProcessingDelay => "File_Download_Processing_Delay",
            AlertKind::AutomaticDynamicList => "Automatic_Dynamic_List",
            AlertKind::ScheduledDynamicList => "Scheduled_Dynamic_List",
            AlertKind::MultipleCampaignSendDelay => "Multiple_Campaign_Send_Delay",
            AlertKind::CartaSender => "Carta_Sender",
            AlertKind::CartaMonitorError => "Carta_Monitor_Error",
        }
    }

    /// Severity an alert is created with in production.
    pub const fn base_priority(self) -> Priority {
        match self {
            AlertKind::AlertSend
            | AlertKind::MultipleCampaignSendDelay
            | AlertKind::CartaSender => Priority::P1,
            AlertKind::CartaMonitorError => Priority::P3,
            _ => Priority::P2,
        }
    }

    /// Delay alert for a send category.
    pub const fn send_delay(category: SendCategory) -> AlertKind {
        match category {
            SendCategory::Transactional => AlertKind::TransactionalSendDelay,
            SendCategory::Personalized => AlertKind::PersonalizedSendDelay,
            SendCategory::Nonpersonalized => AlertKind::NonPersonalizedSendDelay,
            SendCategory::Alert => AlertKind::AlertSendDelay,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertDetails {
    pub priority: Priority,
    pub message: String,
    pub description: Option<String>,
}

/// Messages and description templates, rendered once from configuration.
#[derive(Clone, Debug)]
pub struct AlertCatalog {
    entries: HashMap<AlertKind, AlertDetails>,
}

impl AlertCatalog {
    pub fn from_config(config: &AppConfig) -> Self {
        let entries = AlertKind::ALL
            .iter()
            .map(|kind| (*kind, render(*kind, config)))
            .collect();
        Self { entries }
    }

    pub fn details(&self, kind: AlertKind) -> &AlertDetails {
        // Every kind is rendered in `from_config`.
        &self.entries[&kind]
    }
}

fn render(kind: AlertKind, config: &AppConfig) -> AlertDetails {
    let p2 = config.send_delay.p2_minutes;
    let p1 = config.send_delay.p1_minutes;
    let delay_description = |what: &str, campaign: &str, category: SendCategory| {
        format!(
            "1. Check {what}: {campaign}\n\
             2. Check nl_send records with filter {}, sorted by status_done_timestamp\n\
             \n\
             Note: Will escalate to P1 after {p1} minutes",
            category.filter_description()
        )
    };

    let (message, description) = match kind {
        AlertKind::ScheduleTransactionalSend => {
            ("Failed to schedule a transactional send".to_string(), None)
        }
        AlertKind::SchedulePersonalizedSend => {
            ("Failed to schedule a personalized send".to_string(), None)
        }
        AlertKind::ScheduleNonpersonalizedSend => {
            ("Failed to schedule a nonpersonalized send".to_string(), None)
        }
        AlertKind::AlertSend => ("Failed to send an alert send".to_string(), None),
        AlertKind::TransactionalSendDelay => (
            format!("Viewers have not received transactional emails in last {p2} minutes"),
            Some(delay_description(
                "Transactional Campaign",
                &config.campaigns.transactional_id,
                SendCategory::Transactional,
            )),
        ),
        AlertKind::PersonalizedSendDelay => (
            format!("Viewers have not received personalized emails in last {p2} minutes"),
            Some(delay_description(
                "Personalized Campaign",
                &config.campaigns.personalized_id,
                SendCategory::Personalized,
            )),
        ),
        AlertKind::NonPersonalizedSendDelay => (
            format!("Viewers have not received nonpersonalized emails in last {p2} minutes"),
            Some(delay_description(
                "Nonpersonalized Campaign",
                &config.campaigns.nonpersonalized_id,
                SendCategory::Nonpersonalized,
            )),
        ),
        AlertKind::AlertSendDelay => (
            format!("Viewers have not received alerts in last {p2} minutes"),
            Some(delay_description(
                "Alert Campaign",
                &config.campaigns.alert_campaign_name,
                SendCategory::Alert,
            )),
        ),
        AlertKind::MetricsProcessingAboveThreshold => (
            "Events collection is backed up".to_string(),
            Some(
                "Check if the metrics processor is running and progressing through entries in the events table"
                    .to_string(),
            ),
        ),
        AlertKind::FileDownloadProcessingDelay => (
            format!(
                "File download processing is delayed more than {} mins",
                config.file_download.threshold_minutes
            ),
            None,
        ),
        AlertKind::AutomaticDynamicList => (
            "Auto-running dynamic list(s) failed to run".to_string(),
            None,
        ),
        AlertKind::ScheduledDynamicList => {
            ("Scheduled dynamic list(s) failed to run".to_string(), None)
        }
        AlertKind::MultipleCampaignSendDelay => (
            "Email send of multiple campaigns is delayed.".to_string(),
            None,
        ),
        AlertKind::CartaSender => ("Carta-sender returning failed response".to_string(), None),
        AlertKind::CartaMonitorError => (
            "Carta-monitor threw an unexpected error".to_string(),
            None,
        ),
    };

    AlertDetails {
        priority: kind.base_priority(),
        message,
        description,
    }
}
