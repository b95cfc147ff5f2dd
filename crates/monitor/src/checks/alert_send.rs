//! End-to-end probe of the alert send path through list management.

use crate::alerts::{AlertKind, AlertSink};
use crate::checks::ProbeOutcome;
use crate::client::http::HttpClient;
use crate::config::{CampaignsConfig, ListManagementConfig};
use crate::error::MonitorError;
use crate::secrets::{SecretCache, SecretKey};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
struct SendAlertResponse {
    success: Option<String>,
}

/// Request body asking list management to send the canary alert now.
pub fn send_alert_body(campaigns: &CampaignsConfig, now: OffsetDateTime) -> serde_json::Value {
    json!({
        "campaign_name": campaigns.alert_campaign_name,
        "send_time": (now.unix_timestamp_nanos() / 1_000_000) as i64,
        "variables": {
            "emailList": [campaigns.alert_email_list],
            "literalJson": { "ln": "Carta", "fn": "Monitor" },
        },
    })
}

async fn send_test_alert(
    http: &HttpClient,
    secrets: &SecretCache,
    list_management: &ListManagementConfig,
    campaigns: &CampaignsConfig,
    now: OffsetDateTime,
) -> Result<(), String> {
    let token = secrets
        .get(SecretKey::ListManagementToken)
        .map_err(|e| e.to_string())?;
    let authorization = format!("Bearer {token}");
    let response = http
        .post_json(
            &list_management.send_alert_url,
            Some(&authorization),
            send_alert_body(campaigns, now),
        )
        .await
        .map_err(|e| e.to_string())?;

    if !response.is_success() {
        return Err(format!(
            "{} returned HTTP {}: {}",
            list_management.send_alert_url,
            response.status,
            response.text_snippet()
        ));
    }
    // Older deployments answer with an empty body.
    match response.json::<SendAlertResponse>() {
        Ok(SendAlertResponse {
            success: Some(result),
        }) if result != "success" => Err(format!(
            "{} reported {result}",
            list_management.send_alert_url
        )),
        _ => Ok(()),
    }
}

#[tracing::instrument(skip_all)]
pub async fn probe_alert_send<A: AlertSink>(
    http: &HttpClient,
    secrets: &SecretCache,
    alerts: &A,
    list_management: &ListManagementConfig,
    campaigns: &CampaignsConfig,
    now: OffsetDateTime,
) -> Result<ProbeOutcome, MonitorError> {
    match send_test_alert(http, secrets, list_management, campaigns, now).await {
        Ok(()) => {
            tracing::info!(
                name = "checks.alert_send.ok",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                message = "Successfully sent alert"
            );
            alerts.close_open(AlertKind::AlertSend).await?;
            Ok(ProbeOutcome::healthy())
        }
        Err(reason) => {
            tracing::error!(
                name = "checks.alert_send.failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %reason,
                message = "Failed to send alert"
            );
            alerts
                .create(AlertKind::AlertSend, Some(reason.clone()))
                .await?;
            Ok(ProbeOutcome::failed(reason))
        }
    }
}
