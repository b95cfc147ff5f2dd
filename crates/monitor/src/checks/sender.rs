//! Canary email through the nonpersonalized sender endpoint.

use crate::alerts::{AlertKind, AlertSink};
use crate::checks::ProbeOutcome;
use crate::client::http::HttpClient;
use crate::config::SenderConfig;
use crate::error::MonitorError;
use crate::secrets::{SecretCache, SecretKey};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SenderResponse {
    status: Option<String>,
}

pub fn canary_message(sender: &SenderConfig) -> serde_json::Value {
    let html = "<html><body>Example Test Email: [[ email ]]</body></html>";
    json!({
        "subject": "[[ \"example\" | capitalize ]] test email send from carta-monitor to [[ email ]]",
        "from": sender.from_email,
        "textBody": "[[ \"example\" | capitalize ]]",
        "to": [{ "email": sender.recipient_email }],
        "body": STANDARD.encode(html),
    })
}

async fn send_canary(
    http: &HttpClient,
    secrets: &SecretCache,
    sender: &SenderConfig,
) -> Result<(), String> {
    let key = secrets
        .get(SecretKey::SenderAccessKey)
        .map_err(|e| e.to_string())?;
    let authorization = format!("Bearer {key}");
    let response = http
        .post_json(
            &sender.nonpersonalized_url,
            Some(&authorization),
            canary_message(sender),
        )
        .await
        .map_err(|e| e.to_string())?;

    if !response.is_success() {
        return Err(format!(
            "Sender returned HTTP {}: {}",
            response.status,
            response.text_snippet()
        ));
    }
    match response.json::<SenderResponse>() {
        Ok(SenderResponse { status: Some(status) }) if status != "success" => {
            Err(format!("Sender reported status {status}"))
        }
        _ => Ok(()),
    }
}

#[tracing::instrument(skip_all)]
pub async fn probe_sender<A: AlertSink>(
    http: &HttpClient,
    secrets: &SecretCache,
    alerts: &A,
    sender: &SenderConfig,
) -> Result<ProbeOutcome, MonitorError> {
    match send_canary(http, secrets, sender).await {
        Ok(()) => {
            alerts.close_open(AlertKind::CartaSender).await?;
            Ok(ProbeOutcome::healthy())
        }
        Err(reason) => {
            tracing::error!(
                name = "checks.sender.failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %reason,
                message = "Sender canary failed"
            );
            alerts
                .create(AlertKind::CartaSender, Some(reason.clone()))
                .await?;
            Ok(ProbeOutcome::failed(reason))
        }
    }
}
