//! Campaign service client used by the send-scheduling check.

use crate::client::http::{HttpClient, HttpResponse};
use crate::error::CampaignServiceError;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendFinalStatus {
    Success,
    Failure,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLetterResponse {
    updated_doc_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendFinalResponse {
    status: SendFinalStatus,
}

/// The two campaign-service calls a canary send needs.
pub trait LetterService: Send + Sync {
    /// Create a letter on a campaign and return its id.
    fn create_letter(
        &self,
        name: &str,
        campaign_id: &str,
    ) -> impl Future<Output = Result<String, CampaignServiceError>> + Send;

    /// Schedule the letter for delivery at `send_at`.
    fn send_final(
        &self,
        letter_id: &str,
        campaign_id: &str,
        send_at: OffsetDateTime,
    ) -> impl Future<Output = Result<SendFinalStatus, CampaignServiceError>> + Send;
}

#[derive(Clone, Debug)]
pub struct CartaClient {
    http: HttpClient,
    base_url: String,
}

impl CartaClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn check_status(
        response: &HttpResponse,
        operation: &'static str,
    ) -> Result<(), CampaignServiceError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(CampaignServiceError::Status {
                status: response.status,
                operation,
                body: response.text_snippet(),
            })
        }
    }
}

impl LetterService for CartaClient {
    #[tracing::instrument(skip(self))]
    async fn create_letter(
        &self,
        name: &str,
        campaign_id: &str,
    ) -> Result<String, CampaignServiceError> {
        let url = format!("{}/letters", self.base_url);
        let response = self
            .http
            .post_json(&url, None, json!({ "name": name, "campaignId": campaign_id }))
            .await?;
        Self::check_status(&response, "create_letter")?;

        let parsed: CreateLetterResponse = response.json()?;
        match parsed.updated_doc_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(CampaignServiceError::InvalidResponse(
                "create_letter response carried no updatedDocId".into(),
            )),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn send_final(
        &self,
        letter_id: &str,
        campaign_id: &str,
        send_at: OffsetDateTime,
    ) -> Result<SendFinalStatus, CampaignServiceError> {
        let url = format!("{}/letters/{}/send", self.base_url, letter_id);
        let send_time_ms = (send_at.unix_timestamp_nanos() / 1_000_000) as i64;
        let response = self
            .http
            .post_json(
                &url,
                None,
                json!({
                    "campaignId": campaign_id,
                    "sendType": "scheduled",
                    "sendTimes": [send_time_ms],
                }),
            )
            .await?;
        Self::check_status(&response, "send_final")?;

        let parsed: SendFinalResponse = response.json()?;
        Ok(parsed.status)
    }
}
