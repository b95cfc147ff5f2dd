use hyper::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret {0} was not found")]
    NotFound(&'static str),
    #[error("Secret {0} is empty")]
    Empty(&'static str),
    #[error("Failed to read secret {name}: {reason}")]
    Unreadable { name: &'static str, reason: String },
    #[error("Secret source misconfigured: {0}")]
    Misconfigured(String),
}

#[derive(Debug, Error)]
pub enum AlertApiError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("Alerting API returned HTTP {status} for {operation} of {alias}: {body}")]
    Status {
        status: StatusCode,
        operation: &'static str,
        alias: &'static str,
        body: String,
    },
}

#[derive(Debug, Error)]
pub enum CampaignServiceError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("Campaign service returned HTTP {status} for {operation}: {body}")]
    Status {
        status: StatusCode,
        operation: &'static str,
        body: String,
    },
    #[error("Campaign service rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
    #[error("Unexpected campaign service response: {0}")]
    InvalidResponse(String),
}

/// Anything that can abort a single monitor invocation.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Alert(#[from] AlertApiError),
    #[error(transparent)]
    CampaignService(#[from] CampaignServiceError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl MonitorError {
    /// Whether the next scheduled tick has a reasonable chance of succeeding
    /// without anyone touching configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MonitorError::Database(DbErr::Conn(_))
                | MonitorError::Database(DbErr::ConnectionAcquire(_))
                | MonitorError::Http(HttpError::Timeout(_))
                | MonitorError::Http(HttpError::Network(_))
                | MonitorError::Alert(AlertApiError::Http(HttpError::Timeout(_)))
                | MonitorError::Alert(AlertApiError::Http(HttpError::Network(_)))
                | MonitorError::CampaignService(CampaignServiceError::Http(
                    HttpError::Timeout(_)
                ))
                | MonitorError::CampaignService(CampaignServiceError::Http(
                    HttpError::Network(_)
                ))
        )
    }
}
