use crate::alerts::catalog::{AlertCatalog, AlertKind, Priority};
use crate::alerts::{AlertSink, compose_description};
use crate::client::http::{HttpClient, HttpResponse};
use crate::config::AppConfig;
use crate::error::AlertApiError;
use crate::secrets::{SecretCache, SecretKey};
use hyper::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const CLOSE_NOTE: &str = "Closing the alert via api called in carta-monitor";

#[derive(Debug, Deserialize)]
struct AlertLookup {
    data: Option<AlertLookupData>,
}

#[derive(Debug, Deserialize)]
struct AlertLookupData {
    count: Option<u64>,
}

/// Alert lifecycle client for an Opsgenie-compatible REST API.
#[derive(Debug, Clone)]
pub struct OpsGenieClient {
    http: HttpClient,
    base_url: String,
    environment_label: String,
    production: bool,
    local: bool,
    catalog: Arc<AlertCatalog>,
    secrets: Arc<SecretCache>,
}

impl OpsGenieClient {
    pub fn from_config(config: &AppConfig, http: HttpClient, secrets: Arc<SecretCache>) -> Self {
        Self {
            http,
            base_url: config.alerting.base_url.trim_end_matches('/').to_string(),
            environment_label: config.alerting.environment.to_uppercase(),
            production: config.is_production(),
            local: config.is_local,
            catalog: Arc::new(AlertCatalog::from_config(config)),
            secrets,
        }
    }

    /// Priority actually sent: everything outside production is lowest.
    pub fn effective_priority(&self, requested: Priority) -> Priority {
        if self.production {
            requested
        } else {
            Priority::LOWEST
        }
    }

    fn alias_url(&self, kind: AlertKind, suffix: &str) -> String {
        format!(
            "{}/{}{}?identifierType=alias",
            self.base_url,
            kind.alias(),
            suffix
        )
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse, AlertApiError> {
        let key = self.secrets.get(SecretKey::AlertingApiKey)?;
        let authorization = format!("GenieKey {key}");
        Ok(self
            .http
            .execute(method, url, Some(&authorization), body)
            .await?)
    }

    fn ensure_success(
        response: HttpResponse,
        operation: &'static str,
        kind: AlertKind,
    ) -> Result<HttpResponse, AlertApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(AlertApiError::Status {
                status: response.status,
                operation,
                alias: kind.alias(),
                body: response.text_snippet(),
            })
        }
    }

    #[tracing::instrument(skip(self), fields(alias = kind.alias()))]
    pub async fn is_open(&self, kind: AlertKind) -> Result<bool, AlertApiError> {
        let url = self.alias_url(kind, "");
        let response = self.request(Method::GET, &url, None).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = Self::ensure_success(response, "lookup", kind)?;
        let lookup: AlertLookup = response.json().map_err(AlertApiError::Http)?;
        Ok(lookup
            .data
            .and_then(|d| d.count)
            .is_some_and(|count| count > 0))
    }
}

impl AlertSink for OpsGenieClient {
    #[tracing::instrument(skip(self, detail), fields(alias = kind.alias()))]
    async fn create(&self, kind: AlertKind, detail: Option<String>) -> Result<(), AlertApiError> {
        let details = self.catalog.details(kind);
        let priority = self.effective_priority(details.priority);
        let message = format!("[{}] {}", self.environment_label, details.message);
        let description = compose_description(detail.as_deref(), details.description.as_deref());

        if self.local {
            tracing::info!(
                name = "alerts.create.local",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                alias = kind.alias(),
                priority = %priority,
                message = %message,
                description = %description,
            );
            return Ok(());
        }

        if priority != details.priority {
            tracing::debug!(
                alias = kind.alias(),
                from = %details.priority,
                to = %priority,
                "Lowering alert priority outside production"
            );
        }

        let body = json!({
            "message": message,
            "alias": kind.alias(),
            "description": description,
            "priority": priority,
        });
        let response = self
            .request(Method::POST, &self.base_url, Some(body))
            .await?;
        Self::ensure_success(response, "create", kind)?;

        tracing::info!(
            name = "alerts.created",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            alias = kind.alias(),
            priority = %priority,
            message = "Alert created"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(alias = kind.alias()))]
    async fn close_open(&self, kind: AlertKind) -> Result<bool, AlertApiError> {
        if self.local {
            tracing::info!(
                name = "alerts.close.local",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                alias = kind.alias(),
                message = "Would close alert if open"
            );
            return Ok(false);
        }

        if !self.is_open(kind).await? {
            tracing::debug!(alias = kind.alias(), "Alert not open, nothing to close");
            return Ok(false);
        }

        let url = self.alias_url(kind, "/close");
        let response = self
            .request(Method::POST, &url, Some(json!({ "note": CLOSE_NOTE })))
            .await?;
        Self::ensure_success(response, "close", kind)?;

        tracing::info!(
            name = "alerts.closed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            alias = kind.alias(),
            message = "Alert closed"
        );
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(alias = kind.alias()))]
    async fn escalate(&self, kind: AlertKind, priority: Priority) -> Result<(), AlertApiError> {
        let effective = self.effective_priority(priority);

        if self.local {
            tracing::info!(
                name = "alerts.escalate.local",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                alias = kind.alias(),
                priority = %effective,
                message = "Would escalate alert"
            );
            return Ok(());
        }

        let url = self.alias_url(kind, "");
        let response = self
            .request(Method::PATCH, &url, Some(json!({ "priority": effective })))
            .await?;
        Self::ensure_success(response, "escalate", kind)?;

        tracing::info!(
            name = "alerts.escalated",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            alias = kind.alias(),
            priority = %effective,
            message = "Alert escalated"
        );
        Ok(())
    }
}
