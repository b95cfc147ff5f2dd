//! Shared outbound HTTP client.
//!
//! All remote collaborators (alerting API, campaign service, sender and list
//! management endpoints) speak JSON over HTTPS. They share one pooled hyper
//! client and one rustls configuration.

use crate::error::HttpError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use once_cell::sync::OnceCell;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const USER_AGENT_VALUE: &str = concat!("carta-monitor/", env!("CARGO_PKG_VERSION"));

static TLS_CONFIG: OnceCell<Arc<ClientConfig>> = OnceCell::new();

/// Get the shared TLS client configuration, building the root store once.
pub fn get_shared_tls_config() -> Arc<ClientConfig> {
    TLS_CONFIG
        .get_or_init(|| {
            if CryptoProvider::get_default().is_none() {
                let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            }

            let mut root_cert_store = RootCertStore::empty();
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();

            Arc::new(config)
        })
        .clone()
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as text for error messages, capped so a stray HTML page does not
    /// flood the logs.
    pub fn text_snippet(&self) -> String {
        const LIMIT: usize = 512;
        let text = String::from_utf8_lossy(&self.body);
        match text.char_indices().nth(LIMIT) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.into_owned(),
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client whose requests (including reading the body) give up
    /// after `timeout`. Plain `http` URLs are accepted.
    pub fn new(timeout: Duration) -> Self {
        let tls = (*get_shared_tls_config()).clone();
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let inner = Client::builder(TokioExecutor::new()).build(https);
        Self { inner, timeout }
    }

    #[tracing::instrument(name = "http_request", level = "debug", skip(self, authorization, body))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        authorization: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse, HttpError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        let payload = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(serde_json::to_vec(&value)?)
            }
            None => Bytes::new(),
        };
        let request = builder
            .body(Full::new(payload))
            .map_err(|e| HttpError::InvalidRequest {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = timeout(self.timeout, self.inner.request(request))
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = response.status();
        let body = timeout(self.timeout, response.into_body().collect())
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
            .map_err(|e| HttpError::Network(e.to_string()))?
            .to_bytes();

        tracing::debug!(status = %status, bytes = body.len(), "HTTP response received");
        Ok(HttpResponse { status, body })
    }

    pub async fn post_json(
        &self,
        url: &str,
        authorization: Option<&str>,
        body: serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        self.execute(Method::POST, url, authorization, Some(body))
            .await
    }
}
