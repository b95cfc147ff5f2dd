//! Scheduled monitoring checks for the Carta email platform.
//!
//! Each check inspects the send store or a remote service, evaluates a small
//! threshold rule, and opens, escalates or closes an alert through an
//! Opsgenie-compatible API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex, MutexGuard};

use crate::alerts::OpsGenieClient;
use crate::checks::CheckName;
use crate::client::{CartaClient, HttpClient};
use crate::config::AppConfig;
use crate::secrets::SecretCache;

pub mod alerts;
pub mod api;
pub mod checks;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod scheduler;
pub mod secrets;

/// One lock per check so an invocation never overlaps a running one.
#[derive(Debug)]
pub struct CheckLocks {
    locks: HashMap<CheckName, Mutex<()>>,
}

impl Default for CheckLocks {
    fn default() -> Self {
        Self {
            locks: CheckName::ALL
                .into_iter()
                .map(|check| (check, Mutex::new(())))
                .collect(),
        }
    }
}

impl CheckLocks {
    pub async fn acquire(&self, check: CheckName) -> MutexGuard<'_, ()> {
        // Populated for every check in `default`.
        self.locks[&check].lock().await
    }

    /// `None` while the check is already running.
    pub fn try_acquire(&self, check: CheckName) -> Option<MutexGuard<'_, ()>> {
        self.locks[&check].try_lock().ok()
    }
}

/// Everything an invocation needs, built once at startup and shared.
#[derive(Clone, Debug)]
pub struct MonitorResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub secrets: Arc<SecretCache>,
    pub http: HttpClient,
    pub alerts: Arc<OpsGenieClient>,
    pub letters: Arc<CartaClient>,
    pub locks: Arc<CheckLocks>,
}

impl MonitorResources {
    /// Wire up the clients from configuration around an open connection.
    pub fn new(db: DatabaseConnection, config: AppConfig, secrets: Arc<SecretCache>) -> Self {
        let http = HttpClient::new(Duration::from_secs(config.alerting.request_timeout_secs));
        let alerts = Arc::new(OpsGenieClient::from_config(
            &config,
            http.clone(),
            secrets.clone(),
        ));
        let letters = Arc::new(CartaClient::new(http.clone(), &config.carta.api_base_url));
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            secrets,
            http,
            alerts,
            letters,
            locks: Arc::new(CheckLocks::default()),
        }
    }
}
