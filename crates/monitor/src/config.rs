use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use time::UtcOffset;

use crate::checks::CheckName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Deployment stage. Only `prod` pages people; every other stage is
    /// downgraded to the lowest alert priority.
    pub stage: String,
    /// Log alert mutations instead of sending them.
    #[serde(default)]
    pub is_local: bool,
    /// Connection string. A `{0}` placeholder is replaced by the
    /// `database_password` secret at startup.
    pub database_url: String,
    pub alerting: AlertingConfig,
    pub campaign_send: CampaignSendConfig,
    pub send_delay: SendDelayConfig,
    pub campaigns: CampaignsConfig,
    pub metrics: MetricsConfig,
    pub file_download: FileDownloadConfig,
    #[serde(default)]
    pub dynamic_lists: DynamicListsConfig,
    pub carta: CartaConfig,
    pub sender: SenderConfig,
    pub list_management: ListManagementConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AlertingConfig {
    #[serde(default = "default_alerting_base_url")]
    pub base_url: String,
    /// Label prefixed to every alert message, e.g. `[SANDBOX]`.
    pub environment: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CampaignSendConfig {
    pub sends_per_segment: u64,
    pub minutes_per_segment: u64,
    pub success_ratio_threshold: f64,
    #[serde(default = "default_escalation_minutes")]
    pub escalation_minutes: u64,
    #[serde(default = "default_min_send_size")]
    pub min_send_size: i64,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SendDelayConfig {
    pub p2_minutes: i64,
    pub p1_minutes: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CampaignsConfig {
    pub transactional_id: String,
    pub personalized_id: String,
    pub nonpersonalized_id: String,
    pub alert_campaign_name: String,
    pub alert_email_list: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MetricsConfig {
    pub events_count_alert_threshold: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileDownloadConfig {
    pub threshold_minutes: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DynamicListsConfig {
    /// Offset of the list scheduler's wall clock from UTC. `autorun_time`
    /// values are `HHmm` strings in that clock.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl DynamicListsConfig {
    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes * 60).unwrap_or(UtcOffset::UTC)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CartaConfig {
    pub api_base_url: String,
    pub ui_base_url: String,
}

impl CartaConfig {
    pub fn status_page_url(&self) -> String {
        format!("{}/status", self.ui_base_url.trim_end_matches('/'))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SenderConfig {
    pub nonpersonalized_url: String,
    pub from_email: String,
    pub recipient_email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListManagementConfig {
    pub send_alert_url: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecretSourceKind {
    #[default]
    Env,
    Directory,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub source: SecretSourceKind,
    /// Root for the `directory` source; secrets live in `<directory>/<namespace>/<name>`.
    pub directory: Option<PathBuf>,
}

/// Per-check run intervals in seconds. Zero disables the background loop for
/// that check; it can still be triggered over HTTP or from the command line.
#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_five_minutes")]
    pub campaign_send_secs: u64,
    #[serde(default = "default_five_minutes")]
    pub send_delay_secs: u64,
    #[serde(default = "default_fifteen_minutes")]
    pub send_scheduling_secs: u64,
    #[serde(default = "default_five_minutes")]
    pub metrics_processing_secs: u64,
    #[serde(default = "default_five_minutes")]
    pub file_download_processing_secs: u64,
    #[serde(default = "default_fifteen_minutes")]
    pub dynamic_list_processing_secs: u64,
    #[serde(default = "default_fifteen_minutes")]
    pub alert_send_secs: u64,
    #[serde(default = "default_fifteen_minutes")]
    pub sender_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            campaign_send_secs: default_five_minutes(),
            send_delay_secs: default_five_minutes(),
            send_scheduling_secs: default_fifteen_minutes(),
            metrics_processing_secs: default_five_minutes(),
            file_download_processing_secs: default_five_minutes(),
            dynamic_list_processing_secs: default_fifteen_minutes(),
            alert_send_secs: default_fifteen_minutes(),
            sender_secs: default_fifteen_minutes(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval_for(&self, check: CheckName) -> Option<Duration> {
        let secs = match check {
            CheckName::CampaignSend => self.campaign_send_secs,
            CheckName::SendDelay => self.send_delay_secs,
            CheckName::SendScheduling => self.send_scheduling_secs,
            CheckName::MetricsProcessing => self.metrics_processing_secs,
            CheckName::FileDownloadProcessing => self.file_download_processing_secs,
            CheckName::DynamicListProcessing => self.dynamic_list_processing_secs,
            CheckName::AlertSend => self.alert_send_secs,
            CheckName::Sender => self.sender_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_alerting_base_url() -> String {
    "https://api.opsgenie.com/v2/alerts".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_escalation_minutes() -> u64 {
    60
}

fn default_min_send_size() -> i64 {
    100
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_five_minutes() -> u64 {
    5 * 60
}

fn default_fifteen_minutes() -> u64 {
    15 * 60
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.stage.eq_ignore_ascii_case("prod")
    }

    /// Namespace used by stage-scoped secret sources.
    pub fn secret_namespace(&self) -> &'static str {
        if self.is_production() {
            "prod"
        } else {
            "sandbox"
        }
    }

    pub fn database_url_needs_password(&self) -> bool {
        self.database_url.contains("{0}")
    }

    pub fn database_url_with_password(&self, password: &str) -> String {
        self.database_url.replace("{0}", password)
    }

    /// Reject settings that would make every check misbehave. Called by
    /// [`load_config`]; exposed for configs built by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("stage", &self.stage),
            ("database_url", &self.database_url),
            ("alerting.base_url", &self.alerting.base_url),
            ("alerting.environment", &self.alerting.environment),
            ("campaigns.transactional_id", &self.campaigns.transactional_id),
            ("campaigns.personalized_id", &self.campaigns.personalized_id),
            (
                "campaigns.nonpersonalized_id",
                &self.campaigns.nonpersonalized_id,
            ),
            (
                "campaigns.alert_campaign_name",
                &self.campaigns.alert_campaign_name,
            ),
            ("campaigns.alert_email_list", &self.campaigns.alert_email_list),
            ("carta.api_base_url", &self.carta.api_base_url),
            ("carta.ui_base_url", &self.carta.ui_base_url),
            ("sender.nonpersonalized_url", &self.sender.nonpersonalized_url),
            ("sender.from_email", &self.sender.from_email),
            ("sender.recipient_email", &self.sender.recipient_email),
            (
                "list_management.send_alert_url",
                &self.list_management.send_alert_url,
            ),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Missing or empty {key} in configuration"
                )));
            }
        }

        let send = &self.campaign_send;
        if send.sends_per_segment == 0 {
            return Err(ConfigError::Validation(
                "campaign_send.sends_per_segment must be > 0".into(),
            ));
        }
        if send.minutes_per_segment == 0 {
            return Err(ConfigError::Validation(
                "campaign_send.minutes_per_segment must be > 0".into(),
            ));
        }
        if !(send.success_ratio_threshold > 0.0 && send.success_ratio_threshold <= 1.0) {
            return Err(ConfigError::Validation(
                "campaign_send.success_ratio_threshold must be in (0, 1]".into(),
            ));
        }
        if send.lookback_hours <= 0 {
            return Err(ConfigError::Validation(
                "campaign_send.lookback_hours must be > 0".into(),
            ));
        }

        let delay = &self.send_delay;
        if delay.p2_minutes <= 0 {
            return Err(ConfigError::Validation(
                "send_delay.p2_minutes must be > 0".into(),
            ));
        }
        if delay.p1_minutes <= delay.p2_minutes {
            return Err(ConfigError::Validation(
                "send_delay.p1_minutes must be greater than send_delay.p2_minutes".into(),
            ));
        }

        if self.metrics.events_count_alert_threshold == 0 {
            return Err(ConfigError::Validation(
                "metrics.events_count_alert_threshold must be > 0".into(),
            ));
        }
        if self.file_download.threshold_minutes <= 0 {
            return Err(ConfigError::Validation(
                "file_download.threshold_minutes must be > 0".into(),
            ));
        }
        if self.dynamic_lists.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Validation(
                "dynamic_lists.utc_offset_minutes must be within one day of UTC".into(),
            ));
        }
        if self.alerting.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "alerting.request_timeout_secs must be > 0".into(),
            ));
        }
        if self.secrets.source == SecretSourceKind::Directory && self.secrets.directory.is_none() {
            return Err(ConfigError::Validation(
                "secrets.directory is required when secrets.source is `directory`".into(),
            ));
        }

        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching a key path separated by double
/// underscores (e.g. `SEND_DELAY__P1_MINUTES`) overrides the file value.
/// `.env` files are honoured by the binary before this is called.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
