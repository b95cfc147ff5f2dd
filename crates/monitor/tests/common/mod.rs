//! Shared fixtures for integration tests.
#![allow(dead_code)]

use carta_monitor::alerts::{AlertKind, AlertSink, Priority};
use carta_monitor::config::AppConfig;
use carta_monitor::entity::nl_send::{self, SendState};
use carta_monitor::error::AlertApiError;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait, Set, Statement};
use std::collections::HashSet;
use std::sync::Mutex;
use time::OffsetDateTime;

pub const CONFIG_YAML: &str = r#"
stage: "sandbox"
database_url: "sqlite::memory:"
alerting:
  base_url: "https://alerts.example.com/v2/alerts"
  environment: "sandbox"
campaign_send:
  sends_per_segment: 1000000
  minutes_per_segment: 30
  success_ratio_threshold: 0.9
send_delay:
  p2_minutes: 15
  p1_minutes: 30
campaigns:
  transactional_id: "tx-campaign"
  personalized_id: "pers-campaign"
  nonpersonalized_id: "nonpers-campaign"
  alert_campaign_name: "carta-monitor-alert"
  alert_email_list: "oncall@example.com"
metrics:
  events_count_alert_threshold: 3
file_download:
  threshold_minutes: 15
carta:
  api_base_url: "https://carta.example.com/api"
  ui_base_url: "https://carta.example.com/"
sender:
  nonpersonalized_url: "https://sender.example.com/send"
  from_email: "monitor@example.com"
  recipient_email: "canary@example.com"
list_management:
  send_alert_url: "https://lists.example.com/send-alert"
"#;

/// Build a validated config from [`CONFIG_YAML`] with dotted-key overrides.
pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
    let mut builder = config::Config::builder().add_source(config::File::from_str(
        CONFIG_YAML,
        config::FileFormat::Yaml,
    ));
    for (key, value) in overrides {
        builder = builder
            .set_override(*key, *value)
            .expect("Failed to set override");
    }
    let app: AppConfig = builder
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize config");
    app.validate().expect("Test config should be valid");
    app
}

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect");

    for sql in [
        r#"CREATE TABLE nl_send (
            id TEXT PRIMARY KEY NOT NULL,
            letter_id TEXT NOT NULL,
            scheduled_send_time TEXT NOT NULL,
            status_wait_timestamp BIGINT NOT NULL,
            status_done_timestamp TEXT NULL,
            metrics_sent_emails BIGINT NOT NULL DEFAULT 0,
            metrics_sent_emails_err BIGINT NOT NULL DEFAULT 0,
            total_send_size BIGINT NOT NULL,
            send_state TEXT NULL,
            queue_tag INTEGER NOT NULL,
            personalize BOOLEAN NULL
        )"#,
        r#"CREATE TABLE lm_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            enabled BOOLEAN NOT NULL,
            autorun BOOLEAN NOT NULL,
            autorun_time TEXT NULL,
            message TEXT NULL,
            updated_time TEXT NOT NULL
        )"#,
        r#"CREATE TABLE file_download_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            list_name TEXT NOT NULL,
            user_name TEXT NOT NULL,
            status TEXT NOT NULL,
            created_time TEXT NOT NULL
        )"#,
        r#"CREATE TABLE events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            created_time TEXT NOT NULL
        )"#,
    ] {
        db.execute(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
            .await
            .expect("create table");
    }
    db
}

/// Builder for `nl_send` rows with sensible defaults.
#[derive(Clone, Debug)]
pub struct SendRow {
    pub id: &'static str,
    pub scheduled_send_time: OffsetDateTime,
    pub status_done_timestamp: Option<OffsetDateTime>,
    pub sent_ok: i64,
    pub sent_err: i64,
    pub total_send_size: i64,
    pub send_state: Option<SendState>,
    pub queue_tag: i32,
    pub personalize: Option<bool>,
}

impl SendRow {
    pub fn new(id: &'static str, scheduled_send_time: OffsetDateTime) -> Self {
        Self {
            id,
            scheduled_send_time,
            status_done_timestamp: None,
            sent_ok: 0,
            sent_err: 0,
            total_send_size: 10_000,
            send_state: None,
            queue_tag: nl_send::QUEUE_TAG_NEWSLETTER,
            personalize: Some(true),
        }
    }

    pub fn progress(mut self, sent_ok: i64, sent_err: i64) -> Self {
        self.sent_ok = sent_ok;
        self.sent_err = sent_err;
        self
    }

    pub fn size(mut self, total_send_size: i64) -> Self {
        self.total_send_size = total_send_size;
        self
    }

    pub fn state(mut self, state: SendState) -> Self {
        self.send_state = Some(state);
        self
    }

    pub fn category(mut self, queue_tag: i32, personalize: Option<bool>) -> Self {
        self.queue_tag = queue_tag;
        self.personalize = personalize;
        self
    }

    pub fn done_at(mut self, at: OffsetDateTime) -> Self {
        self.status_done_timestamp = Some(at);
        self
    }

    fn into_active_model(self) -> nl_send::ActiveModel {
        let wait_ms = (self.scheduled_send_time.unix_timestamp_nanos() / 1_000_000) as i64;
        nl_send::ActiveModel {
            id: Set(self.id.to_string()),
            letter_id: Set(format!("letter-{}", self.id)),
            scheduled_send_time: Set(self.scheduled_send_time),
            status_wait_timestamp: Set(wait_ms),
            status_done_timestamp: Set(self.status_done_timestamp),
            metrics_sent_emails: Set(self.sent_ok),
            metrics_sent_emails_err: Set(self.sent_err),
            total_send_size: Set(self.total_send_size),
            send_state: Set(self.send_state),
            queue_tag: Set(self.queue_tag),
            personalize: Set(self.personalize),
        }
    }
}

pub async fn insert_sends(db: &DatabaseConnection, rows: Vec<SendRow>) {
    nl_send::Entity::insert_many(rows.into_iter().map(SendRow::into_active_model))
        .exec_without_returning(db)
        .await
        .expect("insert nl_send rows");
}

pub async fn send_state_of(db: &DatabaseConnection, id: &str) -> Option<SendState> {
    nl_send::Entity::find_by_id(id.to_string())
        .one(db)
        .await
        .expect("query nl_send")
        .expect("row exists")
        .send_state
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlertCall {
    Create {
        kind: AlertKind,
        detail: Option<String>,
    },
    Close(AlertKind),
    Escalate(AlertKind, Priority),
}

/// In-memory [`AlertSink`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<AlertCall>>,
    open: Mutex<HashSet<AlertKind>>,
    fail_creates: bool,
    fail_closes: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `create` always fails with a 503.
    pub fn failing_creates() -> Self {
        Self {
            fail_creates: true,
            ..Self::default()
        }
    }

    /// A sink whose `close_open` always fails with a 503.
    pub fn failing_closes() -> Self {
        Self {
            fail_closes: true,
            ..Self::default()
        }
    }

    pub fn with_open(kinds: &[AlertKind]) -> Self {
        let sink = Self::default();
        sink.open.lock().unwrap().extend(kinds.iter().copied());
        sink
    }

    pub fn calls(&self) -> Vec<AlertCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, kind: AlertKind) -> Vec<AlertCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                AlertCall::Create { kind: k, .. } => *k == kind,
                AlertCall::Close(k) | AlertCall::Escalate(k, _) => *k == kind,
            })
            .collect()
    }

    pub fn is_open(&self, kind: AlertKind) -> bool {
        self.open.lock().unwrap().contains(&kind)
    }
}

impl AlertSink for RecordingSink {
    async fn create(&self, kind: AlertKind, detail: Option<String>) -> Result<(), AlertApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(AlertCall::Create { kind, detail });
        if self.fail_creates {
            return Err(AlertApiError::Status {
                status: hyper::StatusCode::SERVICE_UNAVAILABLE,
                operation: "create",
                alias: kind.alias(),
                body: "unavailable".into(),
            });
        }
        self.open.lock().unwrap().insert(kind);
        Ok(())
    }

    async fn close_open(&self, kind: AlertKind) -> Result<bool, AlertApiError> {
        self.calls.lock().unwrap().push(AlertCall::Close(kind));
        if self.fail_closes {
            return Err(AlertApiError::Status {
                status: hyper::StatusCode::SERVICE_UNAVAILABLE,
                operation: "close",
                alias: kind.alias(),
                body: "unavailable".into(),
            });
        }
        Ok(self.open.lock().unwrap().remove(&kind))
    }

    async fn escalate(&self, kind: AlertKind, priority: Priority) -> Result<(), AlertApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(AlertCall::Escalate(kind, priority));
        Ok(())
    }
}
