//! Alert lifecycle: what can be raised, and how it reaches the alerting API.
//!
//! ## Submodules
//!
//! - `catalog` - alert kinds, aliases, priorities and rendered messages
//! - `opsgenie` - REST client implementing [`AlertSink`]

pub mod catalog;
pub mod opsgenie;

use crate::error::AlertApiError;
use std::future::Future;

pub use catalog::{AlertCatalog, AlertDetails, AlertKind, Priority};
pub use opsgenie::OpsGenieClient;

/// Open, close and escalate alerts by kind.
///
/// Implementations must be idempotent per alias: creating an open alert
/// refreshes it, and closing an alert that is not open changes nothing.
pub trait AlertSink: Send + Sync {
    fn create(
        &self,
        kind: AlertKind,
        detail: Option<String>,
    ) -> impl Future<Output = Result<(), AlertApiError>> + Send;

    /// Close the alert if it is currently open. Returns whether a close was
    /// issued.
    fn close_open(&self, kind: AlertKind)
    -> impl Future<Output = Result<bool, AlertApiError>> + Send;

    /// Change the priority of an already created alert.
    fn escalate(
        &self,
        kind: AlertKind,
        priority: Priority,
    ) -> impl Future<Output = Result<(), AlertApiError>> + Send;
}

/// Join a per-invocation detail with the catalog template, detail first.
pub fn compose_description(detail: Option<&str>, template: Option<&str>) -> String {
    let detail = detail.filter(|d| !d.trim().is_empty());
    let template = template.filter(|t| !t.trim().is_empty());
    match (detail, template) {
        (Some(detail), Some(template)) => format!("{detail}\n\n{template}"),
        (Some(detail), None) => detail.to_string(),
        (None, Some(template)) => template.to_string(),
        (None, None) => "No description provided".to_string(),
    }
}
