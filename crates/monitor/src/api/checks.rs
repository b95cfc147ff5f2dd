//! Monitoring check endpoints.
//!
//! - `/api/checks` - List the checks and their background intervals
//! - `/api/checks/{check}/run` - Run one invocation now

use crate::MonitorResources;
use crate::checks::{self, CheckName, InvocationOutcome};
use axum::{Extension, Json, extract::Path, response::IntoResponse};
use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const CHECKS_TAG: &str = "Checks API";

#[derive(Serialize, ToSchema)]
pub struct CheckInfo {
    pub name: CheckName,
    pub description: &'static str,
    /// Background interval; absent when the loop is disabled.
    pub interval_secs: Option<u64>,
}

/// Creates the checks API router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_checks))
        .routes(routes!(run_check_now))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/",
    tag = CHECKS_TAG,
    operation_id = "List Checks",
    summary = "List monitoring checks",
    responses(
        (status = 200, description = "Every check with its background interval", body = Vec<CheckInfo>, content_type = "application/json")
    )
)]
async fn list_checks(Extension(resources): Extension<MonitorResources>) -> Json<Vec<CheckInfo>> {
    let schedule = &resources.config.schedule;
    Json(
        CheckName::ALL
            .into_iter()
            .map(|name| CheckInfo {
                name,
                description: name.description(),
                interval_secs: schedule.interval_for(name).map(|d| d.as_secs()),
            })
            .collect(),
    )
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    post,
    path = "/{check}/run",
    tag = CHECKS_TAG,
    operation_id = "Run Check",
    summary = "Run one invocation of a check now",
    description = "Runs the check under the watchdog and returns its outcome. The HTTP status \
                   mirrors the invocation status: 200 on success, 500 when the check failed.",
    params(
        ("check" = String, Path, description = "Check name, e.g. `campaign_send`")
    ),
    responses(
        (status = 200, description = "Check succeeded", body = InvocationOutcome, content_type = "application/json"),
        (status = 404, description = "Unknown check", content_type = "application/json"),
        (status = 409, description = "Check is already running", content_type = "application/json"),
        (status = 500, description = "Check failed", body = InvocationOutcome, content_type = "application/json")
    )
)]
async fn run_check_now(
    Extension(resources): Extension<MonitorResources>,
    Path(check): Path<String>,
) -> impl IntoResponse {
    let check: CheckName = match check.parse() {
        Ok(check) => check,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let Some(outcome) = checks::try_invoke(&resources, check).await else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("{check} is already running") })),
        );
    };

    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_value(&outcome)
        .unwrap_or_else(|_| json!({ "error": "Failed to serialize outcome" }));
    (status, Json(body))
}
