//! API module providing HTTP endpoints for the monitor.
//!
//! This module is organized into submodules:
//! - `checks` - Check listing and manual runs (/api/checks/*)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod checks;
pub mod health;
pub mod openapi;

pub use checks::CHECKS_TAG;
pub use health::MISC_TAG;

use crate::MonitorResources;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the full application router, including the Redoc page.
pub fn router(resources: MonitorResources) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/checks", checks::router())
        .routes(routes!(health::health))
        .layer(axum::Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: MonitorResources) -> color_eyre::Result<()> {
    let addr = resources.config.server.bind_address.clone();
    let router = router(resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        name = "api.listening",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        addr = %addr,
        message = "Server running"
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
