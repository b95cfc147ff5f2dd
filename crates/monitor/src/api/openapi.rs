//! OpenAPI/Utoipa configuration.

use crate::api::{checks::CHECKS_TAG, health::MISC_TAG};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Carta Monitor API",
        version = "1.0.0",
        description = "Inspect and trigger the Carta monitoring checks."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = CHECKS_TAG, description = "Monitoring check endpoints")
    )
)]
pub struct ApiDoc;
