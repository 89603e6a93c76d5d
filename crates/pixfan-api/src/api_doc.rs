//! OpenAPI document served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use pixfan_core::{ObjectFinalizedEvent, TargetFormat};
use pixfan_tasks::{DispatchReport, DispatchedTask};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pixfan",
        version = "0.1.0",
        description = "Image fan-out conversion service. Upload events fan out into one queued task per target format; each task halves the source image and writes it to the destination bucket."
    ),
    paths(
        handlers::convert::convert,
        handlers::events::object_finalized,
        handlers::images::get_image,
        handlers::health::liveness,
        handlers::health::readiness,
    ),
    components(schemas(
        ErrorResponse,
        TargetFormat,
        ObjectFinalizedEvent,
        DispatchReport,
        DispatchedTask,
        handlers::convert::ConvertForm,
        handlers::health::ReadinessResponse,
    )),
    tags(
        (name = "conversion", description = "Convert one image into one target format"),
        (name = "dispatch", description = "Fan an upload event out into conversion tasks"),
        (name = "images", description = "Serve converted images"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;
