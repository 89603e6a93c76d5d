//! `POST /events/object-finalized`
//!
//! Push endpoint for storage notifications (the GCS object resource as the
//! JSON body). Validates the trigger metadata and fans the conversion out.
//! On a non-2xx answer the trigger redelivers the whole event; that creates
//! fresh task IDs, so formats enqueued by the failed attempt run twice, which
//! the overwrite contract makes harmless.

use axum::{extract::State, Json};
use pixfan_core::{AppError, ObjectFinalizedEvent, UploadEvent};
use pixfan_tasks::DispatchReport;
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/events/object-finalized",
    tag = "dispatch",
    request_body = ObjectFinalizedEvent,
    responses(
        (status = 200, description = "One task enqueued per format", body = DispatchReport),
        (status = 400, description = "Event metadata is missing or invalid; nothing enqueued", body = ErrorResponse),
        (status = 500, description = "Dispatch is not configured", body = ErrorResponse),
        (status = 502, description = "Enqueue failed; details list the tasks already enqueued", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, event), fields(source = %event.name))]
pub async fn object_finalized(
    State(state): State<Arc<AppState>>,
    ValidatedJson(event): ValidatedJson<ObjectFinalizedEvent>,
) -> Result<Json<DispatchReport>, HttpAppError> {
    let dispatcher = state.dispatcher.as_ref().ok_or_else(|| {
        AppError::Configuration("RUN_URL is not set; fan-out dispatch is disabled".to_string())
    })?;

    let upload = UploadEvent::try_from(event).map_err(AppError::from)?;
    let report = dispatcher.dispatch(&upload).await?;

    Ok(Json(report))
}
