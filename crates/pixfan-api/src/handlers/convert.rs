//! `POST /convert`
//!
//! Two surfaces share the path and are told apart by `Content-Type`:
//! - form-encoded `format`, `source`, `name`: a queued conversion task. The
//!   source object is read from the source bucket and the answer is `ok`.
//! - multipart `image`, `format`, `name`: a direct upload. The answer is the
//!   CDN URL of the result when a CDN is configured, otherwise the bytes.
//!
//! Both overwrite the destination object, so redelivery is harmless.

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use pixfan_core::{AppError, ConversionPayload};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::conversion::transform_and_write;
use crate::state::AppState;
use crate::utils::multipart::extract_direct_upload;

/// Raw form fields; validated by [`ConversionPayload::from_fields`].
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConvertForm {
    pub format: Option<String>,
    pub source: Option<String>,
    pub name: Option<String>,
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[utoipa::path(
    post,
    path = "/convert",
    tag = "conversion",
    request_body(
        content = ConvertForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Conversion task (format, source, name). Send multipart/form-data with image, format and name for a direct upload."
    ),
    responses(
        (status = 200, description = "`ok` for a task; CDN URL or image bytes for a direct upload"),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 404, description = "Source object not found", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 422, description = "Image could not be decoded or encoded", body = ErrorResponse),
        (status = 502, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn convert(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, HttpAppError> {
    if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state).await?;
        return direct_upload(&state, multipart).await;
    }

    let Form(form) = Form::<ConvertForm>::from_request(request, &state).await?;
    convert_task(&state, form).await
}

#[tracing::instrument(skip(state, form))]
async fn convert_task(state: &AppState, form: ConvertForm) -> Result<Response, HttpAppError> {
    let payload = ConversionPayload::from_fields(
        form.format.as_deref(),
        form.source.as_deref(),
        form.name.as_deref(),
    )?;

    tracing::info!(
        format = %payload.format,
        source = %payload.source,
        name = %payload.name,
        "Conversion task received"
    );

    let source = state.source.read(&payload.source).await?;
    transform_and_write(state, source, payload.format, &payload.name).await?;

    Ok((StatusCode::OK, "ok").into_response())
}

#[tracing::instrument(skip(state, multipart))]
async fn direct_upload(state: &AppState, multipart: Multipart) -> Result<Response, HttpAppError> {
    let upload = extract_direct_upload(multipart).await?;
    let output_name = upload.output_name();

    tracing::info!(
        format = %upload.format,
        name = %output_name,
        input_bytes = upload.image.len(),
        "Direct upload received"
    );

    let transcoded = transform_and_write(state, upload.image, upload.format, &output_name).await?;

    if let Some(url) = state.config.cdn_object_url(&output_name) {
        return Ok((StatusCode::OK, url).into_response());
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, transcoded.content_type())
        .body(Body::from(transcoded.data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}

/// Any method other than POST on `/convert`. Nothing is read or written.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        [(header::ALLOW, "POST")],
        HttpAppError(AppError::MethodNotAllowed(
            "Method not allowed, use POST".to_string(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn multipart_detection_ignores_case_and_boundary() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("Multipart/Form-Data; boundary=xyz"),
        );
        assert!(is_multipart(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        assert!(!is_multipart(&headers));

        assert!(!is_multipart(&HeaderMap::new()));
    }
}
