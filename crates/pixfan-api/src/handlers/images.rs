//! `GET /images/{file_name}`: serve a derived image from the destination
//! bucket, optionally resized to fit `w` x `h`.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::{StreamExt, TryStreamExt};
use pixfan_core::{AppError, TargetFormat};
use pixfan_processing::{resize_to_fit, FitBox};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ResizeQuery {
    /// Maximum width in pixels (1..=8192); images are never enlarged
    pub w: Option<u32>,
    /// Maximum height in pixels (1..=8192)
    pub h: Option<u32>,
}

impl ResizeQuery {
    fn fit_box(&self) -> FitBox {
        FitBox {
            width: self.w,
            height: self.h,
        }
    }
}

#[utoipa::path(
    get,
    path = "/images/{file_name}",
    tag = "images",
    params(
        ("file_name" = String, Path, description = "Object name in the destination bucket"),
        ResizeQuery
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 400, description = "Resize box side is 0 or above 8192, or the extension is unknown", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 502, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
    Query(query): Query<ResizeQuery>,
) -> Result<Response, HttpAppError> {
    let fit = query.fit_box();
    fit.validate()?;
    if fit.is_empty() {
        return stream_object(&state, &file_name).await;
    }
    resized_object(&state, &file_name, fit).await
}

async fn stream_object(state: &AppState, file_name: &str) -> Result<Response, HttpAppError> {
    let object = state.destination.read_stream(file_name).await?;

    tracing::debug!(key = %object.key, size_bytes = object.size, "Streaming image");

    let body_stream = object.body.map(|chunk| {
        chunk.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, object.size);
    if let Some(content_type) = &object.metadata.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
    }
    if let Some(cache_control) = &object.metadata.cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control.as_str());
    }

    builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}

async fn resized_object(
    state: &AppState,
    file_name: &str,
    fit: FitBox,
) -> Result<Response, HttpAppError> {
    let format = TargetFormat::from_file_name(file_name).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Cannot resize '{}': unknown image extension",
            file_name
        ))
    })?;

    let object = state.destination.read_stream(file_name).await?;
    let cache_control = object.metadata.cache_control.clone();
    let chunks: Vec<bytes::Bytes> = object.body.try_collect().await?;
    let source = chunks.concat();

    let encoder = state.encoder;
    let resized = tokio::task::spawn_blocking(move || resize_to_fit(&source, fit, format, &encoder))
        .await
        .map_err(|e| AppError::Internal(format!("Resize task failed: {}", e)))??;

    tracing::debug!(
        file_name = %file_name,
        width = resized.width,
        height = resized.height,
        "Serving resized image"
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resized.content_type());
    if let Some(cache_control) = cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }

    builder
        .body(Body::from(resized.data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}
