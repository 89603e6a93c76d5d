//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! from storage, transcoding and dispatch convert into [`AppError`] here so
//! every failure renders the same JSON body and gets logged once.
//!
//! Any non-2xx from `/convert` makes the task queue redeliver, so the status
//! codes below double as the retry policy.

use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{FormRejection, JsonRejection},
    extract::multipart::MultipartError,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pixfan_core::{AppError, ErrorMetadata, LogLevel};
use pixfan_processing::TranscodeError;
use pixfan_storage::StorageError;
use pixfan_tasks::DispatchError;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

static HIDE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Decide once, at startup, whether error details are stripped from
/// responses. Later calls are ignored.
pub fn configure_error_details(is_production: bool) {
    let _ = HIDE_DETAILS.set(is_production);
}

fn hide_details() -> bool {
    HIDE_DETAILS.get().copied().unwrap_or(false)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code
    pub code: String,
    /// Whether retrying the same request may succeed
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper so `AppError` (defined in pixfan-core) can implement `IntoResponse`.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return HttpAppError(AppError::PayloadTooLarge(rejection.body_text()));
        }
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<FormRejection> for HttpAppError {
    fn from(rejection: FormRejection) -> Self {
        let app = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(rejection.body_text()),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => AppError::InvalidInput(
                "Expected an application/x-www-form-urlencoded or multipart/form-data body"
                    .to_string(),
            ),
            _ => AppError::InvalidInput(format!("Invalid form body: {}", rejection.body_text())),
        };
        HttpAppError(app)
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return HttpAppError(AppError::PayloadTooLarge(err.body_text()));
        }
        HttpAppError(AppError::InvalidInput(format!(
            "Failed to read multipart body: {}",
            err.body_text()
        )))
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid multipart request: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that answers with [`ErrorResponse`] on bad input.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn error_body(app_error: &AppError, hide_details: bool) -> ErrorResponse {
    let show = !hide_details && !app_error.is_sensitive();
    ErrorResponse {
        error: app_error.client_message(),
        details: show.then(|| app_error.detailed_message()),
        error_type: show.then(|| app_error.error_type().to_string()),
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, hide_details()))).into_response()
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object '{}' not found", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::Storage(other.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<TranscodeError> for HttpAppError {
    fn from(err: TranscodeError) -> Self {
        let app = match err {
            TranscodeError::InvalidDimensions(msg) => AppError::InvalidInput(msg),
            other => AppError::Transcode(other.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<DispatchError> for HttpAppError {
    fn from(err: DispatchError) -> Self {
        let DispatchError::Enqueue {
            format,
            enqueued,
            source,
        } = err;
        HttpAppError(AppError::Enqueue {
            format: format.to_string(),
            message: source.to_string(),
            enqueued: enqueued.into_iter().map(|t| t.task_name).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixfan_core::TargetFormat;
    use pixfan_tasks::{DispatchedTask, EnqueueError};

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let HttpAppError(app) = StorageError::NotFound("photo1".to_string()).into();
        assert_eq!(app.http_status_code(), 404);
    }

    #[test]
    fn test_storage_failures_are_bad_gateway() {
        let HttpAppError(app) = StorageError::WriteFailed("timeout".to_string()).into();
        assert!(matches!(app, AppError::Storage(_)));
        assert_eq!(app.http_status_code(), 502);
    }

    #[test]
    fn test_invalid_key_is_input_error() {
        let HttpAppError(app) = StorageError::InvalidKey("../etc".to_string()).into();
        assert_eq!(app.http_status_code(), 400);
    }

    #[test]
    fn test_decode_failure_is_unprocessable() {
        let HttpAppError(app) = TranscodeError::Decode("bad header".to_string()).into();
        assert_eq!(app.http_status_code(), 422);
    }

    #[test]
    fn test_dispatch_error_lists_enqueued_tasks() {
        let err = DispatchError::Enqueue {
            format: TargetFormat::Webp,
            enqueued: vec![DispatchedTask {
                task_name: "projects/p/locations/l/queues/q/tasks/1".to_string(),
                format: TargetFormat::Jpeg,
                name: "out1.jpeg".to_string(),
            }],
            source: EnqueueError::Transport("connection reset".to_string()),
        };
        let HttpAppError(app) = err.into();
        match &app {
            AppError::Enqueue {
                format, enqueued, ..
            } => {
                assert_eq!(format, "webp");
                assert_eq!(enqueued, &["projects/p/locations/l/queues/q/tasks/1".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(app.http_status_code(), 502);
    }

    #[test]
    fn test_sensitive_errors_hide_details() {
        let body = error_body(&AppError::Storage("bucket acl denied".to_string()), false);
        assert!(body.details.is_none());
        assert_eq!(body.code, "STORAGE_ERROR");

        let body = error_body(&AppError::InvalidInput("Missing required field 'name'".to_string()), false);
        assert!(body.details.is_some());

        let body = error_body(&AppError::InvalidInput("x".to_string()), true);
        assert!(body.details.is_none());
    }
}
