use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pixfan_core::AppError;

/// Render the body limit layer's plain-text 413 as the JSON error body.
///
/// Must wrap `RequestBodyLimitLayer`. Responses that are already JSON
/// (extractor rejections) pass through unchanged.
pub async fn json_payload_too_large(
    State(limit_bytes): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json(&response) {
        return response;
    }

    tracing::debug!(limit_bytes, "Request body over the upload limit");
    HttpAppError(AppError::PayloadTooLarge(format!(
        "Request body exceeds the {} byte upload limit",
        limit_bytes
    )))
    .into_response()
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use axum_test::TestServer;
    use tower_http::limit::RequestBodyLimitLayer;

    fn server() -> TestServer {
        let app = Router::new()
            .route(
                "/plain",
                post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded") }),
            )
            .route(
                "/json",
                post(|| async { HttpAppError(AppError::PayloadTooLarge("form".to_string())) }),
            )
            .route(
                "/echo",
                post(|body: bytes::Bytes| async move { body.len().to_string() }),
            )
            .layer(RequestBodyLimitLayer::new(16))
            .layer(middleware::from_fn_with_state(16usize, json_payload_too_large));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn plain_413_becomes_json() {
        let response = server().post("/plain").await;

        assert_eq!(response.status_code(), 413);
        let content_type = response.header("content-type");
        assert!(content_type.to_str().unwrap().starts_with("application/json"));
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
        assert!(body["error"].as_str().unwrap().contains("16 byte"));
    }

    #[tokio::test]
    async fn json_413_passes_through() {
        let response = server().post("/json").await;

        assert_eq!(response.status_code(), 413);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
        assert!(body["error"].as_str().unwrap().contains("form"));
    }

    #[tokio::test]
    async fn oversized_body_is_json_413() {
        let server = server();

        let response = server.post("/echo").bytes(vec![0u8; 64].into()).await;
        assert_eq!(response.status_code(), 413);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");

        let response = server.post("/echo").bytes(vec![0u8; 8].into()).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "8");
    }
}
