//! HTTP 업로드 서버
//!
//! - `POST /upload`: multipart `file` 필드 (application/pdf) → 구조화된 의료 기록
//! - `GET /health`: 상태 확인

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::ReportError;
use crate::pipeline::{failure_response, validate_content_type, ReportPipeline};
use crate::record::UploadResponse;

/// multipart 헤더/경계 문자열 여유분
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ============================================================================
// App State
// ============================================================================

/// 핸들러 간 공유 상태 (읽기 전용)
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
}

impl AppState {
    pub fn new(pipeline: ReportPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============================================================================
// Router
// ============================================================================

/// 라우터 구성
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.pipeline.config().limits.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(handle_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 시작
pub async fn start_server(addr: &str, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Upload server listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn reply((status, body): (StatusCode, UploadResponse)) -> Response {
    (status, Json(body)).into_response()
}

fn client_error(status: StatusCode, message: &str) -> Response {
    reply((status, UploadResponse::failure(message)))
}

async fn handle_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Invalid multipart request: {}", e);
                return client_error(e.status(), "Invalid upload request.");
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        // 선언된 타입이 PDF가 아니면 추출 전에 거부
        if let Err(e) = validate_content_type(field.content_type()) {
            return reply(failure_response(&e));
        }

        match field.bytes().await {
            Ok(bytes) => file_bytes = Some(bytes.to_vec()),
            Err(e) => {
                tracing::warn!("Failed to read upload bytes: {}", e);
                let status = e.status();
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    return reply(failure_response(&ReportError::LimitExceeded(
                        "File too large.".to_string(),
                    )));
                }
                return client_error(status, "Failed to read file data.");
            }
        }
    }

    let Some(bytes) = file_bytes else {
        return client_error(StatusCode::BAD_REQUEST, "No file provided");
    };

    reply(state.pipeline.clone().respond_async(bytes).await)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::extractor::pdf::tests::make_test_pdf;

    const BOUNDARY: &str = "medreport-test-boundary";

    fn app() -> Router {
        let pipeline = ReportPipeline::new(AppConfig::default()).unwrap();
        build_router(AppState::new(pipeline))
    }

    fn upload_request(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"report.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_pdf() {
        let pdf = make_test_pdf(&[Some(&[
            "Name. John Doe Gender/Age. 45 Male",
            "Sample: Whole Blood",
        ])]);
        let (status, json) = send(upload_request("file", "application/pdf", &pdf)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["patientInfo"]["name"], "John Doe");
        assert_eq!(json["data"]["patientInfo"]["age"], "45");
        assert_eq!(json["data"]["patientInfo"]["sample"], "Whole Blood");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_content_type() {
        let (status, json) = send(upload_request("file", "text/plain", b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({ "error": "Only PDF files are accepted" }));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_returns_generic_error() {
        let (status, json) =
            send(upload_request("file", "application/pdf", b"%PDF-1.4 broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, serde_json::json!({ "error": "Failed to process PDF" }));
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let (status, json) = send(upload_request("attachment", "application/pdf", b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file provided");
    }
}
