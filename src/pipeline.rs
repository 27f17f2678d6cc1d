//! 업로드 처리 파이프라인
//!
//! 추출 → 구조화를 순서대로 실행합니다. 추출이 끝나기 전에는 구조화를 시작하지 않고,
//! 추출이 실패하면 구조화는 호출되지 않습니다.
//! 요청마다 `ProcessingContext`를 새로 만들고 반환 전에 해제합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ReportError;
use crate::extractor::PdfTextExtractor;
use crate::model::ProcessingContext;
use crate::record::{StructuredMedicalRecord, UploadResponse};
use crate::structurer::{MedicalTextStructurer, StructurerOptions};

/// 허용하는 업로드 콘텐츠 타입
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// ============================================================================
// Content Type Check
// ============================================================================

/// 선언된 콘텐츠 타입 검사 (파라미터는 무시: `application/pdf; name=x.pdf`)
pub fn validate_content_type(declared: Option<&str>) -> Result<(), ReportError> {
    let essence = declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase());

    match essence.as_deref() {
        Some(PDF_CONTENT_TYPE) => Ok(()),
        _ => Err(ReportError::InvalidInputType(
            "Only PDF files are accepted".to_string(),
        )),
    }
}

// ============================================================================
// Report Pipeline
// ============================================================================

/// 리포트 처리 파이프라인
///
/// 읽기 전용 공유 상태입니다. 요청 간 가변 상태는 없습니다.
pub struct ReportPipeline {
    config: AppConfig,
    extractor: PdfTextExtractor,
    structurer: MedicalTextStructurer,
}

impl ReportPipeline {
    /// 설정으로 생성
    pub fn new(config: AppConfig) -> Result<Self, ReportError> {
        let structurer = MedicalTextStructurer::new(StructurerOptions {
            merge_policy: config.merge_policy,
            column_strategy: config.column_strategy,
            max_page_chars: config.limits.max_page_chars,
        })?;

        Ok(Self {
            extractor: PdfTextExtractor::from_limits(&config.limits),
            structurer,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// PDF 바이트 → 구조화된 의료 기록
    pub fn process_upload(&self, bytes: &[u8]) -> Result<StructuredMedicalRecord, ReportError> {
        let request_id = Uuid::new_v4();
        tracing::info!("Processing upload {} ({} bytes)", request_id, bytes.len());

        if bytes.len() > self.config.limits.max_upload_bytes {
            return Err(ReportError::LimitExceeded(format!(
                "File too large. Maximum {}MB.",
                self.config.limits.max_upload_bytes / (1024 * 1024)
            )));
        }

        let pages = self.extractor.extract(bytes)?;

        let mut ctx = ProcessingContext::new();
        let record = self.structurer.structure(&mut ctx, &pages)?;
        ctx.release();

        tracing::info!(
            "Upload {} structured: {} pages, patient info: {}, test rows: {}",
            request_id,
            pages.len(),
            record.patient_info.is_some(),
            record.test_results.as_ref().map_or(0, |r| r.len())
        );

        if self.config.debug_dump {
            match write_debug_dump(&self.config.dump_dir, bytes, &pages, &record) {
                Ok(path) => tracing::debug!("Debug dump written: {}", path.display()),
                Err(e) => tracing::warn!("Failed to write debug dump: {:#}", e),
            }
        }

        Ok(record)
    }

    /// 처리 후 응답 (상태 코드, 본문) 생성
    ///
    /// 내부 에러 상세는 로그에만 남깁니다.
    pub fn respond(&self, bytes: &[u8]) -> (StatusCode, UploadResponse) {
        match self.process_upload(bytes) {
            Ok(record) => (StatusCode::OK, UploadResponse::success(record)),
            Err(e) => failure_response(&e),
        }
    }

    /// blocking 스레드에서 `respond` 실행
    pub async fn respond_async(self: Arc<Self>, bytes: Vec<u8>) -> (StatusCode, UploadResponse) {
        match tokio::task::spawn_blocking(move || self.respond(&bytes)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Upload processing task failed: {}", e);
                failure_response(&ReportError::Structuring(e.to_string()))
            }
        }
    }
}

/// 에러 → (상태 코드, 본문)
pub fn failure_response(err: &ReportError) -> (StatusCode, UploadResponse) {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("Upload processing failed: {}", err);
    } else {
        tracing::info!("Upload rejected: {}", err);
    }
    (status, UploadResponse::failure(err.public_message()))
}

// ============================================================================
// Debug Dump
// ============================================================================

#[derive(Serialize)]
struct DebugDump<'a> {
    created_at: DateTime<Utc>,
    sha256: &'a str,
    page_count: usize,
    pages: &'a [String],
    record: &'a StructuredMedicalRecord,
}

/// 디버그 스냅샷 저장 (`<dir>/<sha256 앞 12자>-<시각>.json`)
pub fn write_debug_dump(
    dir: &Path,
    bytes: &[u8],
    pages: &[String],
    record: &StructuredMedicalRecord,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create dump directory: {:?}", dir))?;

    let digest = format!("{:x}", Sha256::digest(bytes));
    let created_at = Utc::now();
    let path = dir.join(format!(
        "{}-{}.json",
        &digest[..12],
        created_at.format("%Y%m%dT%H%M%S%.3f")
    ));

    let dump = DebugDump {
        created_at,
        sha256: &digest,
        page_count: pages.len(),
        pages,
        record,
    };
    let json = serde_json::to_vec_pretty(&dump).context("Failed to serialize debug dump")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write dump: {:?}", path))?;

    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
