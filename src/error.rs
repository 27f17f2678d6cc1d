//! 에러 타입
//!
//! 업로드 처리 경계에서 사용하는 도메인 에러 분류입니다.
//! 내부 상세 정보는 로그로만 남기고, 호출자에게는 고정된 메시지만 반환합니다.

use axum::http::StatusCode;
use thiserror::Error;

/// 리포트 처리 에러
#[derive(Debug, Error)]
pub enum ReportError {
    /// 선언된 파일 타입이 PDF가 아님 (4xx)
    #[error("invalid input type: {0}")]
    InvalidInputType(String),

    /// PDF 문서를 열 수 없음 (손상된 파일, 지원하지 않는 인코딩 등)
    #[error("failed to parse PDF document: {0}")]
    DocumentParse(String),

    /// 텍스트 분류/필드 추출 중 예기치 않은 실패
    #[error("failed to structure report text: {0}")]
    Structuring(String),

    /// 페이지 수, 텍스트 크기, 업로드 크기 제한 초과
    #[error("processing limit exceeded: {0}")]
    LimitExceeded(String),
}

/// 500 응답에 사용하는 고정 메시지
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process PDF";

impl ReportError {
    /// HTTP 상태 코드
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReportError::InvalidInputType(_) => StatusCode::BAD_REQUEST,
            ReportError::LimitExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ReportError::DocumentParse(_) | ReportError::Structuring(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 호출자에게 노출해도 되는 메시지
    ///
    /// 파싱/구조화 실패는 원인과 관계없이 동일한 메시지를 반환합니다.
    pub fn public_message(&self) -> String {
        match self {
            ReportError::InvalidInputType(msg) | ReportError::LimitExceeded(msg) => msg.clone(),
            ReportError::DocumentParse(_) | ReportError::Structuring(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
