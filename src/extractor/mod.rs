//! 콘텐츠 추출 모듈
//!
//! 업로드된 PDF 바이트에서 페이지별 텍스트를 추출합니다.
//! 실제 디코딩은 `pdf` 하위 모듈(lopdf)에 위임합니다.

pub mod pdf;

use anyhow::Context;

use crate::config::Limits;
use crate::error::ReportError;

// ============================================================================
// PDF Text Extractor
// ============================================================================

/// PDF 텍스트 추출기
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    /// 최대 페이지 수
    max_pages: usize,
}

impl PdfTextExtractor {
    /// 페이지 한도를 지정하여 생성
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    /// 처리 한도 설정에서 생성
    pub fn from_limits(limits: &Limits) -> Self {
        Self::new(limits.max_pages)
    }

    /// PDF 바이트 → 페이지별 텍스트 (페이지 순서)
    pub fn extract(&self, bytes: &[u8]) -> Result<Vec<String>, ReportError> {
        let pages = pdf::extract_pages_from_mem(bytes, self.max_pages)?;
        tracing::debug!("Extracted {} pages ({} bytes)", pages.len(), bytes.len());
        Ok(pages)
    }

    /// 비동기 추출
    ///
    /// PDF 디코딩은 CPU 바운드이므로 blocking 스레드에서 실행합니다.
    pub async fn extract_async(&self, bytes: Vec<u8>) -> anyhow::Result<Vec<String>> {
        let extractor = self.clone();
        let pages = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .context("PDF extraction task failed")??;
        Ok(pages)
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::from_limits(&Limits::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_limits() {
        let extractor = PdfTextExtractor::default();
        assert_eq!(extractor.max_pages, Limits::default().max_pages);
    }

    #[tokio::test]
    async fn test_extract_async() {
        let bytes = pdf::tests::make_test_pdf(&[Some(&["Patient report"]), Some(&["Page two"])]);
        let pages = PdfTextExtractor::default().extract_async(bytes).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Patient"));
    }

    #[tokio::test]
    async fn test_extract_async_invalid_pdf() {
        let err = PdfTextExtractor::default()
            .extract_async(b"%PDF-garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::DocumentParse(_))
        ));
    }
}
