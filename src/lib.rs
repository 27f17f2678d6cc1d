//! medreport - 의료 검사 리포트 PDF 구조화 서비스
//!
//! 업로드된 PDF에서 페이지별 텍스트를 추출하고, 정규식 휴리스틱으로
//! 환자 정보/검사 결과/측정값/진단/처방을 구조화합니다.

pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod server;
pub mod structurer;

// Re-exports
pub use config::{get_data_dir, AppConfig, Limits};
pub use error::ReportError;
pub use extractor::PdfTextExtractor;
pub use model::{ProcessingContext, StructuringModel};
pub use pipeline::{validate_content_type, ReportPipeline};
pub use record::{PatientInfo, StructuredMedicalRecord, TestResults, UploadResponse};
pub use structurer::{ColumnStrategy, MedicalTextStructurer, MergePolicy, StructurerOptions};
