//! 의료 텍스트 구조화 모듈
//!
//! 페이지 텍스트 목록을 받아 구조화된 의료 기록을 만듭니다.
//! - normalize: 공백/중복 단어 정리
//! - classify: 라인 분류 (환자 정보, 검사 결과 테이블, 측정값, 진단, 처방)
//! - fields: 규칙 테이블 기반 환자 정보 필드 추출
//! - policy: 페이지 간 병합 정책

mod classify;
mod fields;
mod normalize;
mod policy;

use std::panic::{catch_unwind, AssertUnwindSafe};

pub use classify::{
    Column, ColumnIndices, ColumnResolver, ColumnStrategy, LineClassifier, PageBuckets,
    PhraseColumnResolver, PositionalColumnResolver, PATIENT_INFO_TRIGGERS,
};
pub use fields::{FieldExtractor, FieldRule, PatientField, Terminator, DEFAULT_FIELD_RULES};
pub use normalize::{normalize_line, normalize_page};
pub use policy::{apply_page, MergePolicy, PageOutcome};

use crate::config::Limits;
use crate::error::ReportError;
use crate::model::{ProcessingContext, StructuringModel};
use crate::record::{StructuredMedicalRecord, TestResults};

// ============================================================================
// Options
// ============================================================================

/// 구조화 옵션
#[derive(Debug, Clone, Copy)]
pub struct StructurerOptions {
    pub merge_policy: MergePolicy,
    pub column_strategy: ColumnStrategy,
    /// 페이지당 최대 문자 수
    pub max_page_chars: usize,
}

impl Default for StructurerOptions {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            column_strategy: ColumnStrategy::default(),
            max_page_chars: Limits::default().max_page_chars,
        }
    }
}

// ============================================================================
// MedicalTextStructurer
// ============================================================================

/// 의료 텍스트 구조화기
///
/// 호출 간 상태를 갖지 않으므로 같은 입력에는 항상 같은 결과를 반환합니다.
pub struct MedicalTextStructurer {
    classifier: LineClassifier,
    fields: FieldExtractor,
    options: StructurerOptions,
}

impl MedicalTextStructurer {
    /// 옵션으로 생성 (규칙 컴파일 실패 시 `Structuring` 에러)
    pub fn new(options: StructurerOptions) -> Result<Self, ReportError> {
        let classifier = LineClassifier::new(options.column_strategy.resolver())
            .map_err(|e| ReportError::Structuring(format!("line rules: {e}")))?;
        let fields = FieldExtractor::with_default_rules()
            .map_err(|e| ReportError::Structuring(format!("field rules: {e}")))?;

        Ok(Self {
            classifier,
            fields,
            options,
        })
    }

    /// 기본 옵션으로 생성
    pub fn with_defaults() -> Result<Self, ReportError> {
        Self::new(StructurerOptions::default())
    }

    pub fn options(&self) -> &StructurerOptions {
        &self.options
    }

    /// 페이지 텍스트 → 구조화된 의료 기록
    ///
    /// 모델은 호출 전에 준비되고, 실패 시 에러를 반환하기 전에 해제됩니다.
    /// 라인 분류 기능을 보고하는 모델만 페이지 버킷 보정에 참여합니다.
    pub fn structure(
        &self,
        ctx: &mut ProcessingContext,
        pages: &[String],
    ) -> Result<StructuredMedicalRecord, ReportError> {
        let model = ctx.model();
        let capabilities = model.capabilities();
        tracing::debug!(
            "Structuring {} pages (model: {}, {:?})",
            pages.len(),
            model.name(),
            capabilities
        );
        let refiner = capabilities.classify_lines.then_some(model);

        let result = catch_unwind(AssertUnwindSafe(|| self.structure_pages(pages, refiner)))
            .unwrap_or_else(|_| Err(ReportError::Structuring("panic during structuring".into())));

        if let Err(e) = &result {
            tracing::debug!("Structuring failed, releasing model: {}", e);
            ctx.release();
        }
        result
    }

    fn structure_pages(
        &self,
        pages: &[String],
        mut refiner: Option<&mut dyn StructuringModel>,
    ) -> Result<StructuredMedicalRecord, ReportError> {
        let mut record = StructuredMedicalRecord::default();

        for (i, page) in pages.iter().enumerate() {
            let chars = page.chars().count();
            if chars > self.options.max_page_chars {
                return Err(ReportError::LimitExceeded(format!(
                    "Page {} has {} characters (limit {})",
                    i + 1,
                    chars,
                    self.options.max_page_chars
                )));
            }

            let mut buckets = self.classify(page);
            if let Some(model) = refiner.as_mut() {
                model.refine_page(&mut buckets);
            }
            tracing::debug!(
                "Page {}: {} patient-info lines, {} table rows, {} measurements",
                i + 1,
                buckets.patient_info.len(),
                buckets.test_rows.len(),
                buckets.measurements.len()
            );

            let outcome = self.page_outcome(&buckets);
            apply_page(&mut record, outcome, self.options.merge_policy);
        }

        Ok(record)
    }

    /// 페이지 텍스트 정규화 후 라인 분류
    pub fn classify(&self, page: &str) -> PageBuckets {
        let normalized = normalize_page(page);
        self.classifier.classify_page(&normalized)
    }

    /// 버킷 → 페이지 결과
    pub fn page_outcome(&self, buckets: &PageBuckets) -> PageOutcome {
        let patient_info = if buckets.patient_info.is_empty() {
            None
        } else {
            Some(self.fields.extract(&buckets.patient_info.join("\n")))
        };

        // 검사명 버킷이 비어 있으면 이 페이지는 테이블 결과가 없는 것으로 봄
        let test_results = if buckets.column_values(Column::Investigation).is_empty() {
            None
        } else {
            Some(TestResults::from_rows(&buckets.test_rows))
        };

        PageOutcome {
            patient_info,
            test_results,
            measurements: buckets.measurements.clone(),
            diagnosis: buckets.diagnosis.clone(),
            medications: buckets.medication.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::model::tests::counting_context;
    use crate::model::ModelCapabilities;

    /// 라인 분류 기능을 보고하고 페이지마다 진단 한 줄을 추가하는 모델
    struct NotingModel {
        classify_lines: bool,
    }

    impl StructuringModel for NotingModel {
        fn name(&self) -> &'static str {
            "noting"
        }

        fn capabilities(&self) -> ModelCapabilities {
            ModelCapabilities {
                classify_lines: self.classify_lines,
            }
        }

        fn refine_page(&mut self, buckets: &mut PageBuckets) {
            buckets.diagnosis.push("model note".to_string());
        }

        fn release(&mut self) {}
    }

    const REPORT_PAGE: &str = "City Diagnostics Laboratory\n\
        Order ID. 12345, Name. John Doe, Collected On. 01-Jan-2024\n\
        Gender/Age. 45 Yrs Male\n\
        Sample: Serum, Ref. By: Dr. Smith\n\
        Impression: Within normal limits\n\
        Investigation Observed Value Unit Biological Ref Interval\n\
        Glucose Glucose Glucose 95 mg/dL 70-110\n\
        Creatinine 1.1 mg/dL 0.7-1.3";

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_structure_report_page() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer.structure(&mut ctx, &pages(&[REPORT_PAGE])).unwrap();

        let info = record.patient_info.unwrap();
        assert_eq!(info.order_id.as_deref(), Some("12345"));
        assert_eq!(info.name.as_deref(), Some("John Doe"));
        assert_eq!(info.date.as_deref(), Some("01-Jan-2024"));
        assert_eq!(info.age.as_deref(), Some("45"));
        assert_eq!(info.gender.as_deref(), Some("male"));
        assert_eq!(info.sample.as_deref(), Some("Serum"));
        assert_eq!(info.referred_by.as_deref(), Some("Dr. Smith"));

        let results = record.test_results.unwrap();
        assert_eq!(results.investigation, vec!["Glucose", "Creatinine"]);
        assert_eq!(results.observed_value, vec!["95", "1.1"]);
        // 위치 기반: Unit 헤더 토큰(3번)은 데이터 행의 참고 범위 위치
        assert_eq!(results.unit, vec!["70-110", "0.7-1.3"]);
        assert_eq!(results.biological_ref_interval, vec!["", ""]);

        assert_eq!(record.diagnosis.unwrap(), vec!["Within normal limits"]);
    }

    #[test]
    fn test_phrase_strategy_aligns_units() {
        let structurer = MedicalTextStructurer::new(StructurerOptions {
            column_strategy: ColumnStrategy::Phrase,
            ..Default::default()
        })
        .unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer.structure(&mut ctx, &pages(&[REPORT_PAGE])).unwrap();

        let results = record.test_results.unwrap();
        assert_eq!(results.unit, vec!["mg/dL", "mg/dL"]);
        assert_eq!(results.biological_ref_interval, vec!["70-110", "0.7-1.3"]);
    }

    #[test]
    fn test_duplicate_word_artifact_is_collapsed() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let buckets = structurer.classify(
            "Investigation Observed Value Unit\nGlucose Glucose Glucose 95 mg/dL",
        );
        assert_eq!(buckets.column_values(Column::Investigation), vec!["Glucose"]);
        assert_eq!(buckets.column_values(Column::ObservedValue), vec!["95"]);
    }

    #[test]
    fn test_last_page_overwrites_patient_info() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer
            .structure(
                &mut ctx,
                &pages(&[REPORT_PAGE, "Name. Jane Roe\nPage 2 of 2"]),
            )
            .unwrap();

        let info = record.patient_info.unwrap();
        assert_eq!(info.name.as_deref(), Some("Jane Roe"));
        assert_eq!(info.order_id, None);
        // 두 번째 페이지에는 테이블이 없으므로 첫 페이지 결과 유지
        assert_eq!(record.test_results.unwrap().len(), 2);
    }

    #[test]
    fn test_rows_without_investigation_keep_earlier_table() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer
            .structure(
                &mut ctx,
                &pages(&[REPORT_PAGE, "Observed Value Unit Investigation\n95 mg/dL 70-110"]),
            )
            .unwrap();

        let results = record.test_results.unwrap();
        assert_eq!(results.investigation, vec!["Glucose", "Creatinine"]);
        assert_eq!(results.observed_value, vec!["95", "1.1"]);
    }

    #[test]
    fn test_patient_fields_stay_on_their_line() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer
            .structure(&mut ctx, &pages(&["Gender/Age. 45\nSample: Serum"]))
            .unwrap();

        let info = record.patient_info.unwrap();
        assert_eq!(info.age.as_deref(), Some("45"));
        assert_eq!(info.gender, None);
        assert_eq!(info.sample.as_deref(), Some("Serum"));
    }

    #[test]
    fn test_model_refines_only_when_capable() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let input = pages(&["Impression: Stable"]);

        let mut capable =
            ProcessingContext::with_factory(|| Box::new(NotingModel { classify_lines: true }));
        let record = structurer.structure(&mut capable, &input).unwrap();
        assert_eq!(record.diagnosis.unwrap(), vec!["Stable", "model note"]);

        let mut inert =
            ProcessingContext::with_factory(|| Box::new(NotingModel { classify_lines: false }));
        let record = structurer.structure(&mut inert, &input).unwrap();
        assert_eq!(record.diagnosis.unwrap(), vec!["Stable"]);
    }

    #[test]
    fn test_structure_is_idempotent() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let input = pages(&[REPORT_PAGE, "Hemoglobin: 13.5 g/dL\nTab. Metformin 500 mg"]);

        let mut ctx = ProcessingContext::new();
        let first = serde_json::to_vec(&structurer.structure(&mut ctx, &input).unwrap()).unwrap();
        let second = serde_json::to_vec(&structurer.structure(&mut ctx, &input).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_pages_yield_empty_record() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let mut ctx = ProcessingContext::new();
        let record = structurer.structure(&mut ctx, &pages(&["", ""])).unwrap();
        assert_eq!(record, StructuredMedicalRecord::default());
        assert_eq!(serde_json::to_string(&record).unwrap(), "{}");
    }

    #[test]
    fn test_failure_releases_model_once() {
        let structurer = MedicalTextStructurer::new(StructurerOptions {
            max_page_chars: 10,
            ..Default::default()
        })
        .unwrap();
        let (mut ctx, created, released) = counting_context();

        let result = structurer.structure(&mut ctx, &pages(&[REPORT_PAGE]));
        assert!(matches!(result, Err(ReportError::LimitExceeded(_))));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!ctx.has_model());

        drop(ctx);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_success_keeps_model_until_context_drop() {
        let structurer = MedicalTextStructurer::with_defaults().unwrap();
        let (mut ctx, _, released) = counting_context();

        structurer.structure(&mut ctx, &pages(&[REPORT_PAGE])).unwrap();
        assert!(ctx.has_model());
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(ctx);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
