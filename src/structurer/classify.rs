//! 라인 분류
//!
//! 정규화된 페이지의 각 줄을 키워드/정규식 휴리스틱으로 버킷에 분류합니다.
//! 한 줄이 여러 버킷에 동시에 들어갈 수 있습니다.
//!
//! - 환자 정보: 고정 키워드 포함 여부
//! - 검사 결과 테이블: 헤더 줄에서 컬럼 위치를 기록한 뒤, 이후 줄을 위치 기반으로 분해
//! - 측정값 / 진단 / 처방: 라벨 패턴

use std::str::FromStr;

use clap::ValueEnum;
use regex::Regex;

use crate::record::TestRow;

/// 환자 정보 줄 판별 키워드 (소문자)
pub const PATIENT_INFO_TRIGGERS: &[&str] = &[
    "order id",
    "name",
    "collected on",
    "gender",
    "age",
    "sample",
    "ref. by",
];

/// 데이터 행으로 취급하기 위한 최소 토큰 수
const MIN_ROW_TOKENS: usize = 3;

// ============================================================================
// Columns
// ============================================================================

/// 검사 결과 테이블 컬럼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Investigation,
    ObservedValue,
    Unit,
    BiologicalRefInterval,
}

impl Column {
    /// 헤더 토큰이 가리키는 컬럼
    fn from_header_token(token: &str) -> Option<Self> {
        let token = token.to_lowercase();
        if token.contains("investigation") {
            Some(Column::Investigation)
        } else if token.contains("observed") || token.contains("value") {
            Some(Column::ObservedValue)
        } else if token.contains("unit") {
            Some(Column::Unit)
        } else if token.contains("biological") || token.contains("reference") {
            Some(Column::BiologicalRefInterval)
        } else {
            None
        }
    }

    /// 여러 단어 컬럼 제목의 연속 토큰 판별 ("Ref", "Interval", "Range")
    fn continues_title(self, token: &str) -> bool {
        let token = token.to_lowercase();
        match self {
            Column::BiologicalRefInterval => {
                token.starts_with("ref") || token.contains("interval") || token.contains("range")
            }
            Column::ObservedValue => token.contains("value") || token.contains("result"),
            _ => false,
        }
    }
}

/// 헤더에서 해석된 컬럼 인덱스 (0부터 시작하는 토큰 인덱스)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnIndices {
    pub investigation: Option<usize>,
    pub observed_value: Option<usize>,
    pub unit: Option<usize>,
    pub biological_ref_interval: Option<usize>,
}

impl ColumnIndices {
    fn slot(&mut self, column: Column) -> &mut Option<usize> {
        match column {
            Column::Investigation => &mut self.investigation,
            Column::ObservedValue => &mut self.observed_value,
            Column::Unit => &mut self.unit,
            Column::BiologicalRefInterval => &mut self.biological_ref_interval,
        }
    }

    /// 같은 컬럼이 여러 번 나오면 처음 위치를 유지
    fn record(&mut self, column: Column, index: usize) {
        let slot = self.slot(column);
        if slot.is_none() {
            *slot = Some(index);
        }
    }

    /// 데이터 행을 컬럼 값으로 분해
    pub fn split_row(&self, line: &str) -> TestRow {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| tokens.get(i))
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
        };

        TestRow {
            investigation: cell(self.investigation),
            observed_value: cell(self.observed_value),
            unit: cell(self.unit),
            biological_ref_interval: cell(self.biological_ref_interval),
        }
    }
}

// ============================================================================
// Column Resolver
// ============================================================================

/// 헤더 줄 → 컬럼 인덱스 해석 전략
pub trait ColumnResolver: Send + Sync {
    /// 헤더 줄에서 컬럼 인덱스 해석
    fn resolve_columns(&self, header_line: &str) -> ColumnIndices;

    /// 전략 이름
    fn name(&self) -> &'static str;
}

/// 헤더 토큰 위치를 그대로 컬럼 인덱스로 사용
///
/// "Investigation Observed Value Unit ..." 헤더에서는 Unit이 3번 토큰이 되므로
/// 데이터 행과 어긋날 수 있습니다. 기본 동작으로 유지합니다.
#[derive(Debug, Default)]
pub struct PositionalColumnResolver;

impl ColumnResolver for PositionalColumnResolver {
    fn resolve_columns(&self, header_line: &str) -> ColumnIndices {
        let mut indices = ColumnIndices::default();
        for (i, token) in header_line.split_whitespace().enumerate() {
            if let Some(column) = Column::from_header_token(token) {
                indices.record(column, i);
            }
        }
        indices
    }

    fn name(&self) -> &'static str {
        "positional"
    }
}

/// 여러 단어로 된 컬럼 제목을 하나의 컬럼으로 묶어서 계산
///
/// "Observed Value" → 1개, "Biological Ref Interval" → 1개
#[derive(Debug, Default)]
pub struct PhraseColumnResolver;

impl ColumnResolver for PhraseColumnResolver {
    fn resolve_columns(&self, header_line: &str) -> ColumnIndices {
        let mut indices = ColumnIndices::default();
        let mut logical: Option<usize> = None;
        let mut current: Option<Column> = None;

        for token in header_line.split_whitespace() {
            let continues = current.is_some_and(|c| c.continues_title(token));
            if continues {
                continue;
            }

            let index = logical.map_or(0, |i| i + 1);
            logical = Some(index);
            current = Column::from_header_token(token);
            if let Some(column) = current {
                indices.record(column, index);
            }
        }

        indices
    }

    fn name(&self) -> &'static str {
        "phrase"
    }
}

/// 컬럼 해석 전략 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColumnStrategy {
    /// 헤더 토큰 위치 그대로 (기본)
    #[default]
    Positional,
    /// 여러 단어 컬럼 제목 묶음
    Phrase,
}

impl ColumnStrategy {
    /// 전략 구현체 생성
    pub fn resolver(self) -> Box<dyn ColumnResolver> {
        match self {
            ColumnStrategy::Positional => Box::new(PositionalColumnResolver),
            ColumnStrategy::Phrase => Box::new(PhraseColumnResolver),
        }
    }
}

impl FromStr for ColumnStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

// ============================================================================
// Page Buckets
// ============================================================================

/// 페이지 단위 라인 분류 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBuckets {
    /// 환자 정보 줄
    pub patient_info: Vec<String>,
    /// 검사 결과 테이블 행
    pub test_rows: Vec<TestRow>,
    /// (측정 항목, 값)
    pub measurements: Vec<(String, String)>,
    pub diagnosis: Vec<String>,
    pub medication: Vec<String>,
}

impl PageBuckets {
    /// 컬럼 버킷 (비어 있지 않은 값만, 행 순서대로)
    pub fn column_values(&self, column: Column) -> Vec<&str> {
        self.test_rows
            .iter()
            .filter_map(|row| match column {
                Column::Investigation => row.investigation.as_deref(),
                Column::ObservedValue => row.observed_value.as_deref(),
                Column::Unit => row.unit.as_deref(),
                Column::BiologicalRefInterval => row.biological_ref_interval.as_deref(),
            })
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// 분류된 줄이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.patient_info.is_empty()
            && self.test_rows.is_empty()
            && self.measurements.is_empty()
            && self.diagnosis.is_empty()
            && self.medication.is_empty()
    }
}

// ============================================================================
// Line Classifier
// ============================================================================

/// 라인 분류기
pub struct LineClassifier {
    resolver: Box<dyn ColumnResolver>,
    measurement_re: Regex,
    diagnosis_re: Regex,
    medication_label_re: Regex,
    dosage_form_re: Regex,
}

impl LineClassifier {
    /// 컬럼 해석 전략을 지정하여 생성
    pub fn new(resolver: Box<dyn ColumnResolver>) -> Result<Self, regex::Error> {
        Ok(Self {
            resolver,
            // "Hemoglobin: 13.5 g/dL", "BP = 120/80 mmHg"
            measurement_re: Regex::new(
                r"^([A-Za-z][A-Za-z0-9 ()%./-]{0,40}?)\s*[:=]\s*(\d[\d.,/]*(?:\s*[A-Za-z%µ/^][A-Za-z0-9%µ/^.]*)?)$",
            )?,
            diagnosis_re: Regex::new(
                r"(?i)^(?:clinical\s+|provisional\s+)?(?:diagnosis|impression|conclusion)\b\s*[:.\-]?\s*(.*)$",
            )?,
            medication_label_re: Regex::new(
                r"(?i)^(?:medications?|rx|prescription)\s*[:.\-]\s*(.+)$",
            )?,
            dosage_form_re: Regex::new(r"(?i)^(?:tab|tablet|cap|capsule|syp|syrup|inj)\b\.?\s+\S")?,
        })
    }

    /// 사용 중인 컬럼 해석 전략 이름
    pub fn resolver_name(&self) -> &'static str {
        self.resolver.name()
    }

    /// 정규화된 페이지 텍스트 분류
    pub fn classify_page(&self, page: &str) -> PageBuckets {
        let mut buckets = PageBuckets::default();
        let mut columns: Option<ColumnIndices> = None;

        for line in page.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let lower = line.to_lowercase();

            let is_patient_info = is_patient_info_line(&lower);
            if is_patient_info {
                buckets.patient_info.push(line.to_string());
            }

            if is_table_header(&lower) {
                // 나중 헤더가 이전 컬럼 위치를 덮어씀
                let indices = self.resolver.resolve_columns(line);
                tracing::debug!("Table header detected: {:?}", indices);
                columns = Some(indices);
                continue;
            }

            if let Some(indices) = &columns {
                if line.split_whitespace().count() >= MIN_ROW_TOKENS {
                    let row = indices.split_row(line);
                    if row.has_any() {
                        buckets.test_rows.push(row);
                    }
                }
            }

            if !is_patient_info {
                if let Some(caps) = self.measurement_re.captures(line) {
                    buckets
                        .measurements
                        .push((caps[1].trim().to_string(), caps[2].trim().to_string()));
                }
            }

            if let Some(caps) = self.diagnosis_re.captures(line) {
                let text = caps[1].trim();
                if !text.is_empty() {
                    buckets.diagnosis.push(text.to_string());
                }
            }

            if let Some(caps) = self.medication_label_re.captures(line) {
                buckets.medication.push(caps[1].trim().to_string());
            } else if self.dosage_form_re.is_match(line) {
                buckets.medication.push(line.to_string());
            }
        }

        buckets
    }
}

/// 환자 정보 줄 여부 (소문자 입력)
fn is_patient_info_line(lower: &str) -> bool {
    PATIENT_INFO_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// 검사 결과 테이블 헤더 여부 (소문자 입력)
fn is_table_header(lower: &str) -> bool {
    lower.contains("investigation")
        && (lower.contains("observed") || lower.contains("value"))
        && lower.contains("unit")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Investigation Observed Value Unit Biological Ref Interval";

    fn classifier(strategy: ColumnStrategy) -> LineClassifier {
        LineClassifier::new(strategy.resolver()).unwrap()
    }

    #[test]
    fn test_patient_info_triggers() {
        let c = classifier(ColumnStrategy::Positional);
        let page = "Order ID. 12345, Name. John Doe\nREF. BY: Dr. Smith\nHospital Lab";
        let buckets = c.classify_page(page);
        assert_eq!(buckets.patient_info.len(), 2);
        assert!(buckets.patient_info[1].starts_with("REF. BY"));
    }

    #[test]
    fn test_header_detection() {
        assert!(is_table_header(&HEADER.to_lowercase()));
        assert!(is_table_header("investigation result value units"));
        assert!(!is_table_header("investigation observed"));
        assert!(!is_table_header("observed value unit"));
    }

    #[test]
    fn test_positional_columns() {
        let indices = PositionalColumnResolver.resolve_columns(HEADER);
        assert_eq!(indices.investigation, Some(0));
        assert_eq!(indices.observed_value, Some(1));
        assert_eq!(indices.unit, Some(3));
        assert_eq!(indices.biological_ref_interval, Some(4));
    }

    #[test]
    fn test_phrase_columns() {
        let indices = PhraseColumnResolver.resolve_columns(HEADER);
        assert_eq!(indices.investigation, Some(0));
        assert_eq!(indices.observed_value, Some(1));
        assert_eq!(indices.unit, Some(2));
        assert_eq!(indices.biological_ref_interval, Some(3));
    }

    #[test]
    fn test_rows_use_header_token_positions() {
        let c = classifier(ColumnStrategy::Positional);
        let page = format!("{HEADER}\nGlucose 95 mg/dL 70-110 fasting");
        let buckets = c.classify_page(&page);

        assert_eq!(buckets.test_rows.len(), 1);
        assert_eq!(buckets.column_values(Column::Investigation), vec!["Glucose"]);
        assert_eq!(buckets.column_values(Column::ObservedValue), vec!["95"]);
        assert_eq!(buckets.column_values(Column::Unit), vec!["70-110"]);
        assert_eq!(
            buckets.column_values(Column::BiologicalRefInterval),
            vec!["fasting"]
        );
    }

    #[test]
    fn test_out_of_range_columns_are_skipped() {
        let c = classifier(ColumnStrategy::Positional);
        let page = format!("{HEADER}\nGlucose 95 mg/dL");
        let buckets = c.classify_page(&page);

        assert_eq!(buckets.column_values(Column::Investigation), vec!["Glucose"]);
        assert_eq!(buckets.column_values(Column::ObservedValue), vec!["95"]);
        assert!(buckets.column_values(Column::Unit).is_empty());
        assert!(buckets
            .column_values(Column::BiologicalRefInterval)
            .is_empty());
    }

    #[test]
    fn test_phrase_rows_align() {
        let c = classifier(ColumnStrategy::Phrase);
        let page = format!("{HEADER}\nGlucose 95 mg/dL 70-110");
        let buckets = c.classify_page(&page);
        let row = &buckets.test_rows[0];
        assert_eq!(row.unit.as_deref(), Some("mg/dL"));
        assert_eq!(row.biological_ref_interval.as_deref(), Some("70-110"));
    }

    #[test]
    fn test_rows_require_header_and_min_tokens() {
        let c = classifier(ColumnStrategy::Positional);
        let buckets = c.classify_page(&format!("Glucose 95 mg/dL\n{HEADER}\nNote only\nUrea 30 mg/dL"));
        assert_eq!(buckets.test_rows.len(), 1);
        assert_eq!(buckets.test_rows[0].investigation.as_deref(), Some("Urea"));
    }

    #[test]
    fn test_later_header_replaces_columns() {
        let c = classifier(ColumnStrategy::Positional);
        let page = format!(
            "{HEADER}\nGlucose 95 mg/dL\nUnit Investigation Value\nmg/dL Urea 30"
        );
        let buckets = c.classify_page(&page);
        assert_eq!(
            buckets.column_values(Column::Investigation),
            vec!["Glucose", "Urea"]
        );
        assert_eq!(buckets.column_values(Column::Unit), vec!["mg/dL"]);
    }

    #[test]
    fn test_measurements_diagnosis_medication() {
        let c = classifier(ColumnStrategy::Positional);
        let page = "Hemoglobin: 13.5 g/dL\nBP = 120/80 mmHg\nAge: 45\n\
                    Impression: Mild anemia\nMedications: Ferrous sulfate 325 mg\n\
                    Tab. Paracetamol 500 mg";
        let buckets = c.classify_page(page);

        assert_eq!(
            buckets.measurements,
            vec![
                ("Hemoglobin".to_string(), "13.5 g/dL".to_string()),
                ("BP".to_string(), "120/80 mmHg".to_string()),
            ]
        );
        assert_eq!(buckets.diagnosis, vec!["Mild anemia"]);
        assert_eq!(
            buckets.medication,
            vec!["Ferrous sulfate 325 mg", "Tab. Paracetamol 500 mg"]
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("phrase".parse::<ColumnStrategy>(), Ok(ColumnStrategy::Phrase));
        assert_eq!(
            "Positional".parse::<ColumnStrategy>(),
            Ok(ColumnStrategy::Positional)
        );
        assert!("offsets".parse::<ColumnStrategy>().is_err());
    }
}
