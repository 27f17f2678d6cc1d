//! 구조화된 의료 기록 타입
//!
//! 업로드 1건의 최종 출력입니다. JSON 키는 camelCase이며 값이 없는 필드는 생략합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Patient Info
// ============================================================================

/// 환자 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    /// 검체 채취일 (`Collected On`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// 의뢰 의사 (`Ref. By`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
}

impl PatientInfo {
    /// 모든 필드가 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.date.is_none()
            && self.gender.is_none()
            && self.order_id.is_none()
            && self.sample.is_none()
            && self.referred_by.is_none()
    }

    /// 비어 있는 필드만 `other`의 값으로 채움
    pub fn fill_missing_from(&mut self, other: PatientInfo) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.name, other.name);
        fill(&mut self.age, other.age);
        fill(&mut self.date, other.date);
        fill(&mut self.gender, other.gender);
        fill(&mut self.order_id, other.order_id);
        fill(&mut self.sample, other.sample);
        fill(&mut self.referred_by, other.referred_by);
    }
}

// ============================================================================
// Test Results
// ============================================================================

/// 검사 결과 테이블의 한 행
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRow {
    pub investigation: Option<String>,
    pub observed_value: Option<String>,
    pub unit: Option<String>,
    pub biological_ref_interval: Option<String>,
}

impl TestRow {
    /// 값이 하나라도 있는지 여부
    pub fn has_any(&self) -> bool {
        [
            &self.investigation,
            &self.observed_value,
            &self.unit,
            &self.biological_ref_interval,
        ]
        .iter()
        .any(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

/// 검사 결과 (4개의 평행 배열)
///
/// 네 배열의 길이는 항상 같습니다. 행 단위로만 추가하며,
/// 비어 있는 컬럼은 빈 문자열로 채웁니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub investigation: Vec<String>,
    pub observed_value: Vec<String>,
    pub unit: Vec<String>,
    pub biological_ref_interval: Vec<String>,
}

impl TestResults {
    /// 행 목록에서 생성 (값이 전혀 없는 행은 건너뜀)
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a TestRow>,
    {
        let mut results = Self::default();
        for row in rows {
            results.push_row(row);
        }
        results
    }

    /// 한 행 추가
    pub fn push_row(&mut self, row: &TestRow) {
        if !row.has_any() {
            return;
        }
        let cell = |v: &Option<String>| v.clone().unwrap_or_default();
        self.investigation.push(cell(&row.investigation));
        self.observed_value.push(cell(&row.observed_value));
        self.unit.push(cell(&row.unit));
        self.biological_ref_interval
            .push(cell(&row.biological_ref_interval));
    }

    /// 다른 결과의 행을 뒤에 이어 붙임
    pub fn extend(&mut self, other: TestResults) {
        self.investigation.extend(other.investigation);
        self.observed_value.extend(other.observed_value);
        self.unit.extend(other.unit);
        self.biological_ref_interval
            .extend(other.biological_ref_interval);
    }

    /// 행 개수
    pub fn len(&self) -> usize {
        self.investigation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Structured Medical Record
// ============================================================================

/// 구조화된 의료 기록
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMedicalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResults>,
    /// 측정 항목 → 값 (직렬화 순서 고정을 위해 BTreeMap)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<String>>,
}

// ============================================================================
// Upload Response
// ============================================================================

/// 업로드 응답 본문
///
/// 성공: `{"success": true, "data": {...}}`, 실패: `{"error": "..."}`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Success {
        success: bool,
        data: StructuredMedicalRecord,
    },
    Failure {
        error: String,
    },
}

impl UploadResponse {
    pub fn success(data: StructuredMedicalRecord) -> Self {
        UploadResponse::Success {
            success: true,
            data,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        UploadResponse::Failure {
            error: error.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
