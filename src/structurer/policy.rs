//! 페이지 결과 병합 정책
//!
//! 페이지별 추출 결과를 누적 기록에 반영하는 방식을 한 곳에 모아 둡니다.
//! 기본값은 마지막 페이지 우선(덮어쓰기)입니다.

use std::collections::BTreeMap;
use std::str::FromStr;

use clap::ValueEnum;

use crate::record::{PatientInfo, StructuredMedicalRecord, TestResults};

/// 한 페이지에서 추출된 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutcome {
    /// 환자 정보 버킷이 비어 있지 않을 때만 Some
    pub patient_info: Option<PatientInfo>,
    /// 검사 결과 행이 있을 때만 Some
    pub test_results: Option<TestResults>,
    pub measurements: Vec<(String, String)>,
    pub diagnosis: Vec<String>,
    pub medications: Vec<String>,
}

/// 병합 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MergePolicy {
    /// 환자 정보/검사 결과가 있는 페이지가 이전 값을 통째로 교체
    #[default]
    LastPageWins,
    /// 환자 정보는 빈 필드만 채우고, 검사 결과는 행을 이어 붙임
    Accumulate,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// 페이지 결과를 기록에 반영
pub fn apply_page(record: &mut StructuredMedicalRecord, page: PageOutcome, policy: MergePolicy) {
    let PageOutcome {
        patient_info,
        test_results,
        measurements,
        diagnosis,
        medications,
    } = page;

    match policy {
        MergePolicy::LastPageWins => {
            if patient_info.is_some() {
                record.patient_info = patient_info;
            }
            if test_results.is_some() {
                record.test_results = test_results;
            }
        }
        MergePolicy::Accumulate => {
            if let Some(info) = patient_info {
                match record.patient_info.as_mut() {
                    Some(existing) => existing.fill_missing_from(info),
                    None => record.patient_info = Some(info),
                }
            }
            if let Some(results) = test_results {
                match record.test_results.as_mut() {
                    Some(existing) => existing.extend(results),
                    None => record.test_results = Some(results),
                }
            }
        }
    }

    // 측정값/진단/처방은 정책과 관계없이 누적
    if !measurements.is_empty() {
        let map = record.measurements.get_or_insert_with(BTreeMap::new);
        for (label, value) in measurements {
            map.insert(label, value);
        }
    }
    append_unique(&mut record.diagnosis, diagnosis);
    append_unique(&mut record.medications, medications);
}

/// 순서를 유지하며 중복 없이 추가
fn append_unique(target: &mut Option<Vec<String>>, items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    let list = target.get_or_insert_with(Vec::new);
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
