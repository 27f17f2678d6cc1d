//! 환자 정보 필드 추출
//!
//! `{필드, 라벨 패턴, 값 패턴, 종료 조건}` 규칙 테이블을 하나의 루틴으로 적용합니다.
//! 규칙은 순서대로 적용되며 이미 채워진 필드는 덮어쓰지 않습니다.

use regex::Regex;

use crate::record::PatientInfo;

// ============================================================================
// Rule Definitions
// ============================================================================

/// 추출 대상 필드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientField {
    Name,
    Age,
    Date,
    Gender,
    OrderId,
    Sample,
    ReferredBy,
}

/// 값의 끝 판별 방식
///
/// 모든 패턴은 줄바꿈을 넘지 않습니다 (`[ \t]`만 공백으로 취급).
#[derive(Debug, Clone, Copy)]
pub enum Terminator {
    /// 다음 쉼표 또는 줄 끝
    CommaOrLineEnd,
    /// 다음 라벨, 쉼표, 줄 끝 중 먼저 나오는 것
    NextLabel(&'static [&'static str]),
    /// 값 패턴 자체로 끝이 정해짐
    Pattern,
}

impl Terminator {
    fn pattern(&self) -> String {
        match self {
            Terminator::CommaOrLineEnd => r"[ \t]*(?:,|$)".to_string(),
            Terminator::NextLabel(labels) => {
                format!(r"[ \t]*(?:,|$|\b(?:{})\b)", labels.join("|"))
            }
            Terminator::Pattern => String::new(),
        }
    }
}

/// 필드 추출 규칙
///
/// `value`의 캡처 그룹 순서가 `fields` 순서와 일치해야 합니다.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub fields: &'static [PatientField],
    /// 라벨 + 구분자 패턴 (대소문자 무시)
    pub label: &'static str,
    pub value: &'static str,
    pub terminator: Terminator,
}

/// 이름 값을 끊는 다음 라벨
const NAME_BOUNDARY_LABELS: &[&str] = &["Collected", "Gender", "Age", "Sample", "Ref"];

/// 기본 규칙 테이블
pub const DEFAULT_FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        fields: &[PatientField::OrderId],
        label: r"Order[ \t]*ID[ \t]*[.:]",
        value: r"(.+?)",
        terminator: Terminator::CommaOrLineEnd,
    },
    FieldRule {
        fields: &[PatientField::Date],
        label: r"Collected[ \t]+On[ \t]*[.:]",
        value: r"(.+?)",
        terminator: Terminator::CommaOrLineEnd,
    },
    FieldRule {
        fields: &[PatientField::Sample],
        label: r"Sample[ \t]*[.:]",
        value: r"(.+?)",
        terminator: Terminator::CommaOrLineEnd,
    },
    FieldRule {
        fields: &[PatientField::ReferredBy],
        label: r"Ref\.?[ \t]*By[ \t]*[.:]",
        value: r"(.+?)",
        terminator: Terminator::CommaOrLineEnd,
    },
    FieldRule {
        fields: &[PatientField::Name],
        label: r"Name[ \t]*[.:]",
        value: r"(.+?)",
        terminator: Terminator::NextLabel(NAME_BOUNDARY_LABELS),
    },
    // "Gender/Age. 45 Yrs / Male"
    FieldRule {
        fields: &[PatientField::Age, PatientField::Gender],
        label: r"Gender[ \t]*/[ \t]*Age[ \t]*[.:]?",
        value: r"(\d+)[ \t]*(?:Years?|Yrs?|Y)?\.?[ \t]*/?[ \t]*([A-Za-z]+)",
        terminator: Terminator::Pattern,
    },
    // 분리된 표기: "Age: 45", "Gender: Male"
    FieldRule {
        fields: &[PatientField::Age],
        label: r"Age[ \t]*[.:]",
        value: r"(\d+)",
        terminator: Terminator::Pattern,
    },
    FieldRule {
        fields: &[PatientField::Gender],
        label: r"(?:Gender|Sex)[ \t]*[.:]",
        value: r"([A-Za-z]+)",
        terminator: Terminator::Pattern,
    },
];

impl FieldRule {
    /// 규칙 → 정규식 문자열
    pub fn to_pattern(&self) -> String {
        format!(
            r"(?im)\b(?:{})[ \t]*{}{}",
            self.label,
            self.value,
            self.terminator.pattern()
        )
    }
}

// ============================================================================
// Field Extractor
// ============================================================================

struct CompiledRule {
    rule: FieldRule,
    regex: Regex,
}

/// 규칙 테이블 기반 필드 추출기
pub struct FieldExtractor {
    rules: Vec<CompiledRule>,
}

impl FieldExtractor {
    /// 규칙 테이블 컴파일
    pub fn new(rules: &[FieldRule]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    rule: *rule,
                    regex: Regex::new(&rule.to_pattern())?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { rules })
    }

    /// 기본 규칙으로 생성
    pub fn with_default_rules() -> Result<Self, regex::Error> {
        Self::new(DEFAULT_FIELD_RULES)
    }

    /// 환자 정보 텍스트에서 필드 추출
    pub fn extract(&self, text: &str) -> PatientInfo {
        let mut info = PatientInfo::default();

        for compiled in &self.rules {
            let fields = compiled.rule.fields;
            if fields.iter().all(|f| slot(&mut info, *f).is_some()) {
                continue;
            }

            let Some(caps) = compiled.regex.captures(text) else {
                continue;
            };

            for (i, field) in fields.iter().enumerate() {
                let Some(raw) = caps.get(i + 1) else {
                    continue;
                };
                let target = slot(&mut info, *field);
                if target.is_none() {
                    *target = normalize_value(*field, raw.as_str());
                }
            }
        }

        info
    }
}

fn slot(info: &mut PatientInfo, field: PatientField) -> &mut Option<String> {
    match field {
        PatientField::Name => &mut info.name,
        PatientField::Age => &mut info.age,
        PatientField::Date => &mut info.date,
        PatientField::Gender => &mut info.gender,
        PatientField::OrderId => &mut info.order_id,
        PatientField::Sample => &mut info.sample,
        PatientField::ReferredBy => &mut info.referred_by,
    }
}

/// 필드별 값 정리
///
/// 성별은 모든 패턴에서 소문자로 통일합니다.
fn normalize_value(field: PatientField, raw: &str) -> Option<String> {
    let value = raw.trim().trim_end_matches(',').trim();
    if value.is_empty() {
        return None;
    }

    match field {
        PatientField::Gender => Some(value.to_lowercase()),
        PatientField::Age => {
            let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
            (!digits.is_empty()).then_some(digits)
        }
        _ => Some(value.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
