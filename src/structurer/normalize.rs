//! 페이지 텍스트 정규화
//!
//! PDF 텍스트 추출 시 생기는 공백 및 컬럼 중복 아티팩트를 정리합니다.

/// 페이지 텍스트 정규화
///
/// 1. 줄마다 연속 공백을 하나로 줄이고 양끝 공백 제거 (빈 줄 제거)
/// 2. 연속으로 반복된 같은 단어를 하나로 축약
///
/// 줄바꿈은 라인 분류의 경계이므로 유지합니다.
pub fn normalize_page(text: &str) -> String {
    text.lines()
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 한 줄 정규화
pub fn normalize_line(line: &str) -> String {
    let mut words: Vec<&str> = Vec::new();

    for word in line.split_whitespace() {
        // 컬럼 중복 아티팩트: "Glucose Glucose Glucose" → "Glucose"
        if let Some(prev) = words.last() {
            if prev.eq_ignore_ascii_case(word) {
                continue;
            }
        }
        words.push(word);
    }

    words.join(" ")
}

// ============================================================================
// Tests
// ============================================================================
