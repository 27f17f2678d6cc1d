//! PDF 텍스트 추출 모듈
//!
//! lopdf 크레이트로 PDF를 메모리에서 열고, 페이지 콘텐츠 스트림의 텍스트 연산자를
//! 직접 읽어 페이지별 텍스트를 만듭니다.
//! 페이지 하나의 실패는 빈 문자열로 대체하고 문서 전체를 중단하지 않습니다.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::error::ReportError;

/// TJ 배열에서 단어 간격으로 보는 위치 조정값 (1/1000 텍스트 공간 단위)
const TJ_SPACE_THRESHOLD: f64 = 200.0;

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// 반환 길이는 항상 문서의 페이지 수와 같습니다.
/// `max_pages`를 넘는 문서는 텍스트를 디코딩하기 전에 거부합니다.
pub fn extract_pages_from_mem(bytes: &[u8], max_pages: usize) -> Result<Vec<String>, ReportError> {
    // 문서는 이 함수 스코프가 끝나면 해제됨
    let doc = load_document(bytes)?;

    let page_ids: BTreeMap<u32, ObjectId> = doc.get_pages();
    if page_ids.len() > max_pages {
        return Err(ReportError::LimitExceeded(format!(
            "PDF has {} pages (limit {})",
            page_ids.len(),
            max_pages
        )));
    }

    let page_numbers: Vec<u32> = page_ids.keys().copied().collect();
    let pages = collect_pages(&page_numbers, |page_num| match page_ids.get(&page_num) {
        Some(&page_id) => page_text(&doc, page_id),
        None => Err(format!("page {} not found", page_num)),
    });

    let empty = pages.iter().filter(|p| p.is_empty()).count();
    if empty == pages.len() && !pages.is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
    }

    Ok(pages)
}

/// 페이지 수 조회
pub fn page_count(bytes: &[u8]) -> Result<usize, ReportError> {
    Ok(load_document(bytes)?.get_pages().len())
}

/// 문서 열기 (파서 panic도 파싱 에러로 변환)
fn load_document(bytes: &[u8]) -> Result<Document, ReportError> {
    catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes)))
        .map_err(|_| ReportError::DocumentParse("PDF parser panicked".to_string()))?
        .map_err(|e| ReportError::DocumentParse(e.to_string()))
}

/// 페이지 번호 순서대로 텍스트 수집
///
/// 실패하거나 panic이 난 페이지는 빈 문자열이 됩니다.
pub(crate) fn collect_pages<F>(page_numbers: &[u32], mut extract: F) -> Vec<String>
where
    F: FnMut(u32) -> Result<String, String>,
{
    page_numbers
        .iter()
        .map(|&page_num| {
            match catch_unwind(AssertUnwindSafe(|| extract(page_num))) {
                Ok(Ok(text)) => clean_page_text(&text),
                Ok(Err(e)) => {
                    tracing::warn!("Failed to extract text from page {}: {}", page_num, e);
                    String::new()
                }
                Err(_) => {
                    tracing::warn!("Text extraction panicked on page {}", page_num);
                    String::new()
                }
            }
        })
        .collect()
}

// ============================================================================
// Content Stream Text
// ============================================================================

/// 한 페이지의 콘텐츠 스트림 → 텍스트
fn page_text(doc: &Document, page_id: ObjectId) -> Result<String, String> {
    let data = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
    let content = Content::decode(&data).map_err(|e| e.to_string())?;
    Ok(text_from_operations(&content.operations))
}

/// 텍스트 연산자에서 줄 단위 텍스트 구성
///
/// - `Tj`/`TJ`/`'`/`"` 조각은 같은 줄 안에서 공백 하나로 이어 붙임
/// - `ET`, `T*`, `'`, `"`, y 이동이 있는 `Td`/`TD`, y가 바뀌는 `Tm`에서 줄바꿈
fn text_from_operations(operations: &[lopdf::content::Operation]) -> String {
    let mut lines = LineBuilder::default();
    let mut line_y: Option<f64> = None;

    for op in operations {
        match op.operator.as_str() {
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(decode_string) {
                    lines.push(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    lines.push(decode_tj_array(items));
                }
            }
            "'" | "\"" => {
                lines.break_line();
                if let Some(text) = op.operands.last().and_then(decode_string) {
                    lines.push(text);
                }
            }
            "Td" | "TD" => {
                let dy = op.operands.get(1).and_then(as_number).unwrap_or(0.0);
                if dy != 0.0 {
                    lines.break_line();
                }
            }
            "Tm" => {
                let y = op.operands.get(5).and_then(as_number);
                if y != line_y {
                    lines.break_line();
                    line_y = y;
                }
            }
            "T*" | "ET" => lines.break_line(),
            _ => {}
        }
    }

    lines.finish()
}

/// 줄 단위 조각 누적기
#[derive(Default)]
struct LineBuilder {
    lines: Vec<String>,
    current: Vec<String>,
}

impl LineBuilder {
    fn push(&mut self, fragment: String) {
        if !fragment.trim().is_empty() {
            self.current.push(fragment);
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(self.current.join(" "));
            self.current.clear();
        }
    }

    fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}

/// TJ 배열 디코딩 (큰 음수 간격은 공백으로)
fn decode_tj_array(items: &[Object]) -> String {
    let mut text = String::new();
    for item in items {
        match item {
            Object::String(..) => {
                if let Some(s) = decode_string(item) {
                    text.push_str(&s);
                }
            }
            other => {
                if as_number(other).is_some_and(|adj| -adj >= TJ_SPACE_THRESHOLD) {
                    text.push(' ');
                }
            }
        }
    }
    text
}

/// 문자열 피연산자 디코딩 (UTF-16BE BOM 또는 Latin-1)
fn decode_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// 텍스트 조각 정리
///
/// 한 줄 안의 조각은 공백 하나로 잇고, 줄 경계는 유지합니다.
fn clean_page_text(text: &str) -> String {
    text.replace('\x00', "")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================
