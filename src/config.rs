//! 설정 모듈
//!
//! 기본값 → 환경변수 → CLI 플래그 순서로 덮어씁니다.

use std::path::PathBuf;
use std::str::FromStr;

use crate::structurer::{ColumnStrategy, MergePolicy};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (<로컬 데이터 디렉토리>/.medreport/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medreport")
}

/// 기본 디버그 덤프 디렉토리 (<데이터 디렉토리>/dumps)
pub fn default_dump_dir() -> PathBuf {
    get_data_dir().join("dumps")
}

// ============================================================================
// Limits
// ============================================================================

/// 업로드 1건당 처리 한도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// 최대 페이지 수
    pub max_pages: usize,
    /// 페이지당 최대 문자 수
    pub max_page_chars: usize,
    /// 최대 업로드 크기 (바이트)
    pub max_upload_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_pages: 200,
            max_page_chars: 200_000,
            max_upload_bytes: 25 * 1024 * 1024, // 25MB
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 서버 바인드 주소
    pub addr: String,
    /// 처리 한도
    pub limits: Limits,
    /// 페이지 간 병합 정책
    pub merge_policy: MergePolicy,
    /// 테이블 컬럼 인덱스 해석 전략
    pub column_strategy: ColumnStrategy,
    /// 디버그 덤프 활성화 여부
    pub debug_dump: bool,
    /// 디버그 덤프 저장 위치
    pub dump_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            limits: Limits::default(),
            merge_policy: MergePolicy::default(),
            column_strategy: ColumnStrategy::default(),
            debug_dump: false,
            dump_dir: default_dump_dir(),
        }
    }
}

impl AppConfig {
    /// 환경변수에서 설정 로드
    ///
    /// 지원 변수:
    /// - `MEDREPORT_ADDR`
    /// - `MEDREPORT_MAX_PAGES`, `MEDREPORT_MAX_PAGE_CHARS`, `MEDREPORT_MAX_UPLOAD_BYTES`
    /// - `MEDREPORT_MERGE_POLICY` (`last-page-wins` | `accumulate`)
    /// - `MEDREPORT_COLUMNS` (`positional` | `phrase`)
    /// - `MEDREPORT_DEBUG_DUMP` (`1`/`true`), `MEDREPORT_DUMP_DIR`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드 (테스트용 분리)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("MEDREPORT_ADDR").filter(|v| !v.is_empty()) {
            config.addr = addr;
        }
        if let Some(v) = parse_var(&lookup, "MEDREPORT_MAX_PAGES") {
            config.limits.max_pages = v;
        }
        if let Some(v) = parse_var(&lookup, "MEDREPORT_MAX_PAGE_CHARS") {
            config.limits.max_page_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "MEDREPORT_MAX_UPLOAD_BYTES") {
            config.limits.max_upload_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "MEDREPORT_MERGE_POLICY") {
            config.merge_policy = v;
        }
        if let Some(v) = parse_var(&lookup, "MEDREPORT_COLUMNS") {
            config.column_strategy = v;
        }
        if let Some(v) = lookup("MEDREPORT_DEBUG_DUMP") {
            config.debug_dump = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(dir) = lookup("MEDREPORT_DUMP_DIR").filter(|v| !v.is_empty()) {
            config.dump_dir = PathBuf::from(dir);
        }

        config
    }
}

/// 환경변수 값 파싱 (실패 시 경고 후 무시)
fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
