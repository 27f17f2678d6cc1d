//! CLI 모듈
//!
//! medreport CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use walkdir::WalkDir;

use crate::config::{get_data_dir, AppConfig};
use crate::extractor::PdfTextExtractor;
use crate::pipeline::{failure_response, validate_content_type, ReportPipeline, PDF_CONTENT_TYPE};
use crate::record::UploadResponse;
use crate::server::{start_server, AppState};
use crate::structurer::{ColumnStrategy, MergePolicy};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "medreport")]
#[command(version, about = "의료 검사 리포트 PDF 구조화 도구", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 구조화 옵션 (환경변수 설정을 덮어씀)
#[derive(Args, Debug, Default)]
pub struct ProcessingArgs {
    /// 페이지 간 병합 정책
    #[arg(long, value_enum)]
    policy: Option<MergePolicy>,

    /// 테이블 컬럼 해석 전략
    #[arg(long, value_enum)]
    columns: Option<ColumnStrategy>,

    /// 최대 페이지 수
    #[arg(long)]
    max_pages: Option<usize>,

    /// 디버그 덤프 저장
    #[arg(long)]
    dump: bool,

    /// 디버그 덤프 위치
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

impl ProcessingArgs {
    /// 환경변수 설정에 CLI 플래그 적용
    fn apply(self, config: &mut AppConfig) {
        if let Some(policy) = self.policy {
            config.merge_policy = policy;
        }
        if let Some(columns) = self.columns {
            config.column_strategy = columns;
        }
        if let Some(max_pages) = self.max_pages {
            config.limits.max_pages = max_pages;
        }
        if self.dump {
            config.debug_dump = true;
        }
        if let Some(dir) = self.dump_dir {
            config.dump_dir = dir;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 업로드 서버 실행
    Serve {
        /// 바인드 주소 (기본: MEDREPORT_ADDR 또는 0.0.0.0:3000)
        #[arg(short, long)]
        addr: Option<String>,

        #[command(flatten)]
        options: ProcessingArgs,
    },

    /// PDF 파일 또는 폴더를 구조화하여 JSON 출력
    Process {
        /// 처리할 PDF 파일
        file: Option<PathBuf>,

        /// 처리할 폴더 경로 (재귀, *.pdf)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// JSON 들여쓰기
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        options: ProcessingArgs,
    },

    /// 페이지별 원본 텍스트 출력
    Extract {
        /// PDF 파일 경로
        file: PathBuf,
    },

    /// 설정 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env();

    match cli.command {
        Commands::Serve { addr, options } => {
            options.apply(&mut config);
            if let Some(addr) = addr {
                config.addr = addr;
            }
            cmd_serve(config).await
        }
        Commands::Process {
            file,
            dir,
            pretty,
            options,
        } => {
            options.apply(&mut config);
            cmd_process(config, file, dir, pretty).await
        }
        Commands::Extract { file } => cmd_extract(config, &file).await,
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 명령어 (serve)
async fn cmd_serve(config: AppConfig) -> Result<()> {
    let addr = config.addr.clone();
    tracing::info!(
        "Starting medreport server (policy: {:?}, columns: {:?})",
        config.merge_policy,
        config.column_strategy
    );

    let pipeline = ReportPipeline::new(config).context("파이프라인 초기화 실패")?;
    start_server(&addr, AppState::new(pipeline)).await
}

/// 구조화 명령어 (process)
///
/// 단일 파일은 응답 JSON을, 폴더는 `{경로: 응답}` JSON을 출력합니다.
async fn cmd_process(
    config: AppConfig,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let pipeline = Arc::new(ReportPipeline::new(config).context("파이프라인 초기화 실패")?);

    let output = if let Some(ref file_path) = file {
        let response = process_file(&pipeline, file_path).await?;
        serde_json::to_value(response)?
    } else if let Some(ref dir_path) = dir {
        let files = collect_pdfs(dir_path);
        if files.is_empty() {
            eprintln!("[!] 처리할 PDF 파일이 없습니다.");
            return Ok(());
        }

        serde_json::Value::Object(process_batch(&pipeline, &files).await?)
    } else {
        bail!("파일 경로 또는 --dir 중 하나를 지정해야 합니다");
    };

    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);

    Ok(())
}

/// 여러 파일 처리 (`{경로: 응답}`)
///
/// 읽을 수 없는 파일은 실패 항목으로 남기고 다음 파일로 진행합니다.
async fn process_batch(
    pipeline: &Arc<ReportPipeline>,
    files: &[PathBuf],
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut results = serde_json::Map::new();
    for (i, path) in files.iter().enumerate() {
        eprintln!("[{}/{}] {}", i + 1, files.len(), path.display());
        let response = match process_file(pipeline, path).await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("[!] {:#}", e);
                UploadResponse::failure(format!("Failed to read file: {}", path.display()))
            }
        };
        results.insert(path.display().to_string(), serde_json::to_value(response)?);
    }
    Ok(results)
}

/// 파일 하나 처리 (확장자로 선언 타입 판별)
async fn process_file(
    pipeline: &Arc<ReportPipeline>,
    path: &Path,
) -> Result<UploadResponse> {
    if let Err(e) = validate_content_type(declared_type(path)) {
        return Ok(failure_response(&e).1);
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let (status, response) = pipeline.clone().respond_async(bytes).await;
    if !status.is_success() {
        eprintln!("[!] {} 처리 실패 ({})", path.display(), status);
    }
    Ok(response)
}

/// 원본 텍스트 명령어 (extract)
async fn cmd_extract(config: AppConfig, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read PDF: {:?}", file))?;

    let extractor = PdfTextExtractor::from_limits(&config.limits);
    let pages = extractor.extract_async(bytes).await?;

    println!("[OK] {} 페이지\n", pages.len());
    for (i, text) in pages.iter().enumerate() {
        println!("=== Page {} ===", i + 1);
        if text.is_empty() {
            println!("(텍스트 없음)");
        } else {
            println!("{}", text);
        }
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("medreport v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());
    println!("[*] 서버 주소: {}", config.addr);
    println!(
        "[*] 한도: {} 페이지, 페이지당 {} 자, 업로드 {}",
        config.limits.max_pages,
        config.limits.max_page_chars,
        format_bytes(config.limits.max_upload_bytes)
    );
    println!("[*] 병합 정책: {:?}", config.merge_policy);
    println!("[*] 컬럼 전략: {:?}", config.column_strategy);
    if config.debug_dump {
        println!("[OK] 디버그 덤프: {}", config.dump_dir.display());
    } else {
        println!("[!] 디버그 덤프: 비활성");
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 확장자로 선언 콘텐츠 타입 추정
fn declared_type(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.eq_ignore_ascii_case("pdf"))
        .map(|_| PDF_CONTENT_TYPE)
}

/// 폴더에서 PDF 파일 수집 (경로 순 정렬)
fn collect_pdfs(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::debug!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && declared_type(e.path()).is_some())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
