//! 처리 컨텍스트 및 모델 수명 관리
//!
//! 요청 단위로 생성되는 `ProcessingContext`가 모델을 소유합니다.
//! 요청 간에 공유되는 모델 상태는 없습니다.
//!
//! 현재 제공되는 모델은 `InertModel` 하나이며 추론을 수행하지 않습니다.
//! 구조화 결과에 영향을 주지 않고, init/cleanup 계약의 형태만 유지합니다.

use std::fmt;

use crate::structurer::PageBuckets;

// ============================================================================
// StructuringModel Trait
// ============================================================================

/// 모델 기능 플래그
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// 라인 분류 추론 지원 여부
    pub classify_lines: bool,
}

/// 구조화 보조 모델 트레이트
pub trait StructuringModel: Send {
    /// 모델 이름
    fn name(&self) -> &'static str;

    /// 지원 기능
    fn capabilities(&self) -> ModelCapabilities;

    /// 분류된 페이지 버킷 보정
    ///
    /// `capabilities().classify_lines`가 true일 때만 호출됩니다.
    fn refine_page(&mut self, _buckets: &mut PageBuckets) {}

    /// 보유 리소스 해제 (한 번만 호출됨)
    fn release(&mut self);
}

/// 추론하지 않는 자리표시자 모델
///
/// 어떤 기능도 보고하지 않으므로 `refine_page`가 호출되지 않습니다.
#[derive(Debug, Default)]
pub struct InertModel;

impl InertModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructuringModel for InertModel {
    fn name(&self) -> &'static str {
        "inert"
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::default()
    }

    fn release(&mut self) {}
}

// ============================================================================
// ProcessingContext
// ============================================================================

type ModelFactory = Box<dyn Fn() -> Box<dyn StructuringModel> + Send>;

/// 요청 단위 처리 컨텍스트
///
/// 모델은 `model()` 첫 호출 시 생성되고, `release()` 또는 drop 시 해제됩니다.
/// `release()`는 여러 번 호출해도 안전합니다.
pub struct ProcessingContext {
    factory: ModelFactory,
    model: Option<Box<dyn StructuringModel>>,
}

impl ProcessingContext {
    /// `InertModel`을 사용하는 컨텍스트 생성
    pub fn new() -> Self {
        Self::with_factory(|| Box::new(InertModel::new()))
    }

    /// 모델 생성 함수를 지정하여 생성
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn StructuringModel> + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            model: None,
        }
    }

    /// 모델 반환 (없으면 생성)
    pub fn model(&mut self) -> &mut dyn StructuringModel {
        let factory = &self.factory;
        let model = self.model.get_or_insert_with(|| {
            let model = factory();
            tracing::debug!("Constructed structuring model: {}", model.name());
            model
        });
        model.as_mut()
    }

    /// 모델이 생성되어 있는지 여부
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// 모델 해제
    pub fn release(&mut self) {
        if let Some(mut model) = self.model.take() {
            tracing::debug!("Releasing structuring model: {}", model.name());
            model.release();
        }
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("model", &self.model.as_ref().map(|m| m.name()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// 생성/해제 횟수를 기록하는 테스트 모델
    pub(crate) struct CountingModel {
        pub released: Arc<AtomicUsize>,
    }

    impl StructuringModel for CountingModel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn capabilities(&self) -> ModelCapabilities {
            ModelCapabilities::default()
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// (컨텍스트, 생성 횟수, 해제 횟수)
    pub(crate) fn counting_context() -> (ProcessingContext, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let (c, r) = (created.clone(), released.clone());
        let ctx = ProcessingContext::with_factory(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingModel {
                released: r.clone(),
            })
        });
        (ctx, created, released)
    }

    #[test]
    fn test_model_constructed_lazily_once() {
        let (mut ctx, created, _) = counting_context();
        assert!(!ctx.has_model());
        assert_eq!(created.load(Ordering::SeqCst), 0);

        ctx.model();
        ctx.model();
        assert!(ctx.has_model());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut ctx, _, released) = counting_context();
        ctx.model();
        ctx.release();
        ctx.release();
        drop(ctx);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_without_model() {
        let (mut ctx, created, released) = counting_context();
        ctx.release();
        drop(ctx);
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inert_model_has_no_capabilities() {
        let mut ctx = ProcessingContext::new();
        let model = ctx.model();
        assert_eq!(model.name(), "inert");
        assert!(!model.capabilities().classify_lines);
    }
}
