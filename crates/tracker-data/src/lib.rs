//! 공매도 지표 수집 파이프라인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 외부 호출 복원력 정책 (timeout → circuit breaker → retry)
//! - 공급자별 클라이언트와 원본 응답 형태
//! - 원본 응답 정규화
//! - 저장 스냅샷과 신규 포인트 비교 (reconcile)
//! - PostgreSQL / 메모리 저장소

pub mod error;
pub mod normalize;
pub mod provider;
pub mod reconcile;
pub mod resilience;
pub mod storage;

pub use error::{DataError, Result};
pub use normalize::normalize;
pub use reconcile::reconcile;

// 공급자 재내보내기
pub use provider::{
    BorrowDeskClient, HttpFetcher, PayloadBody, ProviderClient, ProviderConfig, ProviderPayload,
    ProviderRegistry, ResponseShape, SecFtdClient, ShortDataClient, YahooChartClient,
};

// 복원력 정책 재내보내기
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilienceConfig, ResiliencePolicy,
};

// 저장소 재내보내기
pub use storage::{InMemoryStore, MetricStore, PgStore, SymbolStore};
