//! 저장소 모듈.
//!
//! 수집 파이프라인은 두 가지 저장소 역할에만 의존합니다.
//!
//! - [`MetricStore`]: 심볼/지표별 스냅샷 조회와 변경 집합 적용
//! - [`SymbolStore`]: 추적 심볼 목록 관리
//!
//! 구현체:
//! - [`PgStore`]: PostgreSQL (sqlx)
//! - [`InMemoryStore`]: 프로세스 메모리 (dry-run, 테스트)

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracker_core::{DateRange, MetricKind, MutationSet, StoredSnapshot, TrackedSymbol};

use crate::error::Result;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// 시계열 포인트 저장소.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// 날짜 범위 내 저장 포인트 조회.
    async fn load_snapshot(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<StoredSnapshot>;

    /// 변경 집합을 원자적으로 적용하고 영향받은 행 수를 반환합니다.
    ///
    /// 실패 시 재시도하지 않으며, 호출자는 다음 패스에서 스냅샷을 다시 읽습니다.
    async fn apply_mutations(&self, mutations: &MutationSet) -> Result<u64>;
}

/// 추적 심볼 저장소.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// 추적 심볼 목록 (심볼 순).
    async fn tracked_symbols(&self) -> Result<Vec<TrackedSymbol>>;

    /// 심볼 등록. 이미 있는 심볼은 건너뛰고 새로 등록된 수를 반환합니다.
    async fn seed_symbols(&self, symbols: &[TrackedSymbol]) -> Result<u64>;

    /// 마지막 성공 갱신 시각 기록.
    async fn mark_refreshed(&self, symbol: &str, at: DateTime<Utc>) -> Result<()>;
}
