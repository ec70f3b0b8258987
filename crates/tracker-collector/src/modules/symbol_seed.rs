//! 추적 심볼 시드 모듈.

use tracker_core::{default_seed_symbols, TrackedSymbol};
use tracker_data::SymbolStore;

use crate::Result;

/// 기본 시드 목록 등록. 새로 등록된 심볼 수를 반환합니다.
pub async fn seed_default_symbols(store: &dyn SymbolStore) -> Result<u64> {
    let seeds = default_seed_symbols();
    let inserted = store.seed_symbols(&seeds).await?;

    tracing::info!(
        seeds = seeds.len(),
        inserted = inserted,
        "기본 심볼 등록 완료"
    );
    Ok(inserted)
}

/// 추적 심볼 목록 조회. 비어 있으면 기본 목록을 등록한 뒤 다시 조회합니다.
pub async fn ensure_symbols(store: &dyn SymbolStore) -> Result<Vec<TrackedSymbol>> {
    let symbols = store.tracked_symbols().await?;
    if !symbols.is_empty() {
        return Ok(symbols);
    }

    tracing::info!("추적 심볼 없음, 기본 목록 등록");
    seed_default_symbols(store).await?;
    Ok(store.tracked_symbols().await?)
}
