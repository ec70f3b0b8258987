//! 심볼/지표 단위 동기화 모듈.
//!
//! fetch → normalize → 스냅샷 로드 → reconcile → 적용 순서로 실행합니다.
//! 한 심볼의 한 지표에 대해 이 순서는 항상 보장됩니다.

use tracker_core::{DateRange, MetricKind};
use tracker_data::{normalize, reconcile, MetricStore, ProviderClient};

use crate::scheduler::PassState;
use crate::stats::SyncOutcome;
use crate::Result;

/// 심볼 하나의 지표 하나를 동기화합니다.
///
/// `on_state`는 단계가 바뀔 때마다 호출됩니다. 스냅샷은 정규화된 포인트의 날짜
/// 구간만 읽으며, 변경이 없으면 저장소에 쓰지 않습니다.
pub async fn sync_metric(
    client: &dyn ProviderClient,
    store: &dyn MetricStore,
    symbol: &str,
    kind: MetricKind,
    range: &DateRange,
    on_state: &(dyn Fn(PassState) + Send + Sync),
) -> Result<SyncOutcome> {
    on_state(PassState::Fetching(symbol.to_string()));
    let payload = client.fetch(symbol, kind, range).await?;
    let points = normalize(&payload)?;

    let mut outcome = SyncOutcome {
        fetched: points.len(),
        ..Default::default()
    };

    let Some(span) = DateRange::span_of(&points) else {
        tracing::debug!(provider = client.name(), "수집된 포인트 없음");
        return Ok(outcome);
    };

    on_state(PassState::Reconciling(symbol.to_string()));
    let snapshot = store.load_snapshot(&payload.symbol, kind, &span).await?;
    let mutations = reconcile(&snapshot, &points);

    outcome.inserted = mutations.inserts.len();
    outcome.updated = mutations.updates.len();
    outcome.unchanged = mutations.unchanged;

    if !mutations.is_empty() {
        on_state(PassState::Persisting(symbol.to_string()));
        store.apply_mutations(&mutations).await?;
    }

    tracing::info!(
        provider = client.name(),
        fetched = outcome.fetched,
        inserted = outcome.inserted,
        updated = outcome.updated,
        unchanged = outcome.unchanged,
        "지표 동기화 완료"
    );

    Ok(outcome)
}
