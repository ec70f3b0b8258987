//! 저장 스냅샷과 신규 포인트 비교 (reconcile).
//!
//! `(StoredSnapshot, 신규 포인트) -> MutationSet`의 순수 함수입니다.
//!
//! - 스냅샷에 없는 날짜 → 삽입
//! - 저장 자릿수 기준으로 값이 같음 → no-op (쓰기 없음)
//! - 값이 다름 → 기존 행 ID를 가진 갱신
//!
//! 같은 배치 안에서 날짜가 중복되면 입력 순서상 마지막 포인트가 결과를 결정합니다.
//! 변경 집합의 순서는 각 날짜의 마지막 등장 위치 순서를 따릅니다.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracker_core::{MutationSet, PointUpdate, StoredSnapshot, TimeSeriesPoint};

/// 신규 포인트를 스냅샷과 비교하여 최소 변경 집합을 계산합니다.
///
/// 스냅샷과 심볼/지표가 다른 포인트는 경고 후 무시합니다.
pub fn reconcile(existing: &StoredSnapshot, incoming: &[TimeSeriesPoint]) -> MutationSet {
    let mut mutations = MutationSet::new(existing.symbol.clone(), existing.kind);

    let relevant: Vec<&TimeSeriesPoint> = incoming
        .iter()
        .filter(|point| {
            let matches = point.symbol == existing.symbol && point.kind() == existing.kind;
            if !matches {
                tracing::warn!(
                    expected_symbol = %existing.symbol,
                    expected_kind = %existing.kind,
                    symbol = %point.symbol,
                    kind = %point.kind(),
                    date = %point.date,
                    "스냅샷과 다른 심볼/지표의 포인트 무시"
                );
            }
            matches
        })
        .collect();

    // 날짜별 마지막 등장 위치
    let last_index: HashMap<NaiveDate, usize> = relevant
        .iter()
        .enumerate()
        .map(|(i, point)| (point.date, i))
        .collect();

    let duplicates = relevant.len() - last_index.len();
    if duplicates > 0 {
        tracing::debug!(
            symbol = %existing.symbol,
            kind = %existing.kind,
            duplicates,
            "배치 내 중복 날짜, 마지막 값 사용"
        );
    }

    for (i, point) in relevant.iter().enumerate() {
        if last_index.get(&point.date) != Some(&i) {
            continue;
        }

        match existing.get(&point.date) {
            None => mutations.inserts.push((*point).clone()),
            Some(stored) if stored.point.same_values(point) => mutations.unchanged += 1,
            Some(stored) => mutations.updates.push(PointUpdate {
                id: stored.id,
                point: (*point).clone(),
            }),
        }
    }

    mutations
}
