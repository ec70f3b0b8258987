//! 메모리 저장소.
//!
//! `--dry-run` 실행과 테스트에서 사용합니다. 프로세스 종료 시 내용이 사라집니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracker_core::{
    DateRange, MetricKind, MutationSet, StoredPoint, StoredSnapshot, TrackedSymbol,
};

use super::{MetricStore, SymbolStore};
use crate::error::{DataError, Result};

type SeriesKey = (String, MetricKind);

/// 메모리 기반 저장소.
#[derive(Default)]
pub struct InMemoryStore {
    series: RwLock<HashMap<SeriesKey, Vec<StoredPoint>>>,
    symbols: RwLock<BTreeMap<String, TrackedSymbol>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 포인트 수.
    pub async fn point_count(&self, symbol: &str, kind: MetricKind) -> usize {
        self.series
            .read()
            .await
            .get(&(symbol.to_string(), kind))
            .map_or(0, Vec::len)
    }

    /// 심볼 조회.
    pub async fn symbol(&self, symbol: &str) -> Option<TrackedSymbol> {
        self.symbols.read().await.get(symbol).cloned()
    }
}

#[async_trait]
impl MetricStore for InMemoryStore {
    async fn load_snapshot(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<StoredSnapshot> {
        let series = self.series.read().await;
        let points = series
            .get(&(symbol.to_string(), kind))
            .into_iter()
            .flatten()
            .filter(|p| range.contains(p.point.date))
            .cloned();

        Ok(StoredSnapshot::from_points(symbol, kind, points))
    }

    async fn apply_mutations(&self, mutations: &MutationSet) -> Result<u64> {
        let mut series = self.series.write().await;
        let rows = series
            .entry((mutations.symbol.clone(), mutations.kind))
            .or_default();

        // 갱신 대상이 모두 존재하는지 먼저 확인하여 부분 적용을 막음
        for update in &mutations.updates {
            if !rows.iter().any(|p| p.id == update.id) {
                return Err(DataError::Persistence(format!(
                    "갱신 대상 행 없음: id={}",
                    update.id
                )));
            }
        }

        for update in &mutations.updates {
            if let Some(row) = rows.iter_mut().find(|p| p.id == update.id) {
                row.point = update.point.clone();
            }
        }

        for point in &mutations.inserts {
            match rows.iter_mut().find(|p| p.point.date == point.date) {
                Some(row) => row.point = point.clone(),
                None => rows.push(StoredPoint {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    point: point.clone(),
                }),
            }
        }

        Ok(mutations.write_count() as u64)
    }
}

#[async_trait]
impl SymbolStore for InMemoryStore {
    async fn tracked_symbols(&self) -> Result<Vec<TrackedSymbol>> {
        Ok(self.symbols.read().await.values().cloned().collect())
    }

    async fn seed_symbols(&self, symbols: &[TrackedSymbol]) -> Result<u64> {
        let mut stored = self.symbols.write().await;
        let mut inserted = 0;
        for s in symbols {
            if !stored.contains_key(&s.symbol) {
                stored.insert(s.symbol.clone(), s.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn mark_refreshed(&self, symbol: &str, at: DateTime<Utc>) -> Result<()> {
        if let Some(s) = self.symbols.write().await.get_mut(symbol) {
            s.last_refreshed_at = Some(at);
        }
        Ok(())
    }
}
