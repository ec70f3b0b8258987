//! 저장 스냅샷과 변경 집합.
//!
//! reconcile은 `(StoredSnapshot, 신규 포인트) -> MutationSet`의 순수 함수이며,
//! 스냅샷은 읽기 전용 입력으로만 사용됩니다.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metric::{MetricKind, TimeSeriesPoint};

/// 저장소 행 식별자가 붙은 포인트.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPoint {
    /// 저장소 행 ID
    pub id: i64,
    pub point: TimeSeriesPoint,
}

/// 한 심볼/지표의 저장 포인트 (날짜 → 포인트).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub symbol: String,
    pub kind: MetricKind,
    points: BTreeMap<NaiveDate, StoredPoint>,
}

impl StoredSnapshot {
    /// 빈 스냅샷 생성.
    pub fn empty(symbol: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            points: BTreeMap::new(),
        }
    }

    /// 저장 포인트 목록으로 스냅샷 생성.
    ///
    /// 같은 날짜가 여러 번 나오면 뒤의 것이 남습니다.
    pub fn from_points(
        symbol: impl Into<String>,
        kind: MetricKind,
        points: impl IntoIterator<Item = StoredPoint>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            points: points.into_iter().map(|p| (p.point.date, p)).collect(),
        }
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&StoredPoint> {
        self.points.get(date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 날짜순 포인트 순회.
    pub fn iter(&self) -> impl Iterator<Item = &StoredPoint> {
        self.points.values()
    }

    /// 가장 최근 저장일.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.keys().next_back().copied()
    }

    /// 변경 집합을 적용한 새 스냅샷을 반환합니다 (`snapshot + mutations`).
    ///
    /// 삽입 행에는 기존 최대 ID 다음 번호가 순서대로 부여됩니다.
    pub fn with_mutations(&self, mutations: &MutationSet) -> StoredSnapshot {
        let mut next = self.points.values().map(|p| p.id).max().unwrap_or(0);
        let mut points = self.points.clone();

        for update in &mutations.updates {
            points.insert(
                update.point.date,
                StoredPoint {
                    id: update.id,
                    point: update.point.clone(),
                },
            );
        }
        for insert in &mutations.inserts {
            next += 1;
            points.insert(
                insert.date,
                StoredPoint {
                    id: next,
                    point: insert.clone(),
                },
            );
        }

        StoredSnapshot {
            symbol: self.symbol.clone(),
            kind: self.kind,
            points,
        }
    }
}

/// 기존 행을 교체하는 갱신.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointUpdate {
    /// 교체 대상 행 ID
    pub id: i64,
    /// 새 값
    pub point: TimeSeriesPoint,
}

/// reconcile 결과 (삽입/갱신 목록). 삭제는 생성하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSet {
    pub symbol: String,
    pub kind: MetricKind,
    pub inserts: Vec<TimeSeriesPoint>,
    pub updates: Vec<PointUpdate>,
    /// 변경 없음(no-op)으로 판정된 포인트 수
    pub unchanged: usize,
}

impl MutationSet {
    pub fn new(symbol: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            inserts: Vec::new(),
            updates: Vec::new(),
            unchanged: 0,
        }
    }

    /// 쓰기가 필요 없는지 여부.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    /// 저장소에 발생할 쓰기 건수.
    pub fn write_count(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }
}
