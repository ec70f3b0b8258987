//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 심볼/지표 하나의 동기화 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// 정규화된 포인트 수
    pub fetched: usize,
    /// 삽입 수
    pub inserted: usize,
    /// 갱신 수
    pub updated: usize,
    /// 변경 없음 (no-op)
    pub unchanged: usize,
}

/// 수집 패스 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리 대상 심볼 수
    pub total: usize,
    /// 모든 지표 성공
    pub success: usize,
    /// 하나 이상의 지표 실패
    pub errors: usize,
    /// 종료 신호로 처리하지 못한 심볼 수
    pub cancelled: usize,
    /// 삽입된 포인트 수
    pub inserted: usize,
    /// 갱신된 포인트 수
    pub updated: usize,
    /// 변경 없는 포인트 수
    pub unchanged: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 지표 동기화 결과 누적
    pub fn record(&mut self, outcome: &SyncOutcome) {
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.unchanged += outcome.unchanged;
    }

    /// 쓰기 건수 (삽입 + 갱신)
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            cancelled = self.cancelled,
            inserted = self.inserted,
            updated = self.updated,
            unchanged = self.unchanged,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_counts() {
        let mut stats = CollectionStats::new();
        stats.record(&SyncOutcome {
            fetched: 3,
            inserted: 1,
            updated: 1,
            unchanged: 1,
        });
        stats.record(&SyncOutcome {
            fetched: 2,
            inserted: 2,
            updated: 0,
            unchanged: 0,
        });

        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.writes(), 4);
    }

    #[test]
    fn test_success_rate() {
        let mut stats = CollectionStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.total = 4;
        stats.success = 3;
        assert_eq!(stats.success_rate(), 75.0);
    }
}
