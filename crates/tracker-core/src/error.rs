//! 도메인 모델 에러 타입.

use thiserror::Error;

/// 도메인 모델 생성/파싱 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 빈 문자열이거나 허용되지 않는 심볼
    #[error("잘못된 심볼: {0:?}")]
    InvalidSymbol(String),

    /// 알 수 없는 지표 종류
    #[error("알 수 없는 지표 종류: {0}")]
    UnknownMetricKind(String),

    /// 시작일이 종료일보다 늦은 날짜 범위
    #[error("잘못된 날짜 범위: {start} > {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
