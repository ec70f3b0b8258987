//! 조회 날짜 범위.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metric::TimeSeriesPoint;
use crate::error::{CoreError, CoreResult};

/// 양 끝을 포함하는 날짜 범위. 한쪽 또는 양쪽이 열려 있을 수 있습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// 범위 생성 (start > end이면 에러).
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> CoreResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(CoreError::InvalidDateRange { start: s, end: e });
            }
        }
        Ok(Self { start, end })
    }

    /// 전체 이력 (양쪽 모두 열림).
    pub fn full() -> Self {
        Self::default()
    }

    /// 특정일 이후 전체.
    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// 양쪽이 모두 열려 있는지 여부.
    pub fn is_open_ended(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// 포인트들의 최소~최대 날짜 범위 (비어 있으면 None).
    pub fn span_of<'a>(points: impl IntoIterator<Item = &'a TimeSeriesPoint>) -> Option<Self> {
        let mut iter = points.into_iter().map(|p| p.date);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self {
            start: Some(min),
            end: Some(max),
        })
    }
}
