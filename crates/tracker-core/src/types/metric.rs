//! 지표 종류와 정규화된 시계열 포인트.
//!
//! # 비교 스케일
//!
//! 모든 Decimal 필드는 포인트 생성 시 필드별 고정 소수 자릿수로 반올림되며,
//! 동등성 비교도 같은 자릿수에서 수행합니다. 같은 공급자 값을 다시 파싱하면
//! 항상 같은 값으로 비교됩니다.
//!
//! | 지표 | 필드 | 자릿수 |
//! |------|------|--------|
//! | BorrowFee | fee_rate, rebate_rate | 4 |
//! | ShortInterest | days_to_cover | 2 |
//! | ShortInterest | percent_of_float | 4 |
//! | ShortVolume | short_volume_percent | 6 |
//! | FailsToDeliver | price | 4 |
//! | FailsToDeliver | value | 2 |
//! | PriceBar | open, high, low, close | 4 |

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::symbol::normalize_symbol;
use crate::error::{CoreError, CoreResult};

/// 대차 수수료율 자릿수
pub const RATE_SCALE: u32 = 4;
/// Days-to-cover 자릿수
pub const DAYS_TO_COVER_SCALE: u32 = 2;
/// 공매도 거래량 비율 자릿수
pub const RATIO_SCALE: u32 = 6;
/// 가격 자릿수
pub const PRICE_SCALE: u32 = 4;
/// 금액 자릿수
pub const AMOUNT_SCALE: u32 = 2;

/// 시계열 지표 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// 대차 수수료 (borrow fee)
    BorrowFee,
    /// 공매도 잔고 (short interest)
    ShortInterest,
    /// 일별 공매도 거래량
    ShortVolume,
    /// 결제 불이행 (failures-to-deliver)
    FailsToDeliver,
    /// 일봉 가격/거래량
    PriceBar,
}

impl MetricKind {
    /// 모든 지표 종류 반환.
    pub fn all() -> [MetricKind; 5] {
        [
            MetricKind::BorrowFee,
            MetricKind::ShortInterest,
            MetricKind::ShortVolume,
            MetricKind::FailsToDeliver,
            MetricKind::PriceBar,
        ]
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::BorrowFee => "borrow_fee",
            MetricKind::ShortInterest => "short_interest",
            MetricKind::ShortVolume => "short_volume",
            MetricKind::FailsToDeliver => "fails_to_deliver",
            MetricKind::PriceBar => "price_bar",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        MetricKind::all()
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownMetricKind(s.to_string()))
    }
}

/// 지표 종류별 수치 필드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricValues {
    BorrowFee {
        /// 연 환산 대차 수수료율 (%)
        fee_rate: Decimal,
        /// 리베이트율 (%)
        rebate_rate: Option<Decimal>,
        /// 대차 가능 주식 수
        available_shares: Option<i64>,
    },
    ShortInterest {
        /// 공매도 잔고 주식 수
        short_interest: i64,
        /// 평균 일 거래량
        average_daily_volume: Option<i64>,
        /// 상환 소요 일수 (short_interest / average_daily_volume)
        days_to_cover: Option<Decimal>,
        /// 유통주식 대비 비율 (%)
        percent_of_float: Option<Decimal>,
    },
    ShortVolume {
        /// 공매도 거래량
        short_volume: i64,
        /// 공매도 면제 거래량
        short_exempt_volume: Option<i64>,
        /// 총 거래량
        total_volume: i64,
        /// short_volume / total_volume (0~1 비율)
        short_volume_percent: Decimal,
    },
    FailsToDeliver {
        /// 결제 불이행 수량
        quantity: i64,
        /// 기준 가격
        price: Option<Decimal>,
        /// quantity × price
        value: Option<Decimal>,
    },
    PriceBar {
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    },
}

fn round(value: Decimal, scale: u32) -> Decimal {
    value
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn round_opt(value: Option<Decimal>, scale: u32) -> Option<Decimal> {
    value.map(|v| round(v, scale))
}

impl MetricValues {
    /// 필드 조합에 해당하는 지표 종류.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValues::BorrowFee { .. } => MetricKind::BorrowFee,
            MetricValues::ShortInterest { .. } => MetricKind::ShortInterest,
            MetricValues::ShortVolume { .. } => MetricKind::ShortVolume,
            MetricValues::FailsToDeliver { .. } => MetricKind::FailsToDeliver,
            MetricValues::PriceBar { .. } => MetricKind::PriceBar,
        }
    }

    /// 모든 Decimal 필드를 저장 자릿수로 반올림합니다.
    pub fn rounded(self) -> Self {
        match self {
            MetricValues::BorrowFee {
                fee_rate,
                rebate_rate,
                available_shares,
            } => MetricValues::BorrowFee {
                fee_rate: round(fee_rate, RATE_SCALE),
                rebate_rate: round_opt(rebate_rate, RATE_SCALE),
                available_shares,
            },
            MetricValues::ShortInterest {
                short_interest,
                average_daily_volume,
                days_to_cover,
                percent_of_float,
            } => MetricValues::ShortInterest {
                short_interest,
                average_daily_volume,
                days_to_cover: round_opt(days_to_cover, DAYS_TO_COVER_SCALE),
                percent_of_float: round_opt(percent_of_float, RATE_SCALE),
            },
            MetricValues::ShortVolume {
                short_volume,
                short_exempt_volume,
                total_volume,
                short_volume_percent,
            } => MetricValues::ShortVolume {
                short_volume,
                short_exempt_volume,
                total_volume,
                short_volume_percent: round(short_volume_percent, RATIO_SCALE),
            },
            MetricValues::FailsToDeliver {
                quantity,
                price,
                value,
            } => MetricValues::FailsToDeliver {
                quantity,
                price: round_opt(price, PRICE_SCALE),
                value: round_opt(value, AMOUNT_SCALE),
            },
            MetricValues::PriceBar {
                open,
                high,
                low,
                close,
                volume,
            } => MetricValues::PriceBar {
                open: round(open, PRICE_SCALE),
                high: round(high, PRICE_SCALE),
                low: round(low, PRICE_SCALE),
                close: round(close, PRICE_SCALE),
                volume,
            },
        }
    }

    /// 저장 자릿수 기준 필드 단위 비교.
    pub fn same_as(&self, other: &MetricValues) -> bool {
        self.clone().rounded() == other.clone().rounded()
    }
}

/// 공급자와 무관한 정규화된 시계열 포인트.
///
/// `(symbol, date, kind)`가 저장소의 고유 키이며, kind는 `values`에서 파생됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// 정규화된 심볼
    pub symbol: String,
    /// 기준일 (시각 정보 없음)
    pub date: NaiveDate,
    /// 지표 값
    pub values: MetricValues,
}

impl TimeSeriesPoint {
    /// 심볼을 정규화하고 값을 저장 자릿수로 반올림하여 포인트를 생성합니다.
    pub fn new(symbol: &str, date: NaiveDate, values: MetricValues) -> CoreResult<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            date,
            values: values.rounded(),
        })
    }

    /// 지표 종류.
    pub fn kind(&self) -> MetricKind {
        self.values.kind()
    }

    /// 같은 날짜의 저장 포인트와 값이 같은지 확인.
    pub fn same_values(&self, other: &TimeSeriesPoint) -> bool {
        self.values.same_as(&other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_metric_kind_round_trip() {
        for kind in MetricKind::all() {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
        }
        assert_eq!(
            "Borrow-Fee".parse::<MetricKind>().unwrap(),
            MetricKind::BorrowFee
        );
        assert!("dividends".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_point_rounds_to_storage_scale() {
        let point = TimeSeriesPoint::new(
            "gme",
            date("2024-01-02"),
            MetricValues::BorrowFee {
                fee_rate: dec!(1.234567),
                rebate_rate: None,
                available_shares: Some(100),
            },
        )
        .unwrap();

        assert_eq!(point.symbol, "GME");
        assert_eq!(point.kind(), MetricKind::BorrowFee);
        match point.values {
            MetricValues::BorrowFee { fee_rate, .. } => assert_eq!(fee_rate, dec!(1.2346)),
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn test_same_as_ignores_sub_scale_noise() {
        let a = MetricValues::ShortVolume {
            short_volume: 1,
            short_exempt_volume: None,
            total_volume: 3,
            short_volume_percent: dec!(0.33333333),
        };
        let b = MetricValues::ShortVolume {
            short_volume: 1,
            short_exempt_volume: None,
            total_volume: 3,
            short_volume_percent: dec!(0.3333330),
        };
        assert!(a.same_as(&b));

        let c = MetricValues::ShortVolume {
            short_volume: 1,
            short_exempt_volume: Some(0),
            total_volume: 3,
            short_volume_percent: dec!(0.333333),
        };
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_trailing_zeros_compare_equal() {
        let a = MetricValues::PriceBar {
            open: dec!(10.50),
            high: dec!(11),
            low: dec!(10),
            close: dec!(10.5),
            volume: 10,
        };
        let b = MetricValues::PriceBar {
            open: dec!(10.5),
            high: dec!(11.0000),
            low: dec!(10.00),
            close: dec!(10.50),
            volume: 10,
        };
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_values_json_is_tagged_by_kind() {
        let values = MetricValues::FailsToDeliver {
            quantity: 10,
            price: Some(dec!(2.5)),
            value: Some(dec!(25)),
        };
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json["kind"], "fails_to_deliver");

        let back: MetricValues = serde_json::from_value(json).unwrap();
        assert_eq!(back, values);
    }
}
