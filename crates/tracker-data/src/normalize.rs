//! 공급자 원본 응답 → 정규화된 시계열 포인트 변환.
//!
//! 순수 함수이며 네트워크/저장소와 무관합니다.
//!
//! # 파싱 규칙
//! - 숫자: 공백, 천 단위 구분자(`,`), `%`, `$` 제거. `""`, `N/A`, `NA`, `-`, `null`은 값 없음.
//!   지수 표기(`1.5E6`)도 허용. 개수 필드는 정수여야 합니다.
//! - 날짜: `YYYY-MM-DD`, `YYYYMMDD`, `YYYY/MM/DD`, `MM/DD/YYYY`, RFC 3339,
//!   `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, unix 초/밀리초. 시각은 버립니다.
//! - 필드 파싱 실패는 해당 포인트만 버리고 (경고 로그) 나머지는 계속 처리합니다.
//!
//! # 파생 필드
//! | 지표 | 필드 | 계산 |
//! |------|------|------|
//! | ShortVolume | short_volume_percent | short_volume / total_volume (total 0이면 포인트 제외) |
//! | ShortInterest | days_to_cover | short_interest / average_daily_volume (미제공 시, ADV 0이면 None) |
//! | FailsToDeliver | value | quantity × price (price 없으면 None) |

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use tracker_core::{normalize_symbol, DateRange, MetricKind, MetricValues, TimeSeriesPoint};

use crate::error::{DataError, Result};
use crate::provider::{
    PayloadBody, ProviderPayload, RawBorrowFee, RawDate, RawFailToDeliver, RawNumber,
    RawPriceBar, RawShortInterest, RawShortVolume, ResponseShape,
};

/// 값 없음으로 취급하는 토큰
const NULL_TOKENS: &[&str] = &["", "N/A", "NA", "-", "NULL", "NONE", "NAN"];

/// 이 값보다 큰 timestamp는 밀리초로 간주
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// 공급자 응답을 정규화합니다.
///
/// 심볼이 비어 있으면 응답 전체가 검증 실패입니다. 개별 포인트의 파싱 실패는
/// 해당 포인트만 제외됩니다.
pub fn normalize(payload: &ProviderPayload) -> Result<Vec<TimeSeriesPoint>> {
    let symbol = normalize_symbol(&payload.symbol).map_err(|e| {
        DataError::Validation(format!("{} 응답의 심볼이 잘못됨: {}", payload.provider, e))
    })?;

    let mut batch = Batch::new(payload, symbol);

    match &payload.body {
        PayloadBody::BorrowFee(pages) => batch.extend(pages, borrow_fee),
        PayloadBody::ShortInterest(pages) => batch.extend(pages, short_interest),
        PayloadBody::ShortVolume(pages) => batch.extend(pages, short_volume),
        PayloadBody::FailsToDeliver(pages) => batch.extend(pages, fails_to_deliver),
        PayloadBody::PriceBar(pages) => batch.extend(pages, price_bar),
    }

    Ok(batch.finish())
}

/// 정규화 진행 상태.
struct Batch<'a> {
    payload: &'a ProviderPayload,
    symbol: String,
    points: Vec<TimeSeriesPoint>,
    invalid: usize,
    out_of_range: usize,
}

impl<'a> Batch<'a> {
    fn new(payload: &'a ProviderPayload, symbol: String) -> Self {
        Self {
            payload,
            symbol,
            points: Vec::new(),
            invalid: 0,
            out_of_range: 0,
        }
    }

    fn kind(&self) -> MetricKind {
        self.payload.kind()
    }

    fn range(&self) -> &DateRange {
        &self.payload.range
    }

    fn extend<T>(
        &mut self,
        pages: &[ResponseShape<T>],
        convert: fn(&T) -> Result<(NaiveDate, MetricValues)>,
    ) {
        self.check_page_count(pages);

        for item in pages.iter().flat_map(|page| page.items()) {
            let (date, values) = match convert(item) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.invalid += 1;
                    warn!(
                        provider = %self.payload.provider,
                        symbol = %self.symbol,
                        kind = %self.kind(),
                        error = %e,
                        "포인트 파싱 실패, 제외"
                    );
                    continue;
                }
            };

            if !self.range().contains(date) {
                self.out_of_range += 1;
                debug!(symbol = %self.symbol, date = %date, "요청 범위 밖 포인트 제외");
                continue;
            }

            match TimeSeriesPoint::new(&self.symbol, date, values) {
                Ok(point) => self.points.push(point),
                Err(e) => {
                    self.invalid += 1;
                    warn!(symbol = %self.symbol, error = %e, "포인트 생성 실패, 제외");
                }
            }
        }
    }

    /// 페이지 envelope의 전체 개수와 수집된 항목 수 비교.
    fn check_page_count<T>(&self, pages: &[ResponseShape<T>]) {
        let reported = pages
            .iter()
            .filter_map(|p| p.page_info().and_then(|info| info.count))
            .max();
        let gathered: usize = pages.iter().map(|p| p.items().len()).sum();

        if let Some(reported) = reported {
            if reported > gathered as u64 {
                warn!(
                    provider = %self.payload.provider,
                    symbol = %self.symbol,
                    kind = %self.kind(),
                    reported,
                    gathered,
                    "응답 항목 수가 보고된 전체 개수보다 적음"
                );
            }
        }
    }

    fn finish(self) -> Vec<TimeSeriesPoint> {
        debug!(
            provider = %self.payload.provider,
            symbol = %self.symbol,
            kind = %self.kind(),
            accepted = self.points.len(),
            invalid = self.invalid,
            out_of_range = self.out_of_range,
            "정규화 완료"
        );
        self.points
    }
}

// ==================== 지표별 변환 ====================

fn borrow_fee(raw: &RawBorrowFee) -> Result<(NaiveDate, MetricValues)> {
    Ok((
        required_date(raw.date.as_ref(), "date")?,
        MetricValues::BorrowFee {
            fee_rate: required_decimal(raw.fee.as_ref(), "fee")?,
            rebate_rate: optional_decimal(raw.rebate.as_ref(), "rebate")?,
            available_shares: optional_count(raw.available.as_ref(), "available")?,
        },
    ))
}

fn short_interest(raw: &RawShortInterest) -> Result<(NaiveDate, MetricValues)> {
    let short_interest = required_count(raw.short_interest.as_ref(), "short_interest")?;
    let average_daily_volume = optional_count(raw.avg_daily_volume.as_ref(), "avg_daily_volume")?;

    let days_to_cover = match optional_decimal(raw.days_to_cover.as_ref(), "days_to_cover")? {
        Some(days) => Some(days),
        None => average_daily_volume
            .filter(|adv| *adv > 0)
            .and_then(|adv| Decimal::from(short_interest).checked_div(Decimal::from(adv))),
    };

    Ok((
        required_date(raw.settlement_date.as_ref(), "settlement_date")?,
        MetricValues::ShortInterest {
            short_interest,
            average_daily_volume,
            days_to_cover,
            percent_of_float: optional_decimal(raw.percent_of_float.as_ref(), "percent_of_float")?,
        },
    ))
}

fn short_volume(raw: &RawShortVolume) -> Result<(NaiveDate, MetricValues)> {
    let date = required_date(raw.date.as_ref(), "date")?;
    let short_volume = required_count(raw.short_volume.as_ref(), "short_volume")?;
    let total_volume = required_count(raw.total_volume.as_ref(), "total_volume")?;

    if total_volume == 0 {
        return Err(DataError::Validation(format!(
            "{}: total_volume이 0이라 공매도 비율을 계산할 수 없음",
            date
        )));
    }

    let short_volume_percent = Decimal::from(short_volume)
        .checked_div(Decimal::from(total_volume))
        .ok_or_else(|| DataError::Validation("short_volume_percent 계산 실패".to_string()))?;

    Ok((
        date,
        MetricValues::ShortVolume {
            short_volume,
            short_exempt_volume: optional_count(
                raw.short_exempt_volume.as_ref(),
                "short_exempt_volume",
            )?,
            total_volume,
            short_volume_percent,
        },
    ))
}

fn fails_to_deliver(raw: &RawFailToDeliver) -> Result<(NaiveDate, MetricValues)> {
    let quantity = required_count(raw.quantity.as_ref(), "quantity")?;
    let price = optional_decimal(raw.price.as_ref(), "price")?;
    let value = price.and_then(|p| p.checked_mul(Decimal::from(quantity)));

    Ok((
        required_date(raw.settlement_date.as_ref(), "settlement_date")?,
        MetricValues::FailsToDeliver {
            quantity,
            price,
            value,
        },
    ))
}

fn price_bar(raw: &RawPriceBar) -> Result<(NaiveDate, MetricValues)> {
    Ok((
        required_date(raw.timestamp.as_ref(), "timestamp")?,
        MetricValues::PriceBar {
            open: required_decimal(raw.open.as_ref(), "open")?,
            high: required_decimal(raw.high.as_ref(), "high")?,
            low: required_decimal(raw.low.as_ref(), "low")?,
            close: required_decimal(raw.close.as_ref(), "close")?,
            volume: optional_count(raw.volume.as_ref(), "volume")?.unwrap_or(0),
        },
    ))
}

// ==================== 필드 파싱 ====================

/// 숫자 텍스트 파싱. 값 없음 토큰이면 `Ok(None)`, 숫자가 아니면 `Err(())`.
fn parse_decimal(raw: &RawNumber) -> std::result::Result<Option<Decimal>, ()> {
    let text = raw.as_text();
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '%' | '$'))
        .collect();

    if NULL_TOKENS.contains(&cleaned.to_uppercase().as_str()) {
        return Ok(None);
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map(Some)
        .map_err(|_| ())
}

fn optional_decimal(raw: Option<&RawNumber>, field: &str) -> Result<Option<Decimal>> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_decimal(raw).map_err(|_| {
            DataError::Validation(format!("{} 숫자 파싱 실패: {:?}", field, raw.as_text()))
        }),
    }
}

fn required_decimal(raw: Option<&RawNumber>, field: &str) -> Result<Decimal> {
    optional_decimal(raw, field)?
        .ok_or_else(|| DataError::Validation(format!("{} 값 없음", field)))
}

fn optional_count(raw: Option<&RawNumber>, field: &str) -> Result<Option<i64>> {
    let Some(value) = optional_decimal(raw, field)? else {
        return Ok(None);
    };

    if !value.fract().is_zero() || value.is_sign_negative() {
        return Err(DataError::Validation(format!(
            "{}는 0 이상의 정수여야 함: {}",
            field, value
        )));
    }

    value
        .to_i64()
        .map(Some)
        .ok_or_else(|| DataError::Validation(format!("{} 범위 초과: {}", field, value)))
}

fn required_count(raw: Option<&RawNumber>, field: &str) -> Result<i64> {
    optional_count(raw, field)?.ok_or_else(|| DataError::Validation(format!("{} 값 없음", field)))
}

fn required_date(raw: Option<&RawDate>, field: &str) -> Result<NaiveDate> {
    let raw = raw.ok_or_else(|| DataError::Validation(format!("{} 값 없음", field)))?;
    parse_date(raw)
        .ok_or_else(|| DataError::Validation(format!("{} 날짜 파싱 실패: {:?}", field, raw)))
}

/// 날짜 표현을 달력 날짜로 변환.
pub fn parse_date(raw: &RawDate) -> Option<NaiveDate> {
    match raw {
        RawDate::Timestamp(ts) => date_from_timestamp(*ts),
        RawDate::Text(text) => parse_date_text(text.trim()),
    }
}

fn date_from_timestamp(ts: i64) -> Option<NaiveDate> {
    let secs = if ts.unsigned_abs() > MILLIS_THRESHOLD.unsigned_abs() {
        ts / 1000
    } else {
        ts
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    // 8자리가 아닌 숫자 문자열은 timestamp
    if text.len() != 8 && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok().and_then(date_from_timestamp);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_local().date())
        })
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}
