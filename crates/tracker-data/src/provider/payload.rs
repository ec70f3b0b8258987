//! 공급자 원본 응답 형태.
//!
//! 공급자마다 응답 모양이 다릅니다 (단일 배열 / 페이지 envelope, 숫자 / 숫자 문자열,
//! 날짜 문자열 / unix timestamp). 이 모듈의 타입은 원본 형태를 그대로 보존하며,
//! 정규화는 `normalize` 모듈이 담당합니다.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracker_core::{DateRange, MetricKind};

/// 숫자 또는 숫자 문자열 필드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(serde_json::Number),
    Text(String),
}

impl RawNumber {
    /// 원본 텍스트 표현.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawNumber::Number(n) => Cow::Owned(n.to_string()),
            RawNumber::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(s: &str) -> Self {
        RawNumber::Text(s.to_string())
    }
}

impl From<i64> for RawNumber {
    fn from(n: i64) -> Self {
        RawNumber::Number(n.into())
    }
}

/// 날짜 문자열 또는 unix timestamp 필드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Timestamp(i64),
    Text(String),
}

impl From<&str> for RawDate {
    fn from(s: &str) -> Self {
        RawDate::Text(s.to_string())
    }
}

/// 페이지 메타데이터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 현재 페이지 (1부터)
    pub page: u32,
    pub total_pages: Option<u32>,
    /// 전체 항목 수
    pub count: Option<u64>,
    /// 다음 페이지 URL
    pub next: Option<String>,
}

impl PageInfo {
    /// 다음 페이지가 남아 있는지 여부.
    pub fn has_more(&self) -> bool {
        self.next.is_some() || self.total_pages.is_some_and(|total| self.page < total)
    }
}

/// 응답 형태: 단일 배열 또는 페이지 envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape<T> {
    Flat(Vec<T>),
    Paged { items: Vec<T>, page: PageInfo },
}

impl<T> ResponseShape<T> {
    pub fn items(&self) -> &[T] {
        match self {
            ResponseShape::Flat(items) => items,
            ResponseShape::Paged { items, .. } => items,
        }
    }

    pub fn page_info(&self) -> Option<&PageInfo> {
        match self {
            ResponseShape::Flat(_) => None,
            ResponseShape::Paged { page, .. } => Some(page),
        }
    }
}

/// 대차 수수료 원본 레코드.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBorrowFee {
    #[serde(alias = "time")]
    pub date: Option<RawDate>,
    pub fee: Option<RawNumber>,
    pub rebate: Option<RawNumber>,
    pub available: Option<RawNumber>,
}

/// 공매도 거래량 원본 레코드.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawShortVolume {
    pub date: Option<RawDate>,
    pub short_volume: Option<RawNumber>,
    pub short_exempt_volume: Option<RawNumber>,
    pub total_volume: Option<RawNumber>,
}

/// 공매도 잔고 원본 레코드.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawShortInterest {
    #[serde(alias = "date")]
    pub settlement_date: Option<RawDate>,
    pub short_interest: Option<RawNumber>,
    #[serde(alias = "average_daily_volume")]
    pub avg_daily_volume: Option<RawNumber>,
    pub days_to_cover: Option<RawNumber>,
    pub percent_of_float: Option<RawNumber>,
}

/// 결제 불이행 원본 레코드.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFailToDeliver {
    #[serde(alias = "date")]
    pub settlement_date: Option<RawDate>,
    pub quantity: Option<RawNumber>,
    pub price: Option<RawNumber>,
}

/// 일봉 원본 레코드 (컬럼형 응답을 행으로 변환한 것).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPriceBar {
    pub timestamp: Option<RawDate>,
    pub open: Option<RawNumber>,
    pub high: Option<RawNumber>,
    pub low: Option<RawNumber>,
    pub close: Option<RawNumber>,
    pub volume: Option<RawNumber>,
}

/// 지표 종류별 원본 페이지 목록.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    BorrowFee(Vec<ResponseShape<RawBorrowFee>>),
    ShortInterest(Vec<ResponseShape<RawShortInterest>>),
    ShortVolume(Vec<ResponseShape<RawShortVolume>>),
    FailsToDeliver(Vec<ResponseShape<RawFailToDeliver>>),
    PriceBar(Vec<ResponseShape<RawPriceBar>>),
}

impl PayloadBody {
    pub fn kind(&self) -> MetricKind {
        match self {
            PayloadBody::BorrowFee(_) => MetricKind::BorrowFee,
            PayloadBody::ShortInterest(_) => MetricKind::ShortInterest,
            PayloadBody::ShortVolume(_) => MetricKind::ShortVolume,
            PayloadBody::FailsToDeliver(_) => MetricKind::FailsToDeliver,
            PayloadBody::PriceBar(_) => MetricKind::PriceBar,
        }
    }

    /// 전체 원본 레코드 수.
    pub fn item_count(&self) -> usize {
        fn count<T>(pages: &[ResponseShape<T>]) -> usize {
            pages.iter().map(|p| p.items().len()).sum()
        }
        match self {
            PayloadBody::BorrowFee(p) => count(p),
            PayloadBody::ShortInterest(p) => count(p),
            PayloadBody::ShortVolume(p) => count(p),
            PayloadBody::FailsToDeliver(p) => count(p),
            PayloadBody::PriceBar(p) => count(p),
        }
    }
}

/// 공급자 클라이언트의 조회 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayload {
    /// 공급자 이름
    pub provider: String,
    /// 요청 심볼 (정규화됨)
    pub symbol: String,
    /// 요청 날짜 범위
    pub range: DateRange,
    pub body: PayloadBody,
}

impl ProviderPayload {
    pub fn kind(&self) -> MetricKind {
        self.body.kind()
    }
}
