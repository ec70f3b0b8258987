//! 대차 수수료 공급자 클라이언트.
//!
//! `GET {base}/api/ticker/{SYMBOL}` 응답의 `daily` 배열을 사용합니다.
//! 날짜 범위 파라미터를 지원하지 않으므로 항상 전체 이력을 받고,
//! 범위 필터링은 정규화 단계에서 수행됩니다.
//!
//! ```json
//! { "daily": [ { "date": "2024-01-02", "fee": "1.5", "rebate": -0.2, "available": "1,200,000" } ] }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracker_core::{DateRange, MetricKind};

use super::{
    validate_request, HttpFetcher, PayloadBody, ProviderClient, ProviderConfig, ProviderPayload,
    RawBorrowFee, ResponseShape,
};
use crate::error::{DataError, Result};

const NAME: &str = "borrow_desk";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    daily: Vec<RawBorrowFee>,
    #[serde(default)]
    error: Option<String>,
}

/// 대차 수수료 클라이언트.
pub struct BorrowDeskClient {
    http: HttpFetcher,
}

impl BorrowDeskClient {
    pub fn new(config: &ProviderConfig, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(NAME, config, cancel)?,
        })
    }
}

#[async_trait]
impl ProviderClient for BorrowDeskClient {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::BorrowFee]
    }

    async fn fetch(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<ProviderPayload> {
        let symbol = validate_request(NAME, self.supported_kinds(), symbol, kind)?;

        let response: TickerResponse = self
            .http
            .get_json(&format!("/api/ticker/{}", symbol), &[])
            .await?;

        if let Some(message) = response.error {
            return Err(DataError::Api {
                provider: NAME.to_string(),
                message,
            });
        }

        tracing::debug!(
            provider = NAME,
            symbol = %symbol,
            count = response.daily.len(),
            "대차 수수료 조회 완료"
        );

        Ok(ProviderPayload {
            provider: NAME.to_string(),
            symbol,
            range: *range,
            body: PayloadBody::BorrowFee(vec![ResponseShape::Flat(response.daily)]),
        })
    }
}
