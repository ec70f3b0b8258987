//! 공매도 거래량/잔고 공급자 클라이언트.
//!
//! 페이지 envelope 응답을 사용하며, 페이지별 요청이 필요하므로 모든 페이지를
//! 순회하여 `ResponseShape::Paged` 목록으로 반환합니다.
//!
//! ```json
//! { "count": 120, "page": 1, "total_pages": 2, "next": "…?page=2",
//!   "results": [ { "date": "2024-01-02", "short_volume": "1,000", "total_volume": 2500 } ] }
//! ```
//!
//! 공매도 잔고 응답은 `results` 대신 `data` 키를 사용합니다.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracker_core::{DateRange, MetricKind};

use super::{
    validate_request, HttpFetcher, PageInfo, PayloadBody, ProviderClient, ProviderConfig,
    ProviderPayload, ResponseShape,
};
use crate::error::{DataError, Result};

const NAME: &str = "short_data";

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Envelope<T> {
    #[serde(default, alias = "results")]
    data: Vec<T>,
    count: Option<u64>,
    page: Option<u32>,
    total_pages: Option<u32>,
    next: Option<String>,
    status: Option<String>,
    message: Option<String>,
}

/// 공매도 거래량/잔고 클라이언트.
pub struct ShortDataClient {
    http: HttpFetcher,
    max_pages: u32,
}

impl ShortDataClient {
    pub fn new(config: &ProviderConfig, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(NAME, config, cancel)?,
            max_pages: config.max_pages.max(1),
        })
    }

    /// 모든 페이지 조회.
    async fn fetch_pages<T>(
        &self,
        path: &str,
        range: &DateRange,
    ) -> Result<Vec<ResponseShape<T>>>
    where
        T: DeserializeOwned + Send,
    {
        let mut pages = Vec::new();
        let mut page_no = 1u32;

        loop {
            let mut query = vec![("page", page_no.to_string())];
            if let Some(start) = range.start {
                query.push(("start", start.format("%Y-%m-%d").to_string()));
            }
            if let Some(end) = range.end {
                query.push(("end", end.format("%Y-%m-%d").to_string()));
            }

            let envelope: Envelope<T> = self.http.get_json(path, &query).await?;

            if envelope
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("error"))
            {
                return Err(DataError::Api {
                    provider: NAME.to_string(),
                    message: envelope
                        .message
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }

            let page = PageInfo {
                page: envelope.page.unwrap_or(page_no),
                total_pages: envelope.total_pages,
                count: envelope.count,
                next: envelope.next,
            };
            let has_more = page.has_more() && !envelope.data.is_empty();
            pages.push(ResponseShape::Paged {
                items: envelope.data,
                page,
            });

            if !has_more {
                break;
            }
            if page_no >= self.max_pages {
                tracing::warn!(
                    provider = NAME,
                    path = path,
                    max_pages = self.max_pages,
                    "최대 페이지 수 도달, 나머지 페이지 생략"
                );
                break;
            }
            page_no += 1;
        }

        Ok(pages)
    }
}

#[async_trait]
impl ProviderClient for ShortDataClient {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::ShortVolume, MetricKind::ShortInterest]
    }

    async fn fetch(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<ProviderPayload> {
        let symbol = validate_request(NAME, self.supported_kinds(), symbol, kind)?;

        let body = match kind {
            MetricKind::ShortVolume => PayloadBody::ShortVolume(
                self.fetch_pages(&format!("/short-volume/{}", symbol), range)
                    .await?,
            ),
            MetricKind::ShortInterest => PayloadBody::ShortInterest(
                self.fetch_pages(&format!("/short-interest/{}", symbol), range)
                    .await?,
            ),
            other => {
                return Err(DataError::InvalidInput(format!(
                    "{}는 {} 지표를 제공하지 않습니다",
                    NAME, other
                )))
            }
        };

        tracing::debug!(
            provider = NAME,
            symbol = %symbol,
            kind = %kind,
            count = body.item_count(),
            "공매도 데이터 조회 완료"
        );

        Ok(ProviderPayload {
            provider: NAME.to_string(),
            symbol,
            range: *range,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ResilienceConfig;
    use chrono::NaiveDate;
    use mockito::Matcher;

    fn client(base_url: &str, max_pages: u32) -> ShortDataClient {
        let mut config = ProviderConfig::new(base_url).with_resilience(ResilienceConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        });
        config.max_pages = max_pages;
        ShortDataClient::new(&config, CancellationToken::new()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_short_volume_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/short-volume/GME")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"count": 3, "page": 1, "total_pages": 2,
                    "results": [
                      {"date": "2024-01-02", "short_volume": "1,000", "total_volume": 2500},
                      {"date": "2024-01-03", "short_volume": 900, "total_volume": 3000}
                    ]}"#,
            )
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/short-volume/GME")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(
                r#"{"count": 3, "page": 2, "total_pages": 2,
                    "results": [{"date": "2024-01-04", "short_volume": 10, "total_volume": 20}]}"#,
            )
            .create_async()
            .await;

        let payload = client(&server.url(), 50)
            .fetch("gme", MetricKind::ShortVolume, &DateRange::full())
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        assert_eq!(payload.symbol, "GME");
        assert_eq!(payload.kind(), MetricKind::ShortVolume);
        assert_eq!(payload.body.item_count(), 3);
        match &payload.body {
            PayloadBody::ShortVolume(pages) => {
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[0].page_info().unwrap().count, Some(3));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_short_interest_sends_range_and_reads_data_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/short-interest/AMC")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "2024-01-01".into()),
                Matcher::UrlEncoded("end".into(), "2024-01-31".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"page": 1, "total_pages": 1,
                    "data": [{"settlement_date": "2024-01-12", "short_interest": "5,000",
                              "avg_daily_volume": 1000}]}"#,
            )
            .create_async()
            .await;

        let range = DateRange::new(
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        )
        .unwrap();
        let payload = client(&server.url(), 50)
            .fetch("AMC", MetricKind::ShortInterest, &range)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(payload.body.item_count(), 1);
        assert_eq!(payload.range, range);
    }

    #[tokio::test]
    async fn test_error_status_envelope_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/short-volume/ZZZZ")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status": "error", "message": "unknown ticker"}"#)
            .create_async()
            .await;

        let result = client(&server.url(), 50)
            .fetch("ZZZZ", MetricKind::ShortVolume, &DateRange::full())
            .await;

        match result {
            Err(DataError::Api { message, .. }) => assert_eq!(message, "unknown ticker"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_max_pages_stops_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/short-volume/GME")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"page": 1, "total_pages": 10,
                    "results": [{"date": "2024-01-02", "short_volume": 1, "total_volume": 2}]}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let payload = client(&server.url(), 2)
            .fetch("GME", MetricKind::ShortVolume, &DateRange::full())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(payload.body.item_count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_rejected() {
        let result = client("http://127.0.0.1:1", 50)
            .fetch("GME", MetricKind::PriceBar, &DateRange::full())
            .await;
        assert!(matches!(result, Err(DataError::InvalidInput(_))));
    }
}
