//! 일봉 차트 공급자 클라이언트.
//!
//! `GET {base}/v8/finance/chart/{SYMBOL}?interval=1d&period1=..&period2=..`
//!
//! 응답은 컬럼형입니다. `timestamp` 배열과 `indicators.quote[0]`의 각 배열이 같은
//! 인덱스로 대응하므로 행 단위 `RawPriceBar`로 변환하여 반환합니다. 값이 비어 있는
//! 칸(null)은 그대로 None으로 남기며, 정규화 단계에서 해당 행을 버립니다.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracker_core::{DateRange, MetricKind};

use super::{
    validate_request, HttpFetcher, PayloadBody, ProviderClient, ProviderConfig, ProviderPayload,
    RawDate, RawNumber, RawPriceBar, ResponseShape,
};
use crate::error::{DataError, Result};

const NAME: &str = "yahoo_chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<RawNumber>>,
    #[serde(default)]
    high: Vec<Option<RawNumber>>,
    #[serde(default)]
    low: Vec<Option<RawNumber>>,
    #[serde(default)]
    close: Vec<Option<RawNumber>>,
    #[serde(default)]
    volume: Vec<Option<RawNumber>>,
}

/// 일봉 차트 클라이언트.
pub struct YahooChartClient {
    http: HttpFetcher,
}

impl YahooChartClient {
    pub fn new(config: &ProviderConfig, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(NAME, config, cancel)?,
        })
    }
}

/// 날짜 범위 → 쿼리 파라미터.
///
/// 시작일이 없으면 `range=max`로 전체 이력을 요청합니다. 종료일은 포함 범위이므로
/// 다음날 0시(UTC)를 period2로 사용합니다.
fn range_query(range: &DateRange) -> Vec<(&'static str, String)> {
    let mut query = vec![("interval", "1d".to_string())];

    match range.start {
        None => query.push(("range", "max".to_string())),
        Some(start) => {
            query.push(("period1", unix_midnight(start).to_string()));
            let end = range
                .end
                .and_then(|e| e.checked_add_days(Days::new(1)))
                .map(unix_midnight)
                .unwrap_or_else(|| chrono::Utc::now().timestamp());
            query.push(("period2", end.to_string()));
        }
    }

    query
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// 컬럼형 응답을 행으로 변환. 짧은 컬럼은 None으로 채웁니다.
fn to_rows(result: ChartResult) -> Vec<RawPriceBar> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let cell = |column: &[Option<RawNumber>], i: usize| column.get(i).cloned().flatten();

    result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, ts)| RawPriceBar {
            timestamp: Some(RawDate::Timestamp(*ts)),
            open: cell(&quote.open, i),
            high: cell(&quote.high, i),
            low: cell(&quote.low, i),
            close: cell(&quote.close, i),
            volume: cell(&quote.volume, i),
        })
        .collect()
}

#[async_trait]
impl ProviderClient for YahooChartClient {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::PriceBar]
    }

    async fn fetch(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<ProviderPayload> {
        let symbol = validate_request(NAME, self.supported_kinds(), symbol, kind)?;

        let response: ChartResponse = self
            .http
            .get_json(&format!("/v8/finance/chart/{}", symbol), &range_query(range))
            .await?;

        if let Some(error) = response.chart.error {
            return Err(DataError::Api {
                provider: NAME.to_string(),
                message: format!(
                    "{}: {}",
                    error.code.unwrap_or_default(),
                    error.description.unwrap_or_default()
                ),
            });
        }

        let rows: Vec<RawPriceBar> = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .flat_map(to_rows)
            .collect();

        tracing::debug!(
            provider = NAME,
            symbol = %symbol,
            count = rows.len(),
            "일봉 조회 완료"
        );

        Ok(ProviderPayload {
            provider: NAME.to_string(),
            symbol,
            range: *range,
            body: PayloadBody::PriceBar(vec![ResponseShape::Flat(rows)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ResilienceConfig;
    use mockito::Matcher;

    fn client(base_url: &str) -> YahooChartClient {
        let config = ProviderConfig::new(base_url).with_resilience(ResilienceConfig {
            max_attempts: 1,
            ..Default::default()
        });
        YahooChartClient::new(&config, CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_range_query() {
        let open = range_query(&DateRange::full());
        assert!(open.contains(&("range", "max".to_string())));

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2),
            NaiveDate::from_ymd_opt(2024, 1, 2),
        )
        .unwrap();
        let bounded = range_query(&range);
        assert!(bounded.contains(&("period1", "1704153600".to_string())));
        assert!(bounded.contains(&("period2", "1704240000".to_string())));
    }

    #[tokio::test]
    async fn test_columns_are_zipped_into_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v8/finance/chart/TSLA")
            .match_query(Matcher::UrlEncoded("interval".into(), "1d".into()))
            .with_status(200)
            .with_body(
                r#"{"chart": {"result": [{
                    "timestamp": [1704205800, 1704292200],
                    "indicators": {"quote": [{
                        "open": [250.08, null],
                        "high": [251.25, 245.68],
                        "low": [244.41, 236.32],
                        "close": [248.42, 238.45],
                        "volume": [104654200, 121082600]
                    }]}
                }], "error": null}}"#,
            )
            .create_async()
            .await;

        let payload = client(&server.url())
            .fetch("TSLA", MetricKind::PriceBar, &DateRange::full())
            .await
            .unwrap();

        mock.assert_async().await;
        match payload.body {
            PayloadBody::PriceBar(pages) => {
                let rows = pages[0].items();
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].timestamp, Some(RawDate::Timestamp(1704205800)));
                assert_eq!(rows[0].close.as_ref().unwrap().as_text(), "248.42");
                assert!(rows[1].open.is_none());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chart_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v8/finance/chart/NOPE")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"chart": {"result": null,
                    "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#,
            )
            .create_async()
            .await;

        let result = client(&server.url())
            .fetch("NOPE", MetricKind::PriceBar, &DateRange::full())
            .await;

        assert!(matches!(result, Err(DataError::Api { .. })));
    }
}
