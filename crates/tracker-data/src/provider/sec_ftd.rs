//! 결제 불이행(FTD) 공급자 클라이언트.
//!
//! ```json
//! { "status": "OK", "data": [ { "settlement_date": "20240102", "quantity": "12,345", "price": "17.25" } ] }
//! ```
//!
//! `status`가 `OK`가 아니면 `message`를 담아 API 오류로 처리합니다.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracker_core::{DateRange, MetricKind};

use super::{
    validate_request, HttpFetcher, PayloadBody, ProviderClient, ProviderConfig, ProviderPayload,
    RawFailToDeliver, ResponseShape,
};
use crate::error::{DataError, Result};

const NAME: &str = "sec_ftd";

#[derive(Debug, Deserialize)]
struct FtdResponse {
    status: Option<String>,
    #[serde(default)]
    data: Vec<RawFailToDeliver>,
    message: Option<String>,
}

/// 결제 불이행 클라이언트.
pub struct SecFtdClient {
    http: HttpFetcher,
}

impl SecFtdClient {
    pub fn new(config: &ProviderConfig, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(NAME, config, cancel)?,
        })
    }
}

#[async_trait]
impl ProviderClient for SecFtdClient {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::FailsToDeliver]
    }

    async fn fetch(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<ProviderPayload> {
        let symbol = validate_request(NAME, self.supported_kinds(), symbol, kind)?;

        let mut query = Vec::new();
        if let Some(start) = range.start {
            query.push(("from", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = range.end {
            query.push(("to", end.format("%Y-%m-%d").to_string()));
        }

        let response: FtdResponse = self
            .http
            .get_json(&format!("/ftd/{}", symbol), &query)
            .await?;

        let ok = response
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ok"));
        if !ok {
            return Err(DataError::Api {
                provider: NAME.to_string(),
                message: response.message.unwrap_or_else(|| {
                    format!("status={}", response.status.as_deref().unwrap_or("missing"))
                }),
            });
        }

        tracing::debug!(
            provider = NAME,
            symbol = %symbol,
            count = response.data.len(),
            "결제 불이행 조회 완료"
        );

        Ok(ProviderPayload {
            provider: NAME.to_string(),
            symbol,
            range: *range,
            body: PayloadBody::FailsToDeliver(vec![ResponseShape::Flat(response.data)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ResilienceConfig;
    use mockito::Matcher;

    fn client(base_url: &str) -> SecFtdClient {
        let config = ProviderConfig::new(base_url).with_resilience(ResilienceConfig {
            max_attempts: 1,
            ..Default::default()
        });
        SecFtdClient::new(&config, CancellationToken::new()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ftd/KOSS")
            .match_query(Matcher::UrlEncoded("from".into(), "2024-01-01".into()))
            .with_status(200)
            .with_body(
                r#"{"status": "OK", "data": [
                    {"settlement_date": "20240102", "quantity": "12,345", "price": "17.25"},
                    {"date": "2024-01-03", "quantity": 10}
                ]}"#,
            )
            .create_async()
            .await;

        let range = DateRange::since(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let payload = client(&server.url())
            .fetch("koss", MetricKind::FailsToDeliver, &range)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(payload.kind(), MetricKind::FailsToDeliver);
        assert_eq!(payload.body.item_count(), 2);
    }

    #[tokio::test]
    async fn test_non_ok_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ftd/KOSS")
            .with_status(200)
            .with_body(r#"{"status": "NO_DATA", "message": "no filings for symbol"}"#)
            .create_async()
            .await;

        let result = client(&server.url())
            .fetch("KOSS", MetricKind::FailsToDeliver, &DateRange::full())
            .await;

        match result {
            Err(DataError::Api { provider, message }) => {
                assert_eq!(provider, "sec_ftd");
                assert_eq!(message, "no filings for symbol");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
