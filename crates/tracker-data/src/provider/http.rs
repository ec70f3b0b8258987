//! 공급자 공용 HTTP 조회.
//!
//! 모든 요청은 클라이언트별 `ResiliencePolicy`를 거칩니다. 본문 역직렬화는 정책
//! 바깥에서 수행하므로 형식 불일치(ParseFailure)는 재시도되지 않습니다.

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::ProviderConfig;
use crate::error::{DataError, Result};
use crate::resilience::ResiliencePolicy;

/// 에러 메시지에 포함할 응답 본문 최대 길이
const MAX_ERROR_BODY: usize = 200;

/// 공급자 HTTP 조회기.
pub struct HttpFetcher {
    provider: String,
    client: reqwest::Client,
    base_url: String,
    policy: ResiliencePolicy,
}

impl HttpFetcher {
    /// 새 조회기 생성.
    ///
    /// 시도별 제한 시간은 정책이 적용하므로 reqwest 클라이언트에는 설정하지 않습니다.
    pub fn new(
        provider: impl Into<String>,
        config: &ProviderConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let provider = provider.into();
        let client = reqwest::Client::builder()
            .user_agent(concat!("short-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        let policy = ResiliencePolicy::new(provider.clone(), config.resilience.clone())
            .with_cancellation(cancel);

        Ok(Self {
            provider,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// GET 요청 후 JSON 역직렬화.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!(provider = %self.provider, url = %url, "공급자 요청");

        let body = self.policy.execute(|| self.get_text(&url, query)).await?;

        serde_json::from_str(&body).map_err(|e| {
            DataError::Parse(format!("{} 응답 파싱 실패 ({}): {}", self.provider, url, e))
        })
    }

    /// 단일 시도. 2xx/3xx만 성공으로 처리합니다.
    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response.text().await?);
        }

        let code = status.as_u16();
        if DataError::is_transient_status(code) {
            return Err(DataError::Http {
                status: code,
                url: url.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
        Err(DataError::Api {
            provider: self.provider.clone(),
            message: format!("{} - {}", status, snippet),
        })
    }
}
