//! 데이터 Provider 모듈.
//!
//! 외부 데이터 소스별 클라이언트를 정의합니다. 각 클라이언트는 자체
//! `ResiliencePolicy`를 통해 요청하고 공급자 원본 형태(`ProviderPayload`)를 반환하며,
//! 저장소에 대해서는 알지 못합니다.
//!
//! ## 공급자
//! - `BorrowDeskClient`: 대차 수수료 (단일 배열)
//! - `ShortDataClient`: 공매도 거래량, 공매도 잔고 (페이지 envelope)
//! - `SecFtdClient`: 결제 불이행 (상태 코드 포함 envelope)
//! - `YahooChartClient`: 일봉 가격/거래량 (컬럼형 응답)

pub mod borrow_desk;
pub mod http;
pub mod payload;
pub mod sec_ftd;
pub mod short_data;
pub mod yahoo_chart;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracker_core::{normalize_symbol, DateRange, MetricKind};

use crate::error::{DataError, Result};
use crate::resilience::ResilienceConfig;

pub use borrow_desk::BorrowDeskClient;
pub use http::HttpFetcher;
pub use payload::*;
pub use sec_ftd::SecFtdClient;
pub use short_data::ShortDataClient;
pub use yahoo_chart::YahooChartClient;

/// 공급자별 설정. 모든 값은 공급자마다 독립적으로 덮어쓸 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API Base URL
    pub base_url: String,
    /// 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 복원력 정책 설정
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// 페이지 envelope 응답의 최대 조회 페이지 수
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_enabled() -> bool {
    true
}
fn default_max_pages() -> u32 {
    50
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            enabled: default_enabled(),
            resilience: ResilienceConfig::default(),
            max_pages: default_max_pages(),
        }
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }
}

/// 외부 데이터 소스 클라이언트.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// 공급자 이름 (로깅용)
    fn name(&self) -> &str;

    /// 제공 가능한 지표 종류.
    fn supported_kinds(&self) -> &'static [MetricKind];

    /// 심볼의 지표 데이터 조회.
    ///
    /// 날짜 범위의 양 끝은 선택이며, 열린 범위는 가능한 전체 이력을 조회합니다.
    async fn fetch(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> Result<ProviderPayload>;
}

/// 요청 인자 검증 후 정규화된 심볼 반환.
pub(crate) fn validate_request(
    provider: &str,
    supported: &[MetricKind],
    symbol: &str,
    kind: MetricKind,
) -> Result<String> {
    let symbol = normalize_symbol(symbol).map_err(|e| DataError::InvalidInput(e.to_string()))?;

    if !supported.contains(&kind) {
        return Err(DataError::InvalidInput(format!(
            "{}는 {} 지표를 제공하지 않습니다",
            provider, kind
        )));
    }

    Ok(symbol)
}

/// 지표 종류 → 공급자 클라이언트 매핑.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: BTreeMap<MetricKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 클라이언트가 지원하는 모든 지표에 등록합니다. 이미 등록된 지표는 덮어씁니다.
    pub fn register(&mut self, client: Arc<dyn ProviderClient>) {
        for kind in client.supported_kinds() {
            self.clients.insert(*kind, client.clone());
        }
    }

    /// 특정 지표에만 등록합니다.
    pub fn register_for(&mut self, kind: MetricKind, client: Arc<dyn ProviderClient>) {
        self.clients.insert(kind, client);
    }

    /// 지정한 지표만 남깁니다.
    pub fn retain_kinds(&mut self, kinds: &[MetricKind]) {
        self.clients.retain(|kind, _| kinds.contains(kind));
    }

    pub fn get(&self, kind: MetricKind) -> Option<&Arc<dyn ProviderClient>> {
        self.clients.get(&kind)
    }

    /// 등록된 지표 목록 (고정 순서).
    pub fn kinds(&self) -> Vec<MetricKind> {
        self.clients.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.clients.iter().map(|(k, c)| (k, c.name())))
            .finish()
    }
}
