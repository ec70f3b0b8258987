//! 설정 기반 공급자 등록.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracker_core::MetricKind;
use tracker_data::{
    BorrowDeskClient, ProviderClient, ProviderConfig, ProviderRegistry, SecFtdClient,
    ShortDataClient, YahooChartClient,
};

use crate::config::ProvidersConfig;
use crate::Result;

/// 활성화된 공급자로 레지스트리를 구성합니다.
///
/// `metrics`에 없는 지표는 제외되며, 공급자가 없는 지표는 경고 후 건너뜁니다.
pub fn build_registry(
    providers: &ProvidersConfig,
    metrics: &[MetricKind],
    cancel: &CancellationToken,
) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    register(&mut registry, "borrow_desk", &providers.borrow_desk, |c| {
        Ok(Arc::new(BorrowDeskClient::new(c, cancel.clone())?))
    })?;
    register(&mut registry, "short_data", &providers.short_data, |c| {
        Ok(Arc::new(ShortDataClient::new(c, cancel.clone())?))
    })?;
    register(&mut registry, "sec_ftd", &providers.sec_ftd, |c| {
        Ok(Arc::new(SecFtdClient::new(c, cancel.clone())?))
    })?;
    register(&mut registry, "yahoo", &providers.yahoo, |c| {
        Ok(Arc::new(YahooChartClient::new(c, cancel.clone())?))
    })?;

    registry.retain_kinds(metrics);

    for kind in metrics {
        if registry.get(*kind).is_none() {
            tracing::warn!(kind = %kind, "활성화된 공급자가 없어 지표를 건너뜁니다");
        }
    }

    tracing::info!(registry = ?registry, "공급자 등록 완료");
    Ok(registry)
}

fn register<F>(
    registry: &mut ProviderRegistry,
    name: &str,
    config: &ProviderConfig,
    build: F,
) -> Result<()>
where
    F: FnOnce(&ProviderConfig) -> tracker_data::Result<Arc<dyn ProviderClient>>,
{
    if !config.enabled {
        tracing::debug!(provider = name, "비활성 공급자");
        return Ok(());
    }

    registry.register(build(config)?);
    Ok(())
}
