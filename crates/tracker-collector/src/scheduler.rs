//! 수집 스케줄러.
//!
//! 추적 심볼을 심볼 순으로 하나씩 처리하며, 심볼마다 등록된 모든 지표를
//! 동기화합니다.
//!
//! - 심볼 간에는 설정된 대기 시간을 둡니다 (공급자 rate limit)
//! - 한 심볼의 실패는 로그만 남기고 다음 심볼로 넘어갑니다
//! - 종료 신호는 심볼 사이에서 확인하며, 남은 심볼은 처리하지 않습니다
//! - 동시에 두 패스가 실행되지 않습니다
//!
//! ```text
//! Idle → Fetching(s) → Reconciling(s) → Persisting(s) → … → Idle
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracker_core::{metric_span, normalize_symbol, TrackedSymbol};
use tracker_data::{DataError, MetricStore, ProviderRegistry, SymbolStore};

use crate::config::SchedulerConfig;
use crate::error::CollectorError;
use crate::modules::{ensure_symbols, sync_metric};
use crate::{CollectionStats, Result};

/// 패스 진행 상태
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Fetching(String),
    Reconciling(String),
    Persisting(String),
}

/// 심볼 처리 결과
enum SymbolResult {
    Success,
    Failed,
    Cancelled,
}

/// 수집 스케줄러.
pub struct Collector {
    registry: ProviderRegistry,
    metric_store: Arc<dyn MetricStore>,
    symbol_store: Arc<dyn SymbolStore>,
    config: SchedulerConfig,
    state: Arc<Mutex<PassState>>,
    running: AtomicBool,
}

/// 패스 종료 시 실행 플래그와 상태를 되돌림
struct PassGuard<'a> {
    running: &'a AtomicBool,
    state: &'a Mutex<PassState>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = PassState::Idle;
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Collector {
    pub fn new(
        registry: ProviderRegistry,
        metric_store: Arc<dyn MetricStore>,
        symbol_store: Arc<dyn SymbolStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            metric_store,
            symbol_store,
            config,
            state: Arc::new(Mutex::new(PassState::Idle)),
            running: AtomicBool::new(false),
        }
    }

    /// 현재 패스 상태.
    pub fn state(&self) -> PassState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 패스 실행 중 여부.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// 추적 심볼 조회 (비어 있으면 기본 목록 등록).
    pub async fn ensure_symbols(&self) -> Result<Vec<TrackedSymbol>> {
        ensure_symbols(self.symbol_store.as_ref()).await
    }

    /// 전체 추적 심볼에 대해 한 번의 패스를 실행합니다.
    ///
    /// `filter`가 주어지면 해당 심볼만 처리합니다. 다른 패스가 진행 중이면
    /// `PassInProgress`를 반환합니다.
    pub async fn run_pass(
        &self,
        filter: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<CollectionStats> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CollectorError::PassInProgress);
        }
        let _guard = PassGuard {
            running: &self.running,
            state: &self.state,
        };

        let start = Instant::now();
        let mut stats = CollectionStats::new();

        let mut symbols = self.ensure_symbols().await?;
        if let Some(filter) = filter {
            symbols = apply_filter(symbols, filter);
        }
        symbols.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let kinds = self.registry.kinds();
        let range = self.config.date_range(Utc::now().date_naive());

        tracing::info!(
            symbols = symbols.len(),
            kinds = ?kinds,
            range = ?range,
            "수집 패스 시작"
        );

        if symbols.is_empty() || kinds.is_empty() {
            tracing::warn!("수집할 심볼 또는 지표가 없습니다");
            stats.elapsed = start.elapsed();
            return Ok(stats);
        }

        for (idx, tracked) in symbols.iter().enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled += symbols.len() - idx;
                tracing::info!(remaining = symbols.len() - idx, "종료 신호 수신, 패스 중단");
                break;
            }

            stats.total += 1;
            tracing::debug!(
                symbol = %tracked.symbol,
                progress = format!("{}/{}", idx + 1, symbols.len()),
                "심볼 처리 시작"
            );

            match self.process_symbol(&tracked.symbol, &range, &mut stats).await {
                SymbolResult::Success => {
                    stats.success += 1;
                    if let Err(e) = self
                        .symbol_store
                        .mark_refreshed(&tracked.symbol, Utc::now())
                        .await
                    {
                        tracing::warn!(symbol = %tracked.symbol, error = %e, "갱신 시각 기록 실패");
                    }
                }
                SymbolResult::Failed => stats.errors += 1,
                SymbolResult::Cancelled => {
                    stats.total -= 1;
                    stats.cancelled += symbols.len() - idx;
                    tracing::info!(symbol = %tracked.symbol, "종료 신호 수신, 패스 중단");
                    break;
                }
            }

            // Rate limiting
            if idx + 1 < symbols.len() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.symbol_delay()) => {}
                }
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    /// 심볼 하나의 모든 지표 처리. 실패는 지표 단위로 기록하고 계속 진행합니다.
    async fn process_symbol(
        &self,
        symbol: &str,
        range: &tracker_core::DateRange,
        stats: &mut CollectionStats,
    ) -> SymbolResult {
        let state = self.state.clone();
        let on_state = move |next: PassState| {
            *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        };

        let mut failed = false;

        for kind in self.registry.kinds() {
            let Some(client) = self.registry.get(kind) else {
                continue;
            };

            let result = sync_metric(
                client.as_ref(),
                self.metric_store.as_ref(),
                symbol,
                kind,
                range,
                &on_state,
            )
            .instrument(metric_span!("sync_metric", symbol, kind))
            .await;

            match result {
                Ok(outcome) => stats.record(&outcome),
                Err(CollectorError::Data(DataError::Cancelled)) => return SymbolResult::Cancelled,
                Err(e) => {
                    failed = true;
                    tracing::error!(
                        symbol = symbol,
                        kind = %kind,
                        provider = client.name(),
                        error = %e,
                        "지표 동기화 실패"
                    );
                }
            }
        }

        if failed {
            SymbolResult::Failed
        } else {
            SymbolResult::Success
        }
    }

    /// 종료 신호까지 주기적으로 패스를 실행합니다.
    pub async fn run_daemon(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            interval_minutes = self.config.interval_minutes,
            "=== 데몬 모드 시작 ==="
        );

        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("종료 신호 수신, 데몬 종료 중...");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_pass(None, &cancel).await {
                        Ok(stats) => stats.log_summary("수집 패스"),
                        Err(CollectorError::PassInProgress) => {
                            tracing::warn!("이전 패스가 진행 중이라 이번 주기를 건너뜁니다");
                        }
                        Err(e) => tracing::error!(error = %e, "수집 패스 실패"),
                    }

                    tracing::info!(
                        "=== 패스 완료, 다음 실행: {}분 후 ===",
                        self.config.interval_minutes
                    );
                }
            }
        }

        Ok(())
    }
}

/// 필터에 포함된 심볼만 남김. 추적 중이 아닌 심볼은 경고합니다.
fn apply_filter(symbols: Vec<TrackedSymbol>, filter: &[String]) -> Vec<TrackedSymbol> {
    let wanted: BTreeSet<String> = filter
        .iter()
        .filter_map(|s| match normalize_symbol(s) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                tracing::warn!(error = %e, "잘못된 심볼 필터 무시");
                None
            }
        })
        .collect();

    for symbol in &wanted {
        if !symbols.iter().any(|s| &s.symbol == symbol) {
            tracing::warn!(symbol = %symbol, "추적 중이 아닌 심볼, 건너뜀");
        }
    }

    symbols
        .into_iter()
        .filter(|s| wanted.contains(&s.symbol))
        .collect()
}
