//! 수집 스케줄러 통합 테스트.
//!
//! 가짜 공급자와 메모리 저장소로 패스 전체 흐름을 검증합니다.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracker_collector::{Collector, CollectorError, PassState, SchedulerConfig};
use tracker_core::{DateRange, MetricKind, MutationSet, StoredSnapshot, TrackedSymbol};
use tracker_data::provider::{RawBorrowFee, RawDate, RawNumber};
use tracker_data::{
    DataError, InMemoryStore, MetricStore, PayloadBody, ProviderClient, ProviderPayload,
    ProviderRegistry, ResilienceConfig, ResiliencePolicy, ResponseShape, SymbolStore,
};

// ==================== 가짜 공급자 ====================

/// 심볼별로 고정된 대차 수수료 행을 반환하는 공급자.
#[derive(Default)]
struct FakeBorrowClient {
    rows: Mutex<HashMap<String, Vec<(&'static str, &'static str)>>>,
    failing: HashSet<String>,
    calls: AtomicU32,
    /// 첫 호출 후 취소할 토큰
    cancel_on_first_call: Option<CancellationToken>,
    /// 응답 전 대기
    gate: Option<Arc<Notify>>,
}

impl FakeBorrowClient {
    fn with_rows(rows: &[(&str, Vec<(&'static str, &'static str)>)]) -> Self {
        Self {
            rows: Mutex::new(
                rows.iter()
                    .map(|(s, r)| (s.to_string(), r.clone()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn set_rows(&self, symbol: &str, rows: Vec<(&'static str, &'static str)>) {
        self.rows.lock().unwrap().insert(symbol.to_string(), rows);
    }
}

#[async_trait]
impl ProviderClient for FakeBorrowClient {
    fn name(&self) -> &str {
        "fake_borrow"
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::BorrowFee]
    }

    async fn fetch(
        &self,
        symbol: &str,
        _kind: MetricKind,
        range: &DateRange,
    ) -> tracker_data::Result<ProviderPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(cancel) = &self.cancel_on_first_call {
            cancel.cancel();
        }
        if self.failing.contains(symbol) {
            return Err(DataError::Api {
                provider: "fake_borrow".into(),
                message: "unknown ticker".into(),
            });
        }

        let rows = self
            .rows
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();

        Ok(ProviderPayload {
            provider: "fake_borrow".into(),
            symbol: symbol.to_string(),
            range: *range,
            body: PayloadBody::BorrowFee(vec![ResponseShape::Flat(
                rows.into_iter()
                    .map(|(date, fee)| RawBorrowFee {
                        date: Some(RawDate::from(date)),
                        fee: Some(RawNumber::from(fee)),
                        ..Default::default()
                    })
                    .collect(),
            )]),
        })
    }
}

/// 모든 시도가 응답하지 않는 공급자 (정책의 timeout/retry 적용).
struct HangingClient {
    policy: ResiliencePolicy,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl ProviderClient for HangingClient {
    fn name(&self) -> &str {
        "hanging"
    }

    fn supported_kinds(&self) -> &'static [MetricKind] {
        &[MetricKind::ShortVolume]
    }

    async fn fetch(
        &self,
        _symbol: &str,
        _kind: MetricKind,
        _range: &DateRange,
    ) -> tracker_data::Result<ProviderPayload> {
        self.policy
            .execute(|| {
                let attempts = self.attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(DataError::Network("unreachable".into()))
                }
            })
            .await
    }
}

// ==================== 저장소 ====================

/// 특정 심볼의 쓰기를 거부하는 저장소.
struct RejectingStore {
    inner: InMemoryStore,
    reject: String,
}

#[async_trait]
impl MetricStore for RejectingStore {
    async fn load_snapshot(
        &self,
        symbol: &str,
        kind: MetricKind,
        range: &DateRange,
    ) -> tracker_data::Result<StoredSnapshot> {
        self.inner.load_snapshot(symbol, kind, range).await
    }

    async fn apply_mutations(&self, mutations: &MutationSet) -> tracker_data::Result<u64> {
        if mutations.symbol == self.reject {
            return Err(DataError::Persistence("constraint violation".into()));
        }
        self.inner.apply_mutations(mutations).await
    }
}

// ==================== 헬퍼 ====================

fn scheduler_config(delay_ms: u64) -> SchedulerConfig {
    SchedulerConfig {
        symbol_delay_ms: delay_ms,
        ..Default::default()
    }
}

async fn store_with(symbols: &[&str]) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let tracked: Vec<_> = symbols
        .iter()
        .map(|s| TrackedSymbol::new(s, "NYSE", *s).unwrap())
        .collect();
    store.seed_symbols(&tracked).await.unwrap();
    store
}

fn registry_of(client: Arc<dyn ProviderClient>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(client);
    registry
}

fn collector(
    client: Arc<dyn ProviderClient>,
    store: Arc<InMemoryStore>,
    config: SchedulerConfig,
) -> Collector {
    Collector::new(registry_of(client), store.clone(), store, config)
}

// ==================== 테스트 ====================

#[tokio::test(start_paused = true)]
async fn test_repeated_pass_writes_nothing() {
    let client = Arc::new(FakeBorrowClient::with_rows(&[
        ("GME", vec![("2024-01-01", "1.5"), ("2024-01-02", "2.0")]),
        ("AMC", vec![("2024-01-01", "10")]),
    ]));
    let store = store_with(&["GME", "AMC"]).await;
    let collector = collector(client.clone(), store.clone(), scheduler_config(0));
    let cancel = CancellationToken::new();

    let first = collector.run_pass(None, &cancel).await.unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(first.success, 2);
    assert_eq!(first.inserted, 3);
    assert_eq!(store.point_count("GME", MetricKind::BorrowFee).await, 2);

    let second = collector.run_pass(None, &cancel).await.unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 3);

    // 값이 바뀐 날짜만 갱신
    client.set_rows("GME", vec![("2024-01-01", "1.5"), ("2024-01-02", "2.25")]);
    let third = collector.run_pass(None, &cancel).await.unwrap();
    assert_eq!(third.inserted, 0);
    assert_eq!(third.updated, 1);
    assert_eq!(third.unchanged, 2);

    assert_eq!(collector.state(), PassState::Idle);
    assert!(!collector.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_symbol_failure_does_not_abort_pass() {
    let mut client = FakeBorrowClient::with_rows(&[
        ("GME", vec![("2024-01-01", "1.5")]),
        ("KOSS", vec![("2024-01-01", "3")]),
    ]);
    client.failing.insert("BB".to_string());
    let store = store_with(&["GME", "BB", "KOSS"]).await;
    let collector = collector(Arc::new(client), store.clone(), scheduler_config(0));

    let stats = collector
        .run_pass(None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.errors, 1);
    assert!(store.symbol("GME").await.unwrap().last_refreshed_at.is_some());
    assert!(store.symbol("KOSS").await.unwrap().last_refreshed_at.is_some());
    assert!(store.symbol("BB").await.unwrap().last_refreshed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_on_every_attempt_moves_to_next_symbol() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = ResiliencePolicy::new(
        "hanging",
        ResilienceConfig {
            timeout_secs: 1,
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            circuit_breaker: None,
        },
    );
    let client = Arc::new(HangingClient {
        policy,
        attempts: attempts.clone(),
    });
    let store = store_with(&["GME", "AMC"]).await;
    let collector = collector(client, store, scheduler_config(0));

    let stats = collector
        .run_pass(None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.errors, 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_is_isolated() {
    let client = Arc::new(FakeBorrowClient::with_rows(&[
        ("GME", vec![("2024-01-01", "1.5")]),
        ("AMC", vec![("2024-01-01", "10")]),
    ]));
    let symbols = store_with(&["GME", "AMC"]).await;
    let metrics = Arc::new(RejectingStore {
        inner: InMemoryStore::new(),
        reject: "AMC".to_string(),
    });
    let collector = Collector::new(
        registry_of(client),
        metrics.clone(),
        symbols.clone(),
        scheduler_config(0),
    );

    let stats = collector
        .run_pass(None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(metrics.inner.point_count("GME", MetricKind::BorrowFee).await, 1);
    assert_eq!(metrics.inner.point_count("AMC", MetricKind::BorrowFee).await, 0);
    assert!(symbols.symbol("AMC").await.unwrap().last_refreshed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_between_symbols() {
    let cancel = CancellationToken::new();
    let client = Arc::new(FakeBorrowClient {
        cancel_on_first_call: Some(cancel.clone()),
        ..FakeBorrowClient::with_rows(&[
            ("AMC", vec![("2024-01-01", "10")]),
            ("GME", vec![("2024-01-01", "1.5")]),
        ])
    });
    let store = store_with(&["GME", "AMC", "KOSS"]).await;
    let collector = collector(client.clone(), store.clone(), scheduler_config(60_000));

    let started = tokio::time::Instant::now();
    let stats = collector.run_pass(None, &cancel).await.unwrap();

    // 진행 중이던 AMC는 완료, 나머지는 처리하지 않음
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.cancelled, 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.point_count("AMC", MetricKind::BorrowFee).await, 1);
    assert_eq!(store.point_count("GME", MetricKind::BorrowFee).await, 0);
    // 심볼 간 대기도 즉시 중단
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_inter_symbol_delay_and_order() {
    let client = Arc::new(FakeBorrowClient::default());
    let store = store_with(&["TSLA", "AMC", "GME"]).await;
    let collector = collector(client, store, scheduler_config(5_000));

    let started = tokio::time::Instant::now();
    let stats = collector
        .run_pass(None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.success, 3);
    // 마지막 심볼 뒤에는 대기하지 않음
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_symbol_filter() {
    let client = Arc::new(FakeBorrowClient::with_rows(&[
        ("GME", vec![("2024-01-01", "1.5")]),
        ("AMC", vec![("2024-01-01", "10")]),
    ]));
    let store = store_with(&["GME", "AMC"]).await;
    let collector = collector(client.clone(), store.clone(), scheduler_config(0));

    let filter = vec!["gme".to_string()];
    let stats = collector
        .run_pass(Some(&filter), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 1);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.point_count("AMC", MetricKind::BorrowFee).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_symbol_store_is_seeded_before_pass() {
    let client = Arc::new(FakeBorrowClient::default());
    let store = Arc::new(InMemoryStore::new());
    let collector = collector(client.clone(), store.clone(), scheduler_config(0));

    let stats = collector
        .run_pass(None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total, 5);
    assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    assert_eq!(store.tracked_symbols().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_overlapping_pass_is_rejected() {
    let gate = Arc::new(Notify::new());
    let client = Arc::new(FakeBorrowClient {
        gate: Some(gate.clone()),
        ..FakeBorrowClient::with_rows(&[("GME", vec![("2024-01-01", "1.5")])])
    });
    let store = store_with(&["GME"]).await;
    let collector = collector(client, store, scheduler_config(0));
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(collector.run_pass(None, &cancel), async {
        while !collector.is_running() {
            tokio::task::yield_now().await;
        }
        // 첫 패스가 공급자 응답을 기다리는 중
        assert_eq!(collector.state(), PassState::Fetching("GME".to_string()));

        let result = collector.run_pass(None, &cancel).await;
        gate.notify_one();
        result
    });

    assert_eq!(first.unwrap().success, 1);
    assert!(matches!(second, Err(CollectorError::PassInProgress)));
    assert!(!collector.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_daemon_stops_on_cancel() {
    let client = Arc::new(FakeBorrowClient::default());
    let store = store_with(&["GME"]).await;
    let collector = Arc::new(collector(client.clone(), store, scheduler_config(0)));
    let cancel = CancellationToken::new();

    let handle = {
        let collector = collector.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { collector.run_daemon(cancel).await })
    };

    // 첫 주기는 즉시 실행, 이후 60분마다
    tokio::time::sleep(Duration::from_secs(60 * 60 + 1)).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert!(!collector.is_running());
}
