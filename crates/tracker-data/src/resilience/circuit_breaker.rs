//! Circuit Breaker pattern implementation.
//!
//! 공급자 장애 시 연속된 일시적 실패가 임계치에 도달하면 호출을 즉시 차단하고,
//! 대기 시간이 지나면 단일 탐색 호출로 복구 여부를 확인합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Closed ──[연속 실패 임계치 도달]──> Open
//!    ↑                                │
//!    │                       [cooldown 경과]
//!    │                                ↓
//!    └──[성공]── HalfOpen ──[실패]──> Open
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Circuit Breaker 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 정상 상태 - 모든 요청 허용
    Closed,
    /// 장애 상태 - 모든 요청 즉시 거부
    Open,
    /// 복구 테스트 상태 - 탐색 요청 하나만 허용
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit Breaker 설정.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// 연속 실패 임계치
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Open 상태 유지 시간 (밀리초, 이후 HalfOpen으로 전이)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// HalfOpen에서 Closed로 전이하기 위한 연속 성공 횟수
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_cooldown_ms() -> u64 {
    10_000
}
fn default_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl CircuitBreakerConfig {
    /// 새 설정 생성.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown_ms: cooldown.as_millis() as u64,
            success_threshold: default_success_threshold(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_state_change: Instant,
    /// HalfOpen에서 진행 중인 탐색 요청의 시작 시각
    probe_started: Option<Instant>,
}

/// Circuit Breaker.
///
/// 공급자 클라이언트 하나가 하나의 breaker를 소유하며, 차단 범위도 그 클라이언트입니다.
pub struct CircuitBreaker {
    /// 서비스 이름 (로깅용)
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitBreakerState>,
    /// Circuit Open 횟수
    open_count: AtomicU64,
}

impl CircuitBreaker {
    /// 새 Circuit Breaker 생성.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_state_change: Instant::now(),
                probe_started: None,
            }),
            open_count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 현재 상태 반환.
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.maybe_transition_from_open(&mut state);
        state.state
    }

    /// Circuit이 Open으로 전이한 누적 횟수.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    /// 요청이 허용되는지 확인.
    ///
    /// HalfOpen 상태에서는 탐색 요청 하나만 허용하며, 허용된 호출자는 결과를
    /// `record_success`/`record_failure`/`release_probe` 중 하나로 반드시 보고해야 합니다.
    /// 보고 없이 cooldown이 지난 탐색은 만료된 것으로 보고 다음 요청을 허용합니다.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();

        // Open 상태에서 cooldown이 경과했으면 HalfOpen으로 전이
        self.maybe_transition_from_open(&mut state);

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => match state.probe_started {
                Some(started) if started.elapsed() < self.config.cooldown() => false,
                _ => {
                    state.probe_started = Some(Instant::now());
                    true
                }
            },
        }
    }

    /// 건강 상태와 무관한 결과(취소, API 오류 등)로 끝난 탐색 요청 반납.
    pub fn release_probe(&self) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.probe_started = None;
        }
    }

    /// 성공 기록.
    ///
    /// HalfOpen 상태에서 성공하면 Closed로 전이합니다.
    pub fn record_success(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                state.probe_started = None;
                if state.success_count >= self.config.success_threshold {
                    self.transition_to(&mut state, CircuitState::Closed);
                    tracing::info!(
                        circuit_breaker = %self.name,
                        "Circuit breaker reset: HalfOpen -> Closed"
                    );
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// 일시적 실패 기록.
    ///
    /// 연속 실패가 임계치에 도달하면 Open 상태로 전이합니다.
    pub fn record_failure(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    self.transition_to(&mut state, CircuitState::Open);
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        circuit_breaker = %self.name,
                        failure_count = state.failure_count,
                        cooldown_ms = self.config.cooldown_ms,
                        "Circuit breaker tripped: Closed -> Open"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // 복구 테스트 실패
                self.transition_to(&mut state, CircuitState::Open);
                self.open_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    circuit_breaker = %self.name,
                    "Circuit breaker probe failed: HalfOpen -> Open"
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Open 상태에서 cooldown이 경과했으면 HalfOpen으로 전이.
    fn maybe_transition_from_open(&self, state: &mut CircuitBreakerState) {
        if state.state == CircuitState::Open
            && state.last_state_change.elapsed() >= self.config.cooldown()
        {
            self.transition_to(state, CircuitState::HalfOpen);
            tracing::info!(
                circuit_breaker = %self.name,
                "Circuit breaker cooldown elapsed: Open -> HalfOpen"
            );
        }
    }

    fn transition_to(&self, state: &mut CircuitBreakerState, new_state: CircuitState) {
        state.state = new_state;
        state.last_state_change = Instant::now();
        state.probe_started = None;

        match new_state {
            CircuitState::Closed => {
                state.failure_count = 0;
                state.success_count = 0;
            }
            CircuitState::HalfOpen => state.success_count = 0,
            CircuitState::Open => {}
        }
    }
}
