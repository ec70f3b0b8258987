//! 외부 호출 복원력 정책.
//!
//! 모든 공급자 호출은 다음 순서의 파이프라인을 거칩니다:
//!
//! ```text
//! retry (바깥) → circuit breaker → timeout (안쪽) → 실제 호출
//! ```
//!
//! 따라서 하나의 논리적 호출이 여러 번 재시도될 수 있으며, 각 시도는 독립적으로
//! 시간 제한을 받고 breaker 상태의 영향을 받습니다.
//!
//! - **Timeout**: 시도당 제한 시간 (기본 2분). 초과 시 경고 로그 후 재시도 대상
//! - **Retry**: 일시적 실패만 재시도. decorrelated jitter 백오프 (기본 1초, 최대 5회 시도)
//! - **Circuit breaker**: 선택 사항 (기본 비활성). 연속 실패 3회 시 10초간 차단

pub mod backoff;
pub mod circuit_breaker;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DataError, Result};
pub use backoff::DecorrelatedJitter;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Resilience Policy 설정.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// 시도당 제한 시간 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 백오프 시작 지연 (밀리초)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// 백오프 최대 지연 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Circuit breaker 설정 (None이면 비활성)
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            circuit_breaker: None,
        }
    }
}

impl ResilienceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Circuit breaker 활성화.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }
}

/// 단일 외부 호출을 timeout/breaker/retry로 감싸는 정책.
///
/// 정책 자체는 호출 간 상태를 갖지 않으며, breaker가 활성화된 경우에만
/// 이 정책 인스턴스 범위의 breaker 상태가 유지됩니다.
pub struct ResiliencePolicy {
    name: String,
    config: ResilienceConfig,
    breaker: Option<CircuitBreaker>,
    cancel: CancellationToken,
}

impl ResiliencePolicy {
    pub fn new(name: impl Into<String>, config: ResilienceConfig) -> Self {
        let name = name.into();
        let breaker = config
            .circuit_breaker
            .clone()
            .map(|cb| CircuitBreaker::new(name.clone(), cb));

        Self {
            name,
            config,
            breaker,
            cancel: CancellationToken::new(),
        }
    }

    /// 외부 종료 신호 연결. 취소 시 진행 중인 시도와 백오프 대기가 즉시 중단됩니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Breaker 상태 (비활성이면 None).
    pub fn breaker_state(&self) -> Option<CircuitState> {
        self.breaker.as_ref().map(|b| b.state())
    }

    /// 정책을 적용하여 호출을 실행합니다.
    ///
    /// `operation`은 시도마다 새 future를 만들어야 합니다. 재시도가 소진되면
    /// 마지막 실패를 그대로 반환합니다.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = DecorrelatedJitter::new(self.config.base_delay(), self.config.max_delay());
        let mut attempt = 1;

        loop {
            match self.attempt(operation()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(policy = %self.name, attempt, "재시도 후 성공");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        policy = %self.name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "일시적 실패, 재시도 예정"
                    );

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(DataError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            policy = %self.name,
                            attempts = attempt,
                            error = %e,
                            "재시도 소진"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// 단일 시도: breaker 확인 → timeout 적용 → 결과 기록.
    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if let Some(breaker) = &self.breaker {
            if !breaker.is_allowed() {
                return Err(DataError::BreakerOpen {
                    name: breaker.name().to_string(),
                });
            }
        }

        let timeout = self.config.timeout();
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DataError::Cancelled),
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        policy = %self.name,
                        timeout_secs = timeout.as_secs(),
                        "요청 타임아웃"
                    );
                    Err(DataError::Timeout(format!("{}s 초과", timeout.as_secs())))
                }
            },
        };

        if let Some(breaker) = &self.breaker {
            match &outcome {
                Ok(_) => breaker.record_success(),
                Err(e) if e.is_transient() => breaker.record_failure(),
                Err(_) => breaker.release_probe(),
            }
        }

        outcome
    }
}
