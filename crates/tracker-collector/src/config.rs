//! 환경변수 기반 설정 모듈.
//!
//! # 환경변수
//!
//! | 키 | 기본값 | 설명 |
//! |----|--------|------|
//! | `DATABASE_URL` | - | PostgreSQL 연결 문자열 (dry-run이 아니면 필수) |
//! | `DATABASE_MAX_CONNECTIONS` | 5 | 연결 풀 크기 |
//! | `SCHEDULER_INTERVAL_MINUTES` | 60 | 데몬 패스 주기 (1분 ~ 1년) |
//! | `SCHEDULER_SYMBOL_DELAY_MS` | 5000 | 심볼 간 대기 |
//! | `SCHEDULER_LOOKBACK_DAYS` | 없음 | 조회 기간 (없으면 전체 이력) |
//! | `SCHEDULER_METRICS` | 전체 | 수집 지표 (쉼표 구분, 예: `borrow_fee,short_volume`) |
//!
//! 공급자별 (`BORROW_DESK`, `SHORT_DATA`, `SEC_FTD`, `YAHOO`):
//! `{PREFIX}_BASE_URL`, `{PREFIX}_ENABLED`, `{PREFIX}_TIMEOUT_SECS` (120),
//! `{PREFIX}_MAX_ATTEMPTS` (5), `{PREFIX}_BASE_DELAY_MS` (1000), `{PREFIX}_MAX_DELAY_MS` (30000),
//! `{PREFIX}_BREAKER_ENABLED` (false), `{PREFIX}_BREAKER_THRESHOLD` (3),
//! `{PREFIX}_BREAKER_COOLDOWN_SECS` (10), `{PREFIX}_MAX_PAGES` (50).
//!
//! 기본 URL이 없는 공급자는 `{PREFIX}_BASE_URL`을 지정해야 활성화됩니다.

use crate::error::CollectorError;
use crate::Result;
use chrono::{Days, NaiveDate};
use std::time::Duration;
use tracker_core::{DateRange, MetricKind};
use tracker_data::{CircuitBreakerConfig, ProviderConfig, ResilienceConfig};

const BORROW_DESK_URL: &str = "https://iborrowdesk.com";
const YAHOO_URL: &str = "https://query1.finance.yahoo.com";

/// 패스 주기 상한 (1년)
const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: Option<String>,
    /// 연결 풀 크기
    pub database_max_connections: u32,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 공급자 설정
    pub providers: ProvidersConfig,
}

/// 스케줄러 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// 패스 실행 주기 (분 단위)
    pub interval_minutes: u64,
    /// 심볼 간 대기 (밀리초)
    pub symbol_delay_ms: u64,
    /// 조회 기간 (일). None이면 전체 이력
    pub lookback_days: Option<u64>,
    /// 수집 지표
    pub metrics: Vec<MetricKind>,
}

/// 공급자별 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidersConfig {
    pub borrow_desk: ProviderConfig,
    pub short_data: ProviderConfig,
    pub sec_ftd: ProviderConfig,
    pub yahoo: ProviderConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            symbol_delay_ms: 5_000,
            lookback_days: None,
            metrics: MetricKind::all().to_vec(),
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 소스에서 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let metrics = match env.get("SCHEDULER_METRICS") {
            Some(list) => parse_metrics(&list)?,
            None => MetricKind::all().to_vec(),
        };

        Ok(Self {
            database_url: env.get("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 5),
            scheduler: SchedulerConfig {
                interval_minutes: env.parse("SCHEDULER_INTERVAL_MINUTES", 60),
                symbol_delay_ms: env.parse("SCHEDULER_SYMBOL_DELAY_MS", 5_000),
                lookback_days: env.get("SCHEDULER_LOOKBACK_DAYS").and_then(|v| v.parse().ok()),
                metrics,
            },
            providers: ProvidersConfig {
                borrow_desk: env.provider("BORROW_DESK", Some(BORROW_DESK_URL)),
                short_data: env.provider("SHORT_DATA", None),
                sec_ftd: env.provider("SEC_FTD", None),
                yahoo: env.provider("YAHOO", Some(YAHOO_URL)),
            },
        })
    }

    /// DB 연결 문자열 (없으면 설정 에러)
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }
}

impl SchedulerConfig {
    /// 패스 실행 주기를 Duration으로 반환 (1분 ~ 1년)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60)
    }

    /// 심볼 간 대기를 Duration으로 반환
    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }

    /// 기준일에 대한 조회 범위
    pub fn date_range(&self, today: NaiveDate) -> DateRange {
        match self
            .lookback_days
            .and_then(|days| today.checked_sub_days(Days::new(days)))
        {
            Some(start) => DateRange::since(start),
            None => DateRange::full(),
        }
    }
}

/// 쉼표로 구분된 지표 목록 파싱
fn parse_metrics(list: &str) -> Result<Vec<MetricKind>> {
    let mut metrics = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: MetricKind = item.parse()?;
        if !metrics.contains(&kind) {
            metrics.push(kind);
        }
    }

    if metrics.is_empty() {
        return Err(CollectorError::Config(
            "SCHEDULER_METRICS에 지표가 없습니다".to_string(),
        ));
    }
    Ok(metrics)
}

/// 키-값 조회 래퍼
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// 값을 파싱 (실패 시 기본값 사용)
    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// bool 값 파싱
    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    }

    fn provider(&self, prefix: &str, default_url: Option<&str>) -> ProviderConfig {
        let key = |name: &str| format!("{}_{}", prefix, name);

        let base_url = self
            .get(&key("BASE_URL"))
            .filter(|v| !v.trim().is_empty())
            .or_else(|| default_url.map(str::to_string));

        let breaker = self.bool(&key("BREAKER_ENABLED"), false).then(|| {
            CircuitBreakerConfig::new(
                self.parse(&key("BREAKER_THRESHOLD"), 3),
                Duration::from_secs(self.parse(&key("BREAKER_COOLDOWN_SECS"), 10)),
            )
        });

        let resilience = ResilienceConfig {
            timeout_secs: self.parse(&key("TIMEOUT_SECS"), 120),
            max_attempts: self.parse(&key("MAX_ATTEMPTS"), 5),
            base_delay_ms: self.parse(&key("BASE_DELAY_MS"), 1_000),
            max_delay_ms: self.parse(&key("MAX_DELAY_MS"), 30_000),
            circuit_breaker: breaker,
        };

        let mut config = ProviderConfig::new(base_url.clone().unwrap_or_default())
            .with_resilience(resilience);
        config.enabled = base_url.is_some() && self.bool(&key("ENABLED"), true);
        config.max_pages = self.parse(&key("MAX_PAGES"), 50);
        config
    }
}
