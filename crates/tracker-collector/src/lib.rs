//! Short-data collector.
//!
//! 이 crate는 추적 심볼의 공매도 관련 지표를 주기적으로 수집하는 바이너리를 제공합니다:
//! - 추적 심볼 시드 (비어 있을 때 기본 목록)
//! - 심볼별 지표 수집 패스 (fetch → normalize → reconcile → 저장)
//! - 데몬 모드 (주기 실행, 종료 신호 처리)

pub mod config;
pub mod error;
pub mod modules;
pub mod scheduler;
pub mod stats;

pub use config::{CollectorConfig, ProvidersConfig, SchedulerConfig};
pub use error::{CollectorError, Result};
pub use scheduler::{Collector, PassState};
pub use stats::{CollectionStats, SyncOutcome};
