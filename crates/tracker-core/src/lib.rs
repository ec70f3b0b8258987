//! # Tracker Core
//!
//! 공매도 관련 시계열 데이터 수집기의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 수집 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 지표 종류 및 정규화된 시계열 포인트
//! - 추적 심볼 및 기본 시드 목록
//! - 저장 스냅샷과 변경 집합 (reconcile 입출력)
//! - 로깅 인프라

pub mod error;
pub mod logging;
pub mod types;

pub use error::*;
pub use logging::*;
pub use types::*;
