//! 수집 파이프라인의 핵심 타입.
//!
//! - `metric` - 지표 종류와 정규화된 시계열 포인트
//! - `symbol` - 추적 심볼
//! - `range` - 조회 날짜 범위
//! - `snapshot` - 저장 스냅샷과 변경 집합

pub mod metric;
pub mod range;
pub mod snapshot;
pub mod symbol;

pub use metric::*;
pub use range::*;
pub use snapshot::*;
pub use symbol::*;
