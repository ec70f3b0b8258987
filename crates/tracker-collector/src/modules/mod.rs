//! 데이터 수집 모듈.

pub mod metric_sync;
pub mod providers;
pub mod symbol_seed;

pub use metric_sync::sync_metric;
pub use providers::build_registry;
pub use symbol_seed::{ensure_symbols, seed_default_symbols};
