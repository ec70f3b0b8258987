//! 추적 심볼 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 심볼 문자열 정규화 (공백 제거, 대문자 변환).
///
/// 영문/숫자와 `.`, `-`만 허용합니다 (예: `BRK.B`, `BF-B`).
pub fn normalize_symbol(raw: &str) -> CoreResult<String> {
    let symbol = raw.trim().to_uppercase();

    if symbol.is_empty()
        || !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(CoreError::InvalidSymbol(raw.to_string()));
    }

    Ok(symbol)
}

/// 수집 대상 심볼.
///
/// 한 번 생성되면 코어에서 삭제하지 않으며, 심볼별 수집 패스가 성공할 때마다
/// `last_refreshed_at`이 갱신됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSymbol {
    /// 정규화된 심볼 (예: GME)
    pub symbol: String,
    /// 거래소 (예: NYSE)
    pub exchange: String,
    /// 표시 이름
    pub display_name: String,
    /// 마지막 성공 수집 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl TrackedSymbol {
    /// 새 추적 심볼을 생성합니다.
    pub fn new(
        symbol: &str,
        exchange: impl Into<String>,
        display_name: impl Into<String>,
    ) -> CoreResult<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            exchange: exchange.into(),
            display_name: display_name.into(),
            last_refreshed_at: None,
        })
    }
}

/// 추적 심볼이 비어 있을 때 사용하는 기본 시드 목록 (심볼, 거래소, 이름).
pub const DEFAULT_SEED_SYMBOLS: &[(&str, &str, &str)] = &[
    ("GME", "NYSE", "GameStop Corp."),
    ("AMC", "NYSE", "AMC Entertainment Holdings, Inc."),
    ("KOSS", "NASDAQ", "Koss Corporation"),
    ("BB", "NYSE", "BlackBerry Limited"),
    ("TSLA", "NASDAQ", "Tesla, Inc."),
];

/// 기본 시드 목록을 `TrackedSymbol`로 변환합니다.
pub fn default_seed_symbols() -> Vec<TrackedSymbol> {
    DEFAULT_SEED_SYMBOLS
        .iter()
        .map(|(symbol, exchange, name)| TrackedSymbol {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            display_name: name.to_string(),
            last_refreshed_at: None,
        })
        .collect()
}
