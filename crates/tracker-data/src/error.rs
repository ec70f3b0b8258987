//! 데이터 모듈 오류 타입.
//!
//! | 분류 | 재시도 | 범위 |
//! |------|--------|------|
//! | Network / Http(408·429·5xx) / Timeout | O | 해당 호출 |
//! | Api | X | 심볼·지표 수집 전체 |
//! | Parse | X | 심볼·지표 수집 전체 |
//! | Validation | X | 포인트 단위 (나머지는 계속 처리) |
//! | Persistence | X | 심볼·지표 수집 전체, 다음 패스에서 자연 재시도 |

use thiserror::Error;
use tracker_core::CoreError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 네트워크/연결 오류
    #[error("Network error: {0}")]
    Network(String),

    /// 일시적 HTTP 상태 (408, 429, 5xx)
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 외부 종료 신호에 의한 취소
    #[error("Operation cancelled")]
    Cancelled,

    /// Circuit breaker가 열려 있어 호출이 차단됨
    #[error("Circuit breaker '{name}' is open")]
    BreakerOpen { name: String },

    /// 공급자가 실패 상태를 보고함
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// 응답 본문 형식 불일치
    #[error("Parse error: {0}")]
    Parse(String),

    /// 필드 단위 검증 실패
    #[error("Validation error: {0}")]
    Validation(String),

    /// 저장소 오류
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// 잘못된 호출 인자
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DataError {
    /// Resilience Policy가 재시도해야 하는 일시적 오류인지 확인.
    ///
    /// 사용자 취소와 breaker 차단은 재시도하지 않습니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::Network(_) | DataError::Http { .. } | DataError::Timeout(_)
        )
    }

    /// HTTP 상태 코드가 일시적 실패인지 확인.
    pub fn is_transient_status(status: u16) -> bool {
        status == 408 || status == 429 || (500..600).contains(&status)
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else if err.is_decode() {
            DataError::Parse(err.to_string())
        } else {
            DataError::Network(err.to_string())
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::Persistence(format!("duplicate key: {}", db_err.message()))
                } else {
                    DataError::Persistence(db_err.message().to_string())
                }
            }
            _ => DataError::Persistence(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        DataError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DataError::Network("reset".into()).is_transient());
        assert!(DataError::Timeout("2m".into()).is_transient());
        assert!(DataError::Http {
            status: 503,
            url: "x".into()
        }
        .is_transient());

        assert!(!DataError::Cancelled.is_transient());
        assert!(!DataError::BreakerOpen { name: "x".into() }.is_transient());
        assert!(!DataError::Parse("bad".into()).is_transient());
        assert!(!DataError::Api {
            provider: "x".into(),
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn test_transient_status() {
        assert!(DataError::is_transient_status(408));
        assert!(DataError::is_transient_status(429));
        assert!(DataError::is_transient_status(502));
        assert!(!DataError::is_transient_status(404));
        assert!(!DataError::is_transient_status(400));
    }
}
