//! 시세 감시 시스템의 에러 타입.
//!
//! 전략, 설정, 이벤트 처리에서 공통으로 사용하는 에러를 정의합니다.
//! 거래소 전송 계층과 알림 전송 계층은 각 크레이트에서 자체 에러 타입을 가집니다.

use rust_decimal::Decimal;
use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// 유효하지 않은 가격 (음수 등)
    #[error("유효하지 않은 가격: {0}")]
    InvalidPrice(Decimal),

    /// 설정 에러 (필수 값 누락, 잘못된 레벨 등)
    #[error("설정 에러: {0}")]
    InvalidConfiguration(String),

    /// 이벤트 핸들러 에러
    #[error("이벤트 처리 에러: {0}")]
    Handler(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type SentinelResult<T> = Result<T, SentinelError>;

impl SentinelError {
    /// 호출자가 기록 후 계속 진행할 수 있는 에러인지 확인합니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SentinelError::InvalidPrice(_)
                | SentinelError::Handler(_)
                | SentinelError::Serialization(_)
        )
    }

    /// 시작 단계에서 프로세스를 종료시켜야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SentinelError::InvalidConfiguration(_))
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SentinelError {
    fn from(err: config::ConfigError) -> Self {
        SentinelError::InvalidConfiguration(err.to_string())
    }
}
