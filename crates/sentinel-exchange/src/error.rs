//! 시세 피드 에러 타입.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// 피드 연결 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// WebSocket 프로토콜 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 타임아웃 (연결, ping 응답)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 구독 거부
    #[error("Subscription rejected: {0}")]
    Subscription(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 피드 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    /// 재연결로 회복 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::WebSocket(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::Subscription(_)
        )
    }

    /// 세션을 유지한 채 무시할 수 있는 디코딩 에러인지 확인.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, ExchangeError::ParseError(_))
    }
}

impl From<tungstenite::Error> for ExchangeError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                ExchangeError::Disconnected(err.to_string())
            }
            tungstenite::Error::Io(e) => ExchangeError::NetworkError(e.to_string()),
            other => ExchangeError::WebSocket(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExchangeError::Timeout("pong".into()).is_retryable());
        assert!(ExchangeError::Disconnected("eof".into()).is_retryable());
        assert!(!ExchangeError::ParseError("bad json".into()).is_retryable());
        assert!(ExchangeError::ParseError("bad json".into()).is_decode_error());
    }

    #[test]
    fn test_from_tungstenite() {
        let err: ExchangeError = tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, ExchangeError::Disconnected(_)));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: ExchangeError = tungstenite::Error::Io(io).into();
        assert!(matches!(err, ExchangeError::NetworkError(_)));
    }
}
