//! 봇 에러 타입.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentinel_core::SentinelError;
use sentinel_exchange::ExchangeError;
use sentinel_notification::NotificationError;

/// 오케스트레이터 에러.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("초기화 실패: {0}")]
    Core(#[from] SentinelError),

    #[error("시세 피드 에러: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("알림 에러: {0}")]
    Notification(#[from] NotificationError),
}

/// 봇 작업용 Result 타입.
pub type BotResult<T> = Result<T, BotError>;

/// HTTP 에러 응답.
///
/// ```json
/// { "error": "Not Found", "status_code": 404 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            status_code: status.as_u16(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_body() {
        let body = serde_json::to_value(ErrorResponse::new(StatusCode::NOT_FOUND)).unwrap();
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["status_code"], 404);
    }

    #[test]
    fn test_bot_error_conversion() {
        let err: BotError = NotificationError::Unauthorized("bad token".to_string()).into();
        assert!(matches!(err, BotError::Notification(_)));
        assert!(err.to_string().contains("bad token"));
    }
}
