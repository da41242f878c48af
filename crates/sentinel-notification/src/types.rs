//! 알림 타입 및 trait 정의.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sentinel_core::SignalKind;

/// 알림 이벤트 타입.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// 봇 시작 (첫 구독 성공 시 1회)
    Startup {
        symbol: String,
        buy_level: Decimal,
        sell_level: Decimal,
        endpoint: String,
    },
    /// 매매 신호
    Signal {
        symbol: String,
        kind: SignalKind,
        price: Decimal,
    },
    /// 봇 종료
    Shutdown {
        uptime: Duration,
        reconnect_count: u64,
        total_signals: u64,
        last_signal: Option<SignalKind>,
    },
}

impl NotificationEvent {
    /// 로그용 이벤트 이름.
    pub fn label(&self) -> &'static str {
        match self {
            NotificationEvent::Startup { .. } => "startup",
            NotificationEvent::Signal { .. } => "signal",
            NotificationEvent::Shutdown { .. } => "shutdown",
        }
    }
}

/// 알림 메시지.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 고유 알림 ID
    pub id: String,
    /// 알림 이벤트
    pub event: NotificationEvent,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// 새 알림을 생성합니다.
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            timestamp: Utc::now(),
        }
    }
}

/// 알림 작업용 Result 타입.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// 알림 에러.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("인증 실패: {0}")]
    Unauthorized(String),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl NotificationError {
    /// 같은 요청을 다시 시도할 가치가 있는지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotificationError::SendFailed(_)
                | NotificationError::RateLimited(_)
                | NotificationError::NetworkError(_)
        )
    }

    /// 서버가 요청한 재시도 대기 시간 (429 응답의 `retry_after`).
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            NotificationError::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// 시작 단계에서 프로세스를 종료시켜야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NotificationError::Unauthorized(_) | NotificationError::InvalidConfig(_)
        )
    }
}

/// 전송기 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierStats {
    pub name: String,
    pub enabled: bool,
    pub messages_sent: u64,
    pub messages_failed: u64,
    /// 성공률 (%)
    pub success_rate: f64,
    pub last_message_at: Option<DateTime<Utc>>,
    /// 토큰이 가려진 API URL
    pub api_url: String,
}

impl NotifierStats {
    /// 전송/실패 수로 성공률을 계산합니다.
    pub fn success_rate(sent: u64, failed: u64) -> f64 {
        let total = sent + failed;
        if total == 0 {
            0.0
        } else {
            sent as f64 / total as f64 * 100.0
        }
    }
}

/// 알림 전송기 trait.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 알림을 전송합니다.
    async fn send(&self, notification: &Notification) -> NotificationResult<()>;

    /// async 런타임에 의존하지 않고 알림을 전송합니다 (종료 경로용).
    fn send_blocking(&self, notification: &Notification) -> NotificationResult<()>;

    /// 자격 증명을 확인합니다.
    async fn verify(&self) -> NotificationResult<()> {
        Ok(())
    }

    /// 전송기가 활성화되어 있는지 확인합니다.
    fn is_enabled(&self) -> bool;

    /// 전송기 이름을 반환합니다.
    fn name(&self) -> &str;

    /// 전송 통계를 반환합니다.
    fn stats(&self) -> NotifierStats;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::new(NotificationEvent::Signal {
            symbol: "BTCUSDT".to_string(),
            kind: SignalKind::Buy,
            price: dec!(27050),
        });

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["event"]["type"], "signal");
        assert_eq!(json["event"]["kind"], "BUY");
        assert!(json["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(notification.event.label(), "signal");
    }

    #[test]
    fn test_error_classification() {
        assert!(NotificationError::RateLimited(3).is_retryable());
        assert!(NotificationError::SendFailed("HTTP 500".into()).is_retryable());
        assert!(!NotificationError::Unauthorized("bad token".into()).is_retryable());
        assert!(NotificationError::Unauthorized("bad token".into()).is_fatal());
        assert_eq!(
            NotificationError::RateLimited(3).retry_after(),
            Some(Duration::from_secs(3))
        );
        assert_eq!(NotificationError::SendFailed("HTTP 500".into()).retry_after(), None);
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(NotifierStats::success_rate(0, 0), 0.0);
        assert_eq!(NotifierStats::success_rate(3, 1), 75.0);
    }
}
