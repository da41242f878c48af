//! 알림 관리자.
//!
//! 봇 코어에 `bool` 결과 계약을 제공합니다. 전송 실패는 로그로만 남기고
//! 호출자에게 전파하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info};

use sentinel_core::SignalKind;

use crate::types::{
    Notification, NotificationEvent, NotificationResult, NotificationSender, NotifierStats,
};

/// 단일 전송기를 감싸는 알림 관리자.
#[derive(Clone)]
pub struct NotificationManager {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationManager {
    /// 새 알림 관리자를 생성합니다.
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    /// 전송기 자격 증명을 확인합니다.
    pub async fn verify(&self) -> NotificationResult<()> {
        self.sender.verify().await
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_enabled()
    }

    pub fn stats(&self) -> NotifierStats {
        self.sender.stats()
    }

    async fn dispatch(&self, notification: Notification) -> bool {
        if !self.sender.is_enabled() {
            debug!(event = notification.event.label(), "Notifications disabled, skipping");
            return false;
        }

        match self.sender.send(&notification).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    sender = self.sender.name(),
                    event = notification.event.label(),
                    error = %e,
                    "Failed to send notification"
                );
                false
            }
        }
    }

    /// 시작 알림을 전송합니다.
    pub async fn notify_startup(
        &self,
        symbol: &str,
        buy_level: Decimal,
        sell_level: Decimal,
        endpoint: &str,
    ) -> bool {
        self.dispatch(Notification::new(NotificationEvent::Startup {
            symbol: symbol.to_string(),
            buy_level,
            sell_level,
            endpoint: endpoint.to_string(),
        }))
        .await
    }

    /// 매매 신호 알림을 전송합니다.
    pub async fn notify_signal(&self, symbol: &str, kind: SignalKind, price: Decimal) -> bool {
        self.dispatch(Notification::new(NotificationEvent::Signal {
            symbol: symbol.to_string(),
            kind,
            price,
        }))
        .await
    }

    /// 종료 알림을 동기 경로로 전송합니다.
    ///
    /// async 런타임이 종료 중이어도 동작하도록 blocking 전송을 사용합니다.
    pub fn notify_shutdown(
        &self,
        uptime: Duration,
        reconnect_count: u64,
        total_signals: u64,
        last_signal: Option<SignalKind>,
    ) -> bool {
        if !self.sender.is_enabled() {
            debug!("Notifications disabled, skipping shutdown notice");
            return false;
        }

        let notification = Notification::new(NotificationEvent::Shutdown {
            uptime,
            reconnect_count,
            total_signals,
            last_signal,
        });

        match self.sender.send_blocking(&notification) {
            Ok(()) => {
                info!("Shutdown notification sent");
                true
            }
            Err(e) => {
                error!(sender = self.sender.name(), error = %e, "Failed to send shutdown notification");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        fail: bool,
        sent: Mutex<Vec<(NotificationEvent, bool)>>,
    }

    impl RecordingSender {
        fn outcome(&self, notification: &Notification, blocking: bool) -> NotificationResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((notification.event.clone(), blocking));
            if self.fail {
                Err(NotificationError::SendFailed("HTTP 500".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: &Notification) -> NotificationResult<()> {
            self.outcome(notification, false)
        }

        fn send_blocking(&self, notification: &Notification) -> NotificationResult<()> {
            self.outcome(notification, true)
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn stats(&self) -> NotifierStats {
            NotifierStats {
                name: "recording".to_string(),
                enabled: true,
                messages_sent: 0,
                messages_failed: 0,
                success_rate: 0.0,
                last_message_at: None,
                api_url: String::new(),
            }
        }
    }

    #[tokio::test]
    async fn test_bool_contract() {
        let sender = Arc::new(RecordingSender::default());
        let manager = NotificationManager::new(sender.clone());

        assert!(
            manager
                .notify_startup("BTCUSDT", dec!(27000), dec!(26000), "wss://example.test")
                .await
        );
        assert!(manager.notify_signal("BTCUSDT", SignalKind::Sell, dec!(25900)).await);
        assert!(manager.notify_shutdown(Duration::from_secs(5), 1, 1, Some(SignalKind::Sell)));

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0.label(), "startup");
        assert!(!sent[1].1);
        // 종료 알림은 항상 blocking 경로
        assert_eq!(sent[2].0.label(), "shutdown");
        assert!(sent[2].1);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let manager = NotificationManager::new(sender);

        assert!(!manager.notify_signal("BTCUSDT", SignalKind::Buy, dec!(27050)).await);
        assert!(!manager.notify_shutdown(Duration::ZERO, 0, 0, None));
    }
}
