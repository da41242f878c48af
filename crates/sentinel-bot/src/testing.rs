//! 테스트용 mock 피드와 알림 전송기.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use sentinel_core::{AppConfig, EventBus};
use sentinel_exchange::{ConnectorPhase, ConnectorStats, ExchangeResult, PriceFeed};
use sentinel_notification::{
    Notification, NotificationError, NotificationEvent, NotificationManager, NotificationResult,
    NotificationSender, NotifierStats,
};
use sentinel_strategy::LevelStrategy;

use crate::app::SentinelBot;

/// 호출 횟수를 기록하는 시세 피드.
#[derive(Default)]
pub struct MockFeed {
    pub healthy: AtomicBool,
    /// 구독 상태에서 응답이 끊긴 것으로 보고
    pub stale: AtomicBool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    running: AtomicBool,
}

impl MockFeed {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            ..Default::default()
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> ExchangeResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> ExchangeResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn stats(&self) -> ConnectorStats {
        let running = self.running.load(Ordering::SeqCst);
        let healthy = self.is_healthy();
        let stale = running && self.stale.load(Ordering::SeqCst);
        ConnectorStats {
            name: "mock".to_string(),
            symbol: "BTCUSDT".to_string(),
            endpoint: "ws://mock".to_string(),
            phase: if healthy || stale {
                ConnectorPhase::Subscribed
            } else if running {
                ConnectorPhase::Degraded
            } else {
                ConnectorPhase::Disconnected
            },
            running,
            healthy,
            stale,
            consecutive_failures: 0,
            reconnect_count: 2,
            total_messages: 0,
            decode_errors: 0,
            last_price: None,
            last_message_at: None,
            last_error: None,
        }
    }
}

/// 전송된 알림을 기록하는 전송기.
#[derive(Default)]
pub struct MockSender {
    /// `verify`가 `Unauthorized`를 반환하도록 설정
    pub reject_credentials: bool,
    /// (이벤트, blocking 경로 여부)
    sent: Mutex<Vec<(NotificationEvent, bool)>>,
}

impl MockSender {
    pub fn rejecting() -> Self {
        Self {
            reject_credentials: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(NotificationEvent, bool)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(event, _)| event.label() == label)
            .count()
    }

    fn record(&self, notification: &Notification, blocking: bool) -> NotificationResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((notification.event.clone(), blocking));
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        self.record(notification, false)
    }

    fn send_blocking(&self, notification: &Notification) -> NotificationResult<()> {
        self.record(notification, true)
    }

    async fn verify(&self) -> NotificationResult<()> {
        if self.reject_credentials {
            Err(NotificationError::Unauthorized("invalid token".to_string()))
        } else {
            Ok(())
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn stats(&self) -> NotifierStats {
        let sent = self.sent().len() as u64;
        NotifierStats {
            name: "mock".to_string(),
            enabled: true,
            messages_sent: sent,
            messages_failed: 0,
            success_rate: NotifierStats::success_rate(sent, 0),
            last_message_at: None,
            api_url: "mock://telegram".to_string(),
        }
    }
}

/// mock 구성 요소로 봇을 생성합니다.
pub fn test_bot(
    config: AppConfig,
    feed: Arc<MockFeed>,
    sender: Arc<MockSender>,
) -> Arc<SentinelBot> {
    let strategy = LevelStrategy::new(
        config.feed.symbol.clone(),
        config.strategy.buy_level,
        config.strategy.sell_level,
    )
    .expect("valid test levels");

    Arc::new(SentinelBot::new(
        config,
        strategy,
        feed,
        NotificationManager::new(sender),
        Arc::new(EventBus::new()),
    ))
}
