//! 시세 감시 봇 오케스트레이터.
//!
//! 커넥터, 레벨 전략, 알림 관리자를 이벤트 버스로 연결하고
//! 헬스 체크 루프와 하트비트 루프를 운영합니다.
//!
//! ```text
//! BybitConnector ──Connected──> StartupHandler ──> notify_startup (1회)
//!        │
//!        └──PriceUpdate──> SignalHandler ──> LevelStrategy::evaluate
//!                                                  │ 신호
//!                                                  └──spawn──> notify_signal
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use sentinel_core::{
    AppConfig, EventBus, EventHandler, EventKind, FeedEvent, SentinelError, SentinelResult,
};
use sentinel_exchange::{BybitConnector, ConnectorConfig, ConnectorStats, PriceFeed};
use sentinel_notification::{
    NotificationManager, NotifierStats, TelegramConfig, TelegramSender,
};
use sentinel_strategy::{LevelStrategy, StrategySnapshot};

use crate::error::BotResult;

/// 봇 상태 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub version: String,
    pub running: bool,
    pub healthy: bool,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    /// 시작 알림 전송 여부
    pub startup_notified: bool,
    pub health_checks: u64,
    pub recovery_attempts: u64,
    pub strategy: StrategySnapshot,
    pub connector: ConnectorStats,
    pub notifier: NotifierStats,
}

// ============================================================================
// 이벤트 핸들러
// ============================================================================

/// 첫 구독 성공 시 시작 알림을 한 번 전송합니다.
struct StartupHandler {
    notifier: NotificationManager,
    strategy: Arc<RwLock<LevelStrategy>>,
    sent: Arc<AtomicBool>,
}

#[async_trait]
impl EventHandler for StartupHandler {
    async fn handle(&self, event: &FeedEvent) -> SentinelResult<()> {
        let FeedEvent::Connected(info) = event else {
            return Ok(());
        };

        if self.sent.swap(true, Ordering::SeqCst) {
            debug!(endpoint = %info.endpoint, "Startup notification already sent");
            return Ok(());
        }

        let (buy_level, sell_level) = {
            let strategy = self.strategy.read().await;
            (strategy.buy_level(), strategy.sell_level())
        };

        let notifier = self.notifier.clone();
        let symbol = info.symbol.clone();
        let endpoint = info.endpoint.clone();
        tokio::spawn(async move {
            notifier
                .notify_startup(&symbol, buy_level, sell_level, &endpoint)
                .await;
        });

        Ok(())
    }

    fn name(&self) -> &str {
        "startup"
    }
}

/// 시세를 전략에 전달하고 신호를 알림으로 내보냅니다.
struct SignalHandler {
    notifier: NotificationManager,
    strategy: Arc<RwLock<LevelStrategy>>,
}

#[async_trait]
impl EventHandler for SignalHandler {
    async fn handle(&self, event: &FeedEvent) -> SentinelResult<()> {
        let FeedEvent::PriceUpdate(tick) = event else {
            return Ok(());
        };

        let outcome = self.strategy.write().await.evaluate(tick.price);
        match outcome {
            Ok(Some(signal)) => {
                info!(
                    symbol = %signal.symbol,
                    kind = %signal.kind,
                    price = %signal.price,
                    "Trading signal"
                );
                // 알림 전송이 틱 수신을 막지 않도록 분리
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    notifier
                        .notify_signal(&signal.symbol, signal.kind, signal.price)
                        .await;
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(SentinelError::InvalidPrice(price)) => {
                warn!(symbol = %tick.symbol, price = %price, "Discarding tick with invalid price");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "signal"
    }
}

// ============================================================================
// 오케스트레이터
// ============================================================================

/// 시세 감시 봇.
pub struct SentinelBot {
    config: AppConfig,
    strategy: Arc<RwLock<LevelStrategy>>,
    feed: Arc<dyn PriceFeed>,
    notifier: NotificationManager,
    bus: Arc<EventBus>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    startup_sent: Arc<AtomicBool>,
    running: AtomicBool,
    health_checks: AtomicU64,
    recovery_attempts: AtomicU64,
}

impl SentinelBot {
    /// 구성 요소를 직접 지정하여 봇을 생성합니다.
    ///
    /// `bus`는 `feed`가 이벤트를 발행하는 버스와 같아야 합니다.
    pub fn new(
        config: AppConfig,
        strategy: LevelStrategy,
        feed: Arc<dyn PriceFeed>,
        notifier: NotificationManager,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            strategy: Arc::new(RwLock::new(strategy)),
            feed,
            notifier,
            bus,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            startup_sent: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            health_checks: AtomicU64::new(0),
            recovery_attempts: AtomicU64::new(0),
        }
    }

    /// 설정으로 Bybit 커넥터와 텔레그램 전송기를 구성합니다.
    pub fn from_config(config: AppConfig) -> BotResult<Self> {
        let bus = Arc::new(EventBus::new());
        let feed = BybitConnector::new(ConnectorConfig::from(&config.feed), Arc::clone(&bus));
        let sender = TelegramSender::new(TelegramConfig::from(&config.telegram))?;
        let strategy = LevelStrategy::new(
            config.feed.symbol.clone(),
            config.strategy.buy_level,
            config.strategy.sell_level,
        )?;

        Ok(Self::new(
            config,
            strategy,
            Arc::new(feed),
            NotificationManager::new(Arc::new(sender)),
            bus,
        ))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn strategy(&self) -> &Arc<RwLock<LevelStrategy>> {
        &self.strategy
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.feed.is_healthy()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn connector_stats(&self) -> ConnectorStats {
        self.feed.stats()
    }

    pub fn notifier_enabled(&self) -> bool {
        self.notifier.is_enabled()
    }

    pub fn notifier_stats(&self) -> NotifierStats {
        self.notifier.stats()
    }

    fn register_handlers(&self) {
        self.bus.subscribe(
            EventKind::Connected,
            Arc::new(StartupHandler {
                notifier: self.notifier.clone(),
                strategy: Arc::clone(&self.strategy),
                sent: Arc::clone(&self.startup_sent),
            }),
        );
        self.bus.subscribe(
            EventKind::PriceUpdate,
            Arc::new(SignalHandler {
                notifier: self.notifier.clone(),
                strategy: Arc::clone(&self.strategy),
            }),
        );
    }

    /// 봇을 실행하고 `shutdown`이 취소될 때까지 대기합니다.
    ///
    /// 시작 단계의 치명적 에러(자격 증명 거부 등)는 루프를 시작하기 전에 반환됩니다.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> BotResult<()> {
        self.register_handlers();

        match self.notifier.verify().await {
            Ok(()) => info!(enabled = self.notifier.is_enabled(), "Notifier verified"),
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Notifier credentials rejected");
                return Err(e.into());
            }
            Err(e) => warn!(error = %e, "Notifier verification failed, continuing"),
        }

        self.feed.connect().await?;
        self.running.store(true, Ordering::SeqCst);
        info!(
            feed = self.feed.name(),
            symbol = %self.config.feed.symbol,
            buy_level = %self.config.strategy.buy_level,
            sell_level = %self.config.strategy.sell_level,
            "Sentinel started"
        );

        let health_token = shutdown.child_token();
        let health_task = {
            let bot = Arc::clone(&self);
            let token = health_token.clone();
            tokio::spawn(
                async move { bot.health_loop(token).await }.instrument(info_span!("health")),
            )
        };

        self.heartbeat_loop(&shutdown).await;

        info!("Shutdown requested, stopping");
        health_token.cancel();
        if let Err(e) = health_task.await {
            warn!(error = %e, "Health loop ended abnormally");
        }

        self.shutdown().await;
        Ok(())
    }

    async fn health_loop(&self, token: CancellationToken) {
        let period = self.config.health.check_interval();
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.check_health(&token).await,
            }
        }
        debug!("Health loop stopped");
    }

    /// 헬스 체크 1회.
    ///
    /// 피드가 실행 중이 아니거나 구독 상태에서 응답이 끊긴 경우에만
    /// 제한 시간 내에서 재시작합니다.
    /// 연결 중이거나 backoff/cooldown 대기 중이면 커넥터의 재연결에 맡깁니다.
    async fn check_health(&self, token: &CancellationToken) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);

        if self.feed.is_healthy() {
            debug!("Feed healthy");
            return;
        }

        let stats = self.feed.stats();
        if stats.running && !stats.stale {
            warn!(
                phase = %stats.phase,
                consecutive_failures = stats.consecutive_failures,
                reconnect_count = stats.reconnect_count,
                last_error = ?stats.last_error,
                "Feed unhealthy, leaving reconnect to the connector"
            );
            return;
        }

        warn!(
            phase = %stats.phase,
            running = stats.running,
            stale = stats.stale,
            reconnect_count = stats.reconnect_count,
            last_message_at = ?stats.last_message_at,
            last_error = ?stats.last_error,
            "Feed stalled, attempting recovery"
        );
        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);

        let recovery = async {
            self.feed.disconnect().await?;
            self.feed.connect().await
        };
        let timeout = self.config.health.recovery_timeout();

        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::time::timeout(timeout, recovery) => match result {
                Ok(Ok(())) => info!("Feed restarted"),
                Ok(Err(e)) => error!(error = %e, "Feed recovery failed"),
                Err(_) => error!(timeout_secs = timeout.as_secs(), "Feed recovery timed out"),
            },
        }
    }

    async fn heartbeat_loop(&self, shutdown: &CancellationToken) {
        let period = self.config.health.heartbeat_interval();
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.feed.stats();
                    let strategy = self.strategy.read().await.snapshot();
                    info!(
                        uptime_secs = self.uptime().as_secs(),
                        phase = %stats.phase,
                        healthy = stats.healthy,
                        last_price = ?stats.last_price,
                        total_messages = stats.total_messages,
                        reconnect_count = stats.reconnect_count,
                        total_signals = strategy.total_signals,
                        "Heartbeat"
                    );
                }
            }
        }
    }

    async fn shutdown(&self) {
        let (total_signals, last_signal) = {
            let strategy = self.strategy.read().await;
            (strategy.signal_count(), strategy.last_signal())
        };
        let reconnect_count = self.feed.stats().reconnect_count;
        let uptime = self.uptime();

        let notifier = self.notifier.clone();
        match tokio::task::spawn_blocking(move || {
            notifier.notify_shutdown(uptime, reconnect_count, total_signals, last_signal)
        })
        .await
        {
            Ok(sent) => debug!(sent, "Shutdown notification finished"),
            Err(e) => error!(error = %e, "Shutdown notification task failed"),
        }

        if let Err(e) = self.feed.disconnect().await {
            warn!(error = %e, "Feed disconnect failed");
        }
        self.running.store(false, Ordering::SeqCst);

        let stats = self.feed.stats();
        info!(
            uptime_secs = uptime.as_secs(),
            total_messages = stats.total_messages,
            decode_errors = stats.decode_errors,
            reconnect_count = stats.reconnect_count,
            total_signals,
            last_signal = ?last_signal,
            "Sentinel stopped"
        );
    }

    /// 현재 상태 스냅샷을 반환합니다.
    pub async fn status(&self) -> BotStatus {
        BotStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            running: self.is_running(),
            healthy: self.feed.is_healthy(),
            started_at: self.started_at_utc,
            uptime_secs: self.uptime().as_secs(),
            startup_notified: self.startup_sent.load(Ordering::SeqCst),
            health_checks: self.health_checks.load(Ordering::Relaxed),
            recovery_attempts: self.recovery_attempts.load(Ordering::Relaxed),
            strategy: self.strategy.read().await.snapshot(),
            connector: self.feed.stats(),
            notifier: self.notifier.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::testing::{test_bot, MockFeed, MockSender};
    use rust_decimal_macros::dec;
    use sentinel_core::{ConnectionInfo, PriceTick, SignalKind};
    use sentinel_exchange::{ConnectorPhase, ReconnectPolicy};
    use sentinel_notification::NotificationEvent;

    fn connected() -> FeedEvent {
        FeedEvent::Connected(ConnectionInfo {
            symbol: "BTCUSDT".to_string(),
            endpoint: "ws://mock".to_string(),
            connected_at: Utc::now(),
        })
    }

    fn tick(price: rust_decimal::Decimal) -> FeedEvent {
        FeedEvent::PriceUpdate(PriceTick::new("BTCUSDT", price))
    }

    async fn settle(sender: &MockSender, expected: usize) {
        for _ in 0..100 {
            if sender.sent().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_startup_notification_sent_once() {
        let feed = Arc::new(MockFeed::new(true));
        let sender = Arc::new(MockSender::default());
        let bot = test_bot(AppConfig::default(), feed, sender.clone());
        bot.register_handlers();

        assert_eq!(bot.bus().publish(&connected()).await, 1);
        assert_eq!(bot.bus().publish(&connected()).await, 1);
        settle(&sender, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sender.count("startup"), 1);
        match &sender.sent()[0].0 {
            NotificationEvent::Startup {
                symbol,
                buy_level,
                sell_level,
                ..
            } => {
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(*buy_level, dec!(27000));
                assert_eq!(*sell_level, dec!(26000));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(bot.status().await.startup_notified);
    }

    #[tokio::test]
    async fn test_signals_forwarded_to_notifier() {
        let feed = Arc::new(MockFeed::new(true));
        let sender = Arc::new(MockSender::default());
        let bot = test_bot(AppConfig::default(), feed, sender.clone());
        bot.register_handlers();

        for price in [dec!(27050), dec!(27100), dec!(26500), dec!(25900)] {
            bot.bus().publish(&tick(price)).await;
        }
        settle(&sender, 2).await;

        let mut signals: Vec<(SignalKind, rust_decimal::Decimal)> = sender
            .sent()
            .into_iter()
            .filter_map(|(event, _)| match event {
                NotificationEvent::Signal { kind, price, .. } => Some((kind, price)),
                _ => None,
            })
            .collect();
        signals.sort_by_key(|(_, price)| *price);

        assert_eq!(
            signals,
            vec![(SignalKind::Sell, dec!(25900)), (SignalKind::Buy, dec!(27050))]
        );
        assert_eq!(bot.strategy().read().await.signal_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_price_is_discarded() {
        let feed = Arc::new(MockFeed::new(true));
        let sender = Arc::new(MockSender::default());
        let bot = test_bot(AppConfig::default(), feed, sender.clone());
        bot.register_handlers();

        // 핸들러는 성공으로 처리하고 틱만 버린다
        assert_eq!(bot.bus().publish(&tick(dec!(-1))).await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let strategy = bot.strategy().read().await;
        assert_eq!(strategy.signal_count(), 0);
        assert_eq!(strategy.last_price(), None);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials_abort_startup() {
        let feed = Arc::new(MockFeed::new(true));
        let sender = Arc::new(MockSender::rejecting());
        let bot = test_bot(AppConfig::default(), feed.clone(), sender);

        let result = bot.clone().run(CancellationToken::new()).await;

        assert!(matches!(result, Err(BotError::Notification(_))));
        assert_eq!(feed.connects(), 0);
        assert!(!bot.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_recovery_and_graceful_shutdown() {
        let feed = Arc::new(MockFeed::new(false));
        let sender = Arc::new(MockSender::default());
        let bot = test_bot(AppConfig::default(), feed.clone(), sender.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(bot.clone().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(bot.is_running());
        assert_eq!(feed.connects(), 1);

        // 구독 상태에서 응답이 끊김. 첫 헬스 체크는 한 주기 뒤에 실행된다
        feed.set_stale(true);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(feed.disconnects(), 1);
        assert_eq!(feed.connects(), 2);

        feed.set_stale(false);
        feed.set_healthy(true);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(feed.connects(), 2);

        let status = bot.status().await;
        assert_eq!(status.health_checks, 2);
        assert_eq!(status.recovery_attempts, 1);

        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert!(!bot.is_running());
        assert_eq!(feed.disconnects(), 2);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            (NotificationEvent::Shutdown { reconnect_count, .. }, blocking) => {
                assert_eq!(*reconnect_count, 2);
                assert!(*blocking);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnecting_feed_is_left_to_connector() {
        let feed = Arc::new(MockFeed::new(false));
        let sender = Arc::new(MockSender::default());
        let bot = test_bot(AppConfig::default(), feed.clone(), sender);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(bot.clone().run(shutdown.clone()));

        // 실행 중이지만 비정상(backoff 대기) 상태로 세 번의 헬스 체크가 지나간다
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(bot.connector_stats().phase, ConnectorPhase::Degraded);

        let status = bot.status().await;
        assert_eq!(status.health_checks, 3);
        assert_eq!(status.recovery_attempts, 0);
        assert_eq!(feed.connects(), 1);
        assert_eq!(feed.disconnects(), 0);

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(feed.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_connector_cooldown_survives_health_checks() {
        // 아무도 수신하지 않는 로컬 포트
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut config = AppConfig::default();
        config.health.check_interval_secs = 1;

        let bus = Arc::new(EventBus::new());
        let connector = BybitConnector::new(
            ConnectorConfig::new(url, "BTCUSDT").with_reconnect(ReconnectPolicy {
                base_delay: Duration::from_millis(20),
                max_delay: Duration::from_millis(100),
                failure_ceiling: 2,
                cooldown: Duration::from_secs(10),
            }),
            Arc::clone(&bus),
        );
        let strategy = LevelStrategy::new("BTCUSDT", dec!(27000), dec!(26000)).unwrap();
        let sender = Arc::new(MockSender::default());
        let bot = Arc::new(SentinelBot::new(
            config,
            strategy,
            Arc::new(connector),
            NotificationManager::new(sender.clone()),
            bus,
        ));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(bot.clone().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let stats = bot.connector_stats();
        assert_eq!(stats.reconnect_count, 2);
        assert_eq!(stats.phase, ConnectorPhase::Degraded);

        // 헬스 체크가 여러 번 지나도 cooldown 중에는 재연결하지 않는다
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let status = bot.status().await;
        assert!(status.health_checks >= 2);
        assert_eq!(status.recovery_attempts, 0);
        assert_eq!(status.connector.reconnect_count, 2);
        assert!(status.connector.running);

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(bot.connector_stats().phase, ConnectorPhase::Disconnected);
        assert_eq!(sender.count("shutdown"), 1);
    }
}
