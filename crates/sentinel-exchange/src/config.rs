//! 커넥터 설정.

use std::time::Duration;

use sentinel_core::FeedConfig;

use crate::backoff::ReconnectPolicy;

/// Bybit 공개 현물 스트림 기본 엔드포인트.
pub const BYBIT_SPOT_PUBLIC_URL: &str = "wss://stream.bybit.com/v5/public/spot";

/// 시세 커넥터 설정.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// WebSocket 엔드포인트
    pub url: String,
    /// 구독 심볼
    pub symbol: String,
    /// 구독 채널 접두사 ("tickers")
    pub channel: String,
    /// 재연결 정책
    pub reconnect: ReconnectPolicy,
    /// 수신 대기 타임아웃 (초과 시 ping 전송)
    pub recv_timeout: Duration,
    /// ping 응답 대기 타임아웃
    pub ping_timeout: Duration,
    /// 연결 타임아웃
    pub connect_timeout: Duration,
    /// 마지막 메시지 이후 비정상으로 판단하는 시간
    pub stale_after: Duration,
    /// disconnect 시 감독 태스크 종료 대기 시간
    pub shutdown_timeout: Duration,
}

impl ConnectorConfig {
    /// 기본값으로 새 설정을 생성합니다.
    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into(),
            channel: "tickers".to_string(),
            reconnect: ReconnectPolicy::default(),
            recv_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            stale_after: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// 구독 토픽 (예: "tickers.BTCUSDT").
    pub fn topic(&self) -> String {
        format!("{}.{}", self.channel, self.symbol)
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::new(BYBIT_SPOT_PUBLIC_URL, "BTCUSDT")
    }
}

impl From<&FeedConfig> for ConnectorConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            symbol: config.symbol.clone(),
            channel: config.channel.clone(),
            reconnect: ReconnectPolicy::from(config),
            recv_timeout: config.recv_timeout(),
            ping_timeout: config.ping_timeout(),
            connect_timeout: config.connect_timeout(),
            stale_after: config.stale_after(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_feed_config() {
        let mut feed = FeedConfig::default();
        feed.symbol = "ETHUSDT".to_string();
        feed.reconnect_delay_secs = 3;

        let config = ConnectorConfig::from(&feed);
        assert_eq!(config.topic(), "tickers.ETHUSDT");
        assert_eq!(config.reconnect.base_delay, Duration::from_secs(3));
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.url, BYBIT_SPOT_PUBLIC_URL);
    }
}
