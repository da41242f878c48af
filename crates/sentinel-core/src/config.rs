//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//!
//! 로드 우선순위 (뒤가 앞을 덮어씀):
//! 1. 섹션별 기본값
//! 2. 설정 파일 (선택, TOML/YAML/JSON)
//! 3. `SENTINEL__SECTION__KEY` 환경 변수
//! 4. 단축 환경 변수 (`TELEGRAM_TOKEN`, `SYMBOL`, `BUY_LEVEL` 등)

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{SentinelError, SentinelResult};

/// 단축 환경 변수와 설정 키 매핑.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("TELEGRAM_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_CHAT_ID", "telegram.chat_id"),
    ("BYBIT_PUBLIC_WS", "feed.url"),
    ("SYMBOL", "feed.symbol"),
    ("BUY_LEVEL", "strategy.buy_level"),
    ("SELL_LEVEL", "strategy.sell_level"),
    ("RECONNECT_DELAY", "feed.reconnect_delay_secs"),
    ("LOG_LEVEL", "logging.level"),
    ("PORT", "server.port"),
];

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 시세 피드 설정
    pub feed: FeedConfig,
    /// 레벨 전략 설정
    pub strategy: StrategyConfig,
    /// 텔레그램 알림 설정
    pub telegram: TelegramConfig,
    /// 상태 서버 설정
    pub server: ServerConfig,
    /// 헬스 체크 설정
    pub health: HealthConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 시세 피드 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// WebSocket 엔드포인트
    pub url: String,
    /// 구독 심볼
    pub symbol: String,
    /// 구독 채널 접두사
    pub channel: String,
    /// 재연결 기본 지연 (초)
    pub reconnect_delay_secs: u64,
    /// 재연결 최대 지연 (초)
    pub max_reconnect_delay_secs: u64,
    /// 쿨다운 전환까지의 연속 실패 횟수
    pub failure_ceiling: u32,
    /// 쿨다운 지연 (초)
    pub cooldown_secs: u64,
    /// 수신 대기 타임아웃 (초)
    pub recv_timeout_secs: u64,
    /// ping 응답 대기 타임아웃 (초)
    pub ping_timeout_secs: u64,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 마지막 메시지 이후 비정상으로 판단하는 시간 (초)
    pub stale_after_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.bybit.com/v5/public/spot".to_string(),
            symbol: "BTCUSDT".to_string(),
            channel: "tickers".to_string(),
            reconnect_delay_secs: 5,
            max_reconnect_delay_secs: 60,
            failure_ceiling: 5,
            cooldown_secs: 120,
            recv_timeout_secs: 30,
            ping_timeout_secs: 10,
            connect_timeout_secs: 10,
            stale_after_secs: 300,
        }
    }
}

impl FeedConfig {
    /// 구독 토픽 (예: "tickers.BTCUSDT").
    pub fn topic(&self) -> String {
        format!("{}.{}", self.channel, self.symbol)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// 레벨 전략 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// 매수 레벨 (이 가격 초과 시 BUY)
    pub buy_level: Decimal,
    /// 매도 레벨 (이 가격 미만 시 SELL)
    pub sell_level: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy_level: dec!(27000),
            sell_level: dec!(26000),
        }
    }
}

/// 텔레그램 알림 설정.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 봇 토큰
    pub bot_token: String,
    /// 채팅 ID
    pub chat_id: String,
    /// Bot API 기본 URL
    pub api_base: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub retry_delay_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 2,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("bot_token", &"*****")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// 상태 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

impl ServerConfig {
    /// 바인딩 주소 ("host:port").
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 헬스 체크 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// 헬스 체크 주기 (초)
    pub check_interval_secs: u64,
    /// 하트비트 로그 주기 (초)
    pub heartbeat_interval_secs: u64,
    /// 복구 시도 제한 시간 (초)
    pub recovery_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            heartbeat_interval_secs: 300,
            recovery_timeout_secs: 15,
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load(path: Option<&Path>) -> SentinelResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// 단축 환경 변수 조회 함수를 지정하여 설정을 로드합니다.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> SentinelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SENTINEL")
                .separator("__")
                .try_parsing(true),
        );

        for (env_key, config_key) in LEGACY_ENV_KEYS {
            let value = lookup(env_key).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*config_key, value)?;
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 시작 전에 설정 값을 검증합니다.
    pub fn validate(&self) -> SentinelResult<()> {
        let invalid = |msg: &str| Err(SentinelError::InvalidConfiguration(msg.to_string()));

        if self.telegram.enabled {
            if self.telegram.bot_token.trim().is_empty() {
                return invalid("telegram.bot_token (TELEGRAM_TOKEN) is required");
            }
            if self.telegram.chat_id.trim().is_empty() {
                return invalid("telegram.chat_id (TELEGRAM_CHAT_ID) is required");
            }
            if self.telegram.max_retries == 0 {
                return invalid("telegram.max_retries must be at least 1");
            }
        }

        if self.feed.symbol.trim().is_empty() {
            return invalid("feed.symbol must not be empty");
        }
        if self.feed.url.trim().is_empty() {
            return invalid("feed.url must not be empty");
        }

        if self.strategy.buy_level <= self.strategy.sell_level {
            return Err(SentinelError::InvalidConfiguration(format!(
                "buy_level ({}) must be greater than sell_level ({})",
                self.strategy.buy_level, self.strategy.sell_level
            )));
        }

        let intervals = [
            ("feed.reconnect_delay_secs", self.feed.reconnect_delay_secs),
            ("feed.max_reconnect_delay_secs", self.feed.max_reconnect_delay_secs),
            ("feed.cooldown_secs", self.feed.cooldown_secs),
            ("feed.recv_timeout_secs", self.feed.recv_timeout_secs),
            ("feed.ping_timeout_secs", self.feed.ping_timeout_secs),
            ("feed.connect_timeout_secs", self.feed.connect_timeout_secs),
            ("health.check_interval_secs", self.health.check_interval_secs),
            ("health.heartbeat_interval_secs", self.health.heartbeat_interval_secs),
            ("health.recovery_timeout_secs", self.health.recovery_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(SentinelError::InvalidConfiguration(format!(
                "{} must be greater than zero",
                name
            )));
        }

        if self.feed.failure_ceiling == 0 {
            return invalid("feed.failure_ceiling must be at least 1");
        }

        if self.feed.max_reconnect_delay_secs < self.feed.reconnect_delay_secs {
            return Err(SentinelError::InvalidConfiguration(format!(
                "feed.max_reconnect_delay_secs ({}) must not be less than feed.reconnect_delay_secs ({})",
                self.feed.max_reconnect_delay_secs, self.feed.reconnect_delay_secs
            )));
        }

        if self.feed.stale_after_secs <= self.feed.recv_timeout_secs {
            return Err(SentinelError::InvalidConfiguration(format!(
                "feed.stale_after_secs ({}) must be greater than feed.recv_timeout_secs ({})",
                self.feed.stale_after_secs, self.feed.recv_timeout_secs
            )));
        }

        Ok(())
    }
}
