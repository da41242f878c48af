//! tracing 기반 로깅 초기화.
//!
//! 출력 형식은 `pretty`(개발용), `json`(로그 수집용), `compact`(한 줄) 중 하나입니다.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// 로깅 초기화 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` 지시어 (예: "info", "sentinel_exchange=debug")
    pub level: String,
    pub format: LogFormat,
}

impl From<&LoggingConfig> for LogConfig {
    /// 알 수 없는 형식은 `Pretty`로 대체합니다.
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.to_lowercase(),
            format: config.format.parse().unwrap_or_default(),
        }
    }
}

/// 전역 subscriber를 설치합니다. `RUST_LOG`가 있으면 설정 레벨보다 우선합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

/// 피드 컨텍스트 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! feed_span {
    ($name:expr, $symbol:expr) => {
        tracing::info_span!($name, symbol = %$symbol)
    };
    ($name:expr, $symbol:expr, $endpoint:expr) => {
        tracing::info_span!($name, symbol = %$symbol, endpoint = %$endpoint)
    };
}
