//! 재연결 backoff 정책.
//!
//! # 지연 계산
//!
//! ```text
//! delay(n) = min(base_delay * n, max_delay)      (n = 연속 실패 횟수)
//! n >= failure_ceiling 이면 cooldown 1회 적용 후 n = 0
//! ```

use std::time::Duration;

use sentinel_core::FeedConfig;

/// 다음 재연결까지의 대기.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 일반 재시도 대기
    Retry(Duration),
    /// 연속 실패 한도 도달 후 긴 대기 (이후 실패 횟수 초기화)
    Cooldown(Duration),
}

impl Backoff {
    pub fn delay(&self) -> Duration {
        match self {
            Backoff::Retry(d) | Backoff::Cooldown(d) => *d,
        }
    }

    pub fn is_cooldown(&self) -> bool {
        matches!(self, Backoff::Cooldown(_))
    }
}

/// 재연결 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 기본 지연
    pub base_delay: Duration,
    /// 최대 지연
    pub max_delay: Duration,
    /// cooldown 전환까지의 연속 실패 횟수
    pub failure_ceiling: u32,
    /// cooldown 지연
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            failure_ceiling: 5,
            cooldown: Duration::from_secs(120),
        }
    }
}

impl From<&FeedConfig> for ReconnectPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            base_delay: config.reconnect_delay(),
            max_delay: config.max_reconnect_delay(),
            failure_ceiling: config.failure_ceiling,
            cooldown: config.cooldown(),
        }
    }
}

impl ReconnectPolicy {
    /// 연속 실패 횟수에 대한 선형 지연 (최대값 제한).
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.base_delay
            .saturating_mul(failures.max(1))
            .min(self.max_delay)
    }

    /// 연속 실패 횟수에 대한 다음 대기를 결정합니다.
    pub fn next(&self, failures: u32) -> Backoff {
        if failures >= self.failure_ceiling {
            Backoff::Cooldown(self.cooldown)
        } else {
            Backoff::Retry(self.delay_for(failures))
        }
    }
}
