//! 두 레벨 임계값 전략.
//!
//! 가격이 매수 레벨을 초과하면 BUY, 매도 레벨 미만이면 SELL로 분류합니다.
//! 두 레벨 사이(경계값 포함)는 분류하지 않으며 상태도 바꾸지 않습니다.
//! 직전 신호와 같은 방향의 분류는 무시하므로 방향이 바뀔 때만 신호가 생성됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sentinel_core::{Price, SentinelError, SentinelResult, SignalEvent, SignalKind};

/// 전략 이름.
pub const STRATEGY_NAME: &str = "SimpleLevels";

/// 두 레벨 임계값 전략.
#[derive(Debug, Clone)]
pub struct LevelStrategy {
    symbol: String,
    buy_level: Price,
    sell_level: Price,
    last_signal: Option<SignalKind>,
    last_price: Option<Price>,
    signal_count: u64,
    created_at: DateTime<Utc>,
}

/// 상태 조회용 전략 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub name: String,
    pub symbol: String,
    pub buy_level: Price,
    pub sell_level: Price,
    pub last_signal: Option<SignalKind>,
    pub last_price: Option<Price>,
    pub total_signals: u64,
    /// 매수 레벨 - 매도 레벨
    pub spread: Decimal,
    /// 매도 레벨 대비 스프레드 (%)
    pub spread_percent: Decimal,
    pub created_at: DateTime<Utc>,
}

fn check_levels(buy_level: Price, sell_level: Price) -> SentinelResult<()> {
    if buy_level <= sell_level {
        return Err(SentinelError::InvalidConfiguration(format!(
            "buy_level ({}) must be greater than sell_level ({})",
            buy_level, sell_level
        )));
    }
    Ok(())
}

impl LevelStrategy {
    /// 새 전략을 생성합니다.
    ///
    /// `buy_level <= sell_level`이면 `InvalidConfiguration`을 반환합니다.
    pub fn new(
        symbol: impl Into<String>,
        buy_level: Price,
        sell_level: Price,
    ) -> SentinelResult<Self> {
        check_levels(buy_level, sell_level)?;

        let symbol = symbol.into();
        info!(
            symbol = %symbol,
            buy_level = %buy_level,
            sell_level = %sell_level,
            "Level strategy initialized"
        );

        Ok(Self {
            symbol,
            buy_level,
            sell_level,
            last_signal: None,
            last_price: None,
            signal_count: 0,
            created_at: Utc::now(),
        })
    }

    /// 가격을 레벨 기준으로 분류합니다.
    fn classify(&self, price: Price) -> Option<SignalKind> {
        if price > self.buy_level {
            Some(SignalKind::Buy)
        } else if price < self.sell_level {
            Some(SignalKind::Sell)
        } else {
            None
        }
    }

    /// 가격을 평가하여 새 신호가 있으면 반환합니다.
    ///
    /// 음수 가격은 `InvalidPrice`로 거부하며 상태는 변하지 않습니다.
    pub fn evaluate(&mut self, price: Price) -> SentinelResult<Option<SignalEvent>> {
        if price < Decimal::ZERO {
            return Err(SentinelError::InvalidPrice(price));
        }

        let Some(kind) = self.classify(price) else {
            return Ok(None);
        };

        if self.last_signal == Some(kind) {
            debug!(symbol = %self.symbol, kind = %kind, price = %price, "Duplicate signal suppressed");
            return Ok(None);
        }

        self.last_signal = Some(kind);
        self.last_price = Some(price);
        self.signal_count += 1;

        info!(
            symbol = %self.symbol,
            kind = %kind,
            price = %price,
            total_signals = self.signal_count,
            "Level crossed, signal generated"
        );

        Ok(Some(SignalEvent::new(self.symbol.clone(), kind, price)))
    }

    /// 레벨을 변경합니다.
    ///
    /// 성공 시 직전 신호와 가격을 초기화하여 다음 분류가 억제되지 않도록 합니다.
    /// 실패 시 기존 상태를 그대로 유지합니다.
    pub fn update_levels(&mut self, buy_level: Price, sell_level: Price) -> SentinelResult<()> {
        check_levels(buy_level, sell_level)?;

        info!(
            symbol = %self.symbol,
            old_buy = %self.buy_level,
            old_sell = %self.sell_level,
            new_buy = %buy_level,
            new_sell = %sell_level,
            "Levels updated"
        );

        self.buy_level = buy_level;
        self.sell_level = sell_level;
        self.last_signal = None;
        self.last_price = None;
        Ok(())
    }

    /// 현재 상태의 스냅샷을 반환합니다.
    pub fn snapshot(&self) -> StrategySnapshot {
        let spread = self.buy_level - self.sell_level;
        let spread_percent = if self.sell_level.is_zero() {
            Decimal::ZERO
        } else {
            (spread / self.sell_level * dec!(100)).round_dp(2)
        };

        StrategySnapshot {
            name: STRATEGY_NAME.to_string(),
            symbol: self.symbol.clone(),
            buy_level: self.buy_level,
            sell_level: self.sell_level,
            last_signal: self.last_signal,
            last_price: self.last_price,
            total_signals: self.signal_count,
            spread,
            spread_percent,
            created_at: self.created_at,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn buy_level(&self) -> Price {
        self.buy_level
    }

    pub fn sell_level(&self) -> Price {
        self.sell_level
    }

    pub fn last_signal(&self) -> Option<SignalKind> {
        self.last_signal
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    /// 생성 이후 발생한 신호 수.
    pub fn signal_count(&self) -> u64 {
        self.signal_count
    }
}
