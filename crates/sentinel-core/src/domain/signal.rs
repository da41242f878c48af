//! 레벨 전략의 매매 신호.
//!
//! 이 모듈은 신호 엔진이 생성하는 신호 관련 타입을 정의합니다:
//! - `SignalKind` - 신호 방향 (BUY / SELL)
//! - `SignalEvent` - 임계값 돌파 시 한 번 생성되는 신호 엔티티

use crate::domain::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 신호 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    /// 매수 레벨 상향 돌파
    Buy,
    /// 매도 레벨 하향 돌파
    Sell,
}

impl SignalKind {
    /// 알림용 이모지.
    pub fn emoji(&self) -> &'static str {
        match self {
            SignalKind::Buy => "📈",
            SignalKind::Sell => "📉",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(format!("Unknown signal kind: {}", s)),
        }
    }
}

/// 신호 엔진이 생성한 매매 신호.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// 거래 심볼
    pub symbol: String,
    /// 신호 방향
    pub kind: SignalKind,
    /// 신호 발생 가격
    pub price: Price,
    /// 신호 발생 시각
    pub triggered_at: DateTime<Utc>,
}

impl SignalEvent {
    /// 새 신호를 생성합니다.
    pub fn new(symbol: impl Into<String>, kind: SignalKind, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            price,
            triggered_at: Utc::now(),
        }
    }

    /// 매수 신호인지 확인합니다.
    pub fn is_buy(&self) -> bool {
        self.kind == SignalKind::Buy
    }

    /// 매도 신호인지 확인합니다.
    pub fn is_sell(&self) -> bool {
        self.kind == SignalKind::Sell
    }
}
