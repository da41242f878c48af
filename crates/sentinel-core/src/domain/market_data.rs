//! 시장 데이터 타입.
//!
//! 커넥터가 수신한 유효한 시세 메시지마다 하나의 `PriceTick`이 생성됩니다.
//! 틱은 불변이며 신호 엔진이 소비한 뒤 버려집니다 (저장하지 않음).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 가격 타입.
pub type Price = Decimal;

/// 단일 시세 관측값.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    /// 거래 심볼 (예: "BTCUSDT")
    pub symbol: String,
    /// 최종 체결가
    pub price: Price,
    /// 수신 시각
    pub observed_at: DateTime<Utc>,
}

impl PriceTick {
    /// 현재 시각으로 새 틱을 생성합니다.
    pub fn new(symbol: impl Into<String>, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            observed_at: Utc::now(),
        }
    }

    /// 관측 시각을 지정합니다.
    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }
}
