//! 레벨 돌파 신호 엔진.
//!
//! 이 크레이트가 제공하는 기능:
//! - 매수/매도 두 레벨 기준의 가격 분류
//! - 같은 방향 신호의 연속 발생 억제 (멱등성)
//! - 레벨 변경 및 상태 스냅샷
//!
//! # 예제
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use sentinel_strategy::LevelStrategy;
//!
//! let mut strategy = LevelStrategy::new("BTCUSDT", dec!(27000), dec!(26000)).unwrap();
//!
//! let signal = strategy.evaluate(dec!(27050)).unwrap();
//! assert!(signal.unwrap().is_buy());
//!
//! // 같은 방향은 다시 발생하지 않음
//! assert!(strategy.evaluate(dec!(27100)).unwrap().is_none());
//! ```

pub mod levels;

pub use levels::{LevelStrategy, StrategySnapshot};
