//! 거래소 시세 스트림 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - PriceFeed trait: 오케스트레이터가 의존하는 시세 피드 인터페이스
//! - Bybit 공개 WebSocket 커넥터 (구독, 수신 루프, ping probe)
//! - 재연결 backoff 정책과 cooldown
//! - 커넥터 상태 및 헬스 스냅샷

pub mod backoff;
pub mod bybit;
pub mod config;
pub mod error;
pub mod state;
pub mod traits;

pub use backoff::{Backoff, ReconnectPolicy};
pub use bybit::BybitConnector;
pub use config::{ConnectorConfig, BYBIT_SPOT_PUBLIC_URL};
pub use error::*;
pub use state::{ConnectorPhase, ConnectorState, ConnectorStats};
pub use traits::*;
