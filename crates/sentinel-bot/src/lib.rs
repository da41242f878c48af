//! 시세 감시 봇 오케스트레이터 및 상태 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 커넥터, 신호 엔진, 알림 전송기를 연결하는 오케스트레이터
//! - 주기적 헬스 체크와 제한 시간 내 복구 시도
//! - 상태 조회용 HTTP 엔드포인트
//!
//! # 모듈 구성
//!
//! - [`app`]: 오케스트레이터 (SentinelBot)
//! - [`routes`]: 헬스 체크 및 상태 엔드포인트
//! - [`error`]: 봇 에러 타입

pub mod app;
pub mod error;
pub mod routes;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use app::{BotStatus, SentinelBot};
pub use error::{BotError, BotResult, ErrorResponse};
pub use routes::create_router;
