//! # Sentinel Notification
//!
//! 시세 감시 봇의 알림 서비스.
//!
//! 지원 채널:
//! - Telegram (Bot API `sendMessage`, `getMe`)
//!
//! 봇 시작, 매매 신호, 봇 종료 세 가지 이벤트를 전송하며
//! 종료 알림은 async 런타임과 무관한 blocking 경로를 사용합니다.

pub mod manager;
pub mod telegram;
pub mod types;

pub use manager::*;
pub use telegram::*;
pub use types::*;
