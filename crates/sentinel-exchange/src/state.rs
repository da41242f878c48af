//! 커넥터 상태와 스냅샷.
//!
//! 상태는 수신/재연결 루프만 변경합니다. 헬스 체크와 상태 조회는
//! `ConnectorStats` 스냅샷을 통해서만 읽습니다.
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──구독 성공──> Subscribed
//!                                 ↑                        │
//!                                 └──backoff── Degraded <──┘ (전송 실패)
//! ```

use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 커넥터 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorPhase {
    Disconnected,
    Connecting,
    Subscribed,
    Degraded,
}

impl std::fmt::Display for ConnectorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorPhase::Disconnected => write!(f, "disconnected"),
            ConnectorPhase::Connecting => write!(f, "connecting"),
            ConnectorPhase::Subscribed => write!(f, "subscribed"),
            ConnectorPhase::Degraded => write!(f, "degraded"),
        }
    }
}

/// 커넥터 내부 상태.
#[derive(Debug, Clone)]
pub struct ConnectorState {
    pub phase: ConnectorPhase,
    /// 마지막 구독 성공 이후 연속 실패 횟수
    pub consecutive_failures: u32,
    /// 누적 재연결 횟수
    pub reconnect_count: u64,
    /// 누적 수신 텍스트 메시지 수
    pub total_messages: u64,
    /// 누적 디코딩 실패 수
    pub decode_errors: u64,
    pub last_price: Option<Decimal>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// 현재 세션에서 마지막 메시지를 받은 단조 시각 (구독 시 초기화)
    pub last_message_instant: Option<Instant>,
    /// 현재 세션의 구독 시각
    pub subscribed_instant: Option<Instant>,
    pub last_error: Option<String>,
}

impl Default for ConnectorState {
    fn default() -> Self {
        Self {
            phase: ConnectorPhase::Disconnected,
            consecutive_failures: 0,
            reconnect_count: 0,
            total_messages: 0,
            decode_errors: 0,
            last_price: None,
            last_message_at: None,
            last_message_instant: None,
            subscribed_instant: None,
            last_error: None,
        }
    }
}

impl ConnectorState {
    /// 현재 세션의 마지막 활동(메시지 또는 구독) 이후 경과 시간.
    pub fn idle_for(&self) -> Option<std::time::Duration> {
        self.last_message_instant
            .or(self.subscribed_instant)
            .map(|at| at.elapsed())
    }
}

/// 잠금으로 보호되는 상태 셀.
///
/// 잠금은 필드 복사 동안만 유지되며 `.await` 구간에서는 잡지 않습니다.
#[derive(Debug, Default)]
pub(crate) struct StateCell {
    inner: RwLock<ConnectorState>,
}

impl StateCell {
    pub(crate) fn read(&self) -> ConnectorState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ConnectorState) -> R) -> R {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

/// 커넥터 상태 스냅샷 (상태 조회용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorStats {
    pub name: String,
    pub symbol: String,
    pub endpoint: String,
    pub phase: ConnectorPhase,
    pub running: bool,
    pub healthy: bool,
    /// 구독 상태지만 `stale_after` 동안 메시지가 없음
    pub stale: bool,
    pub consecutive_failures: u32,
    pub reconnect_count: u64,
    pub total_messages: u64,
    pub decode_errors: u64,
    pub last_price: Option<Decimal>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_update() {
        let cell = StateCell::default();
        assert_eq!(cell.read().phase, ConnectorPhase::Disconnected);

        let failures = cell.update(|s| {
            s.phase = ConnectorPhase::Degraded;
            s.consecutive_failures += 1;
            s.consecutive_failures
        });

        assert_eq!(failures, 1);
        assert_eq!(cell.read().phase, ConnectorPhase::Degraded);
    }

    #[test]
    fn test_idle_for_prefers_last_message() {
        let mut state = ConnectorState::default();
        assert!(state.idle_for().is_none());

        state.subscribed_instant = Some(Instant::now() - std::time::Duration::from_secs(60));
        assert!(state.idle_for().unwrap() >= std::time::Duration::from_secs(60));

        state.last_message_instant = Some(Instant::now());
        assert!(state.idle_for().unwrap() < std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_value(ConnectorPhase::Subscribed).unwrap();
        assert_eq!(json, "subscribed");
        assert_eq!(ConnectorPhase::Degraded.to_string(), "degraded");
    }
}
