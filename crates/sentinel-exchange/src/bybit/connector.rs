//! Bybit 공개 WebSocket 시세 커넥터.
//!
//! 하나의 `tickers.<SYMBOL>` 구독을 유지하며, 연결 끊김/타임아웃/잘못된 데이터에도
//! 감독 태스크가 backoff 후 재연결을 반복합니다. 루프는 취소 토큰으로만 종료됩니다.
//!
//! # 수신 루프
//!
//! - `recv_timeout` 동안 프레임이 없으면 WebSocket Ping을 보내고
//!   이후 대기는 `ping_timeout`으로 제한합니다.
//! - 어떤 프레임이든 수신하면 probe 상태가 해제됩니다.
//! - probe 이후에도 응답이 없으면 전송 에러로 세션을 종료합니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use sentinel_core::{feed_span, ConnectionInfo, EventBus, FeedEvent, PriceTick};

use crate::backoff::Backoff;
use crate::bybit::message::{parse_message, InboundMessage, SubscribeRequest};
use crate::config::ConnectorConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::state::{ConnectorPhase, ConnectorState, ConnectorStats, StateCell};
use crate::traits::PriceFeed;

const CONNECTOR_NAME: &str = "bybit";

/// 세션 종료 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// 취소 토큰에 의한 종료
    Shutdown,
    /// 서버가 연결을 닫음
    Closed,
}

/// 감독 태스크와 공유하는 상태.
struct Shared {
    config: ConnectorConfig,
    bus: Arc<EventBus>,
    state: StateCell,
    running: AtomicBool,
}

struct Supervisor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Bybit 시세 커넥터.
pub struct BybitConnector {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl BybitConnector {
    /// 새 커넥터를 생성합니다. 연결은 `connect()` 호출 시 시작됩니다.
    pub fn new(config: ConnectorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                bus,
                state: StateCell::default(),
                running: AtomicBool::new(false),
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.shared.config
    }

    /// 현재 단계.
    pub fn phase(&self) -> ConnectorPhase {
        self.shared.state.read().phase
    }

    /// 구독 중이며 현재 세션에서 `stale_after` 안에 메시지를 받았는지.
    fn healthy(&self, state: &ConnectorState) -> bool {
        self.shared.running.load(Ordering::SeqCst)
            && state.phase == ConnectorPhase::Subscribed
            && state
                .last_message_instant
                .is_some_and(|at| at.elapsed() < self.shared.config.stale_after)
    }

    /// 구독 중이지만 구독 또는 마지막 메시지 이후 `stale_after`가 지났는지.
    fn stale(&self, state: &ConnectorState) -> bool {
        self.shared.running.load(Ordering::SeqCst)
            && state.phase == ConnectorPhase::Subscribed
            && state
                .idle_for()
                .is_some_and(|idle| idle >= self.shared.config.stale_after)
    }
}

#[async_trait]
impl PriceFeed for BybitConnector {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    async fn connect(&self) -> ExchangeResult<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!(symbol = %self.shared.config.symbol, "Feed already running, ignoring connect");
            return Ok(());
        }

        self.shared.state.update(|s| {
            s.phase = ConnectorPhase::Connecting;
            s.last_error = None;
        });

        let token = CancellationToken::new();
        let span = feed_span!(
            "bybit_feed",
            self.shared.config.symbol,
            self.shared.config.url
        );
        let handle = tokio::spawn(supervise(self.shared.clone(), token.clone()).instrument(span));

        *self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Supervisor { token, handle });

        info!(
            symbol = %self.shared.config.symbol,
            url = %self.shared.config.url,
            "Feed supervisor started"
        );
        Ok(())
    }

    async fn disconnect(&self) -> ExchangeResult<()> {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(Supervisor { token, mut handle }) = supervisor {
            token.cancel();
            match timeout(self.shared.config.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Feed supervisor ended abnormally"),
                Err(_) => {
                    warn!(
                        timeout_ms = self.shared.config.shutdown_timeout.as_millis() as u64,
                        "Feed supervisor did not stop in time, aborting"
                    );
                    handle.abort();
                }
            }
        }

        self.shared
            .state
            .update(|s| s.phase = ConnectorPhase::Disconnected);

        if was_running {
            info!(symbol = %self.shared.config.symbol, "Feed disconnected");
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy(&self.shared.state.read())
    }

    fn stats(&self) -> ConnectorStats {
        let state = self.shared.state.read();
        ConnectorStats {
            name: CONNECTOR_NAME.to_string(),
            symbol: self.shared.config.symbol.clone(),
            endpoint: self.shared.config.url.clone(),
            phase: state.phase,
            running: self.shared.running.load(Ordering::SeqCst),
            healthy: self.healthy(&state),
            stale: self.stale(&state),
            consecutive_failures: state.consecutive_failures,
            reconnect_count: state.reconnect_count,
            total_messages: state.total_messages,
            decode_errors: state.decode_errors,
            last_price: state.last_price,
            last_message_at: state.last_message_at,
            last_error: state.last_error.clone(),
        }
    }
}

// ============================================================================
// 감독 루프
// ============================================================================

async fn supervise(shared: Arc<Shared>, token: CancellationToken) {
    let policy = &shared.config.reconnect;

    loop {
        let reason = match run_session(&shared, &token).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed) => "connection closed by server".to_string(),
            Err(e) => e.to_string(),
        };

        if token.is_cancelled() {
            break;
        }

        let failures = shared.state.update(|s| {
            s.phase = ConnectorPhase::Degraded;
            s.consecutive_failures += 1;
            s.reconnect_count += 1;
            s.last_error = Some(reason.clone());
            s.consecutive_failures
        });

        let backoff = policy.next(failures);
        match backoff {
            Backoff::Retry(delay) => {
                warn!(
                    error = %reason,
                    consecutive_failures = failures,
                    delay_ms = delay.as_millis() as u64,
                    "Feed session ended, reconnecting"
                );
            }
            Backoff::Cooldown(delay) => {
                error!(
                    error = %reason,
                    consecutive_failures = failures,
                    cooldown_secs = delay.as_secs(),
                    "Too many consecutive failures, entering cooldown"
                );
                shared.state.update(|s| s.consecutive_failures = 0);
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(backoff.delay()) => {}
        }

        shared
            .state
            .update(|s| s.phase = ConnectorPhase::Connecting);
    }

    debug!("Feed supervisor stopped");
}

/// 연결, 구독, 수신 루프를 한 번 실행합니다.
async fn run_session(shared: &Shared, token: &CancellationToken) -> ExchangeResult<SessionEnd> {
    let config = &shared.config;
    debug!(url = %config.url, "Connecting to feed");

    let connected = tokio::select! {
        _ = token.cancelled() => return Ok(SessionEnd::Shutdown),
        result = timeout(config.connect_timeout, connect_async(config.url.as_str())) => result,
    };
    let (ws_stream, _) = connected.map_err(|_| {
        ExchangeError::Timeout(format!(
            "connect timed out after {}ms",
            config.connect_timeout.as_millis()
        ))
    })??;

    let (mut write, mut read) = ws_stream.split();

    let request = SubscribeRequest::new(config.topic());
    write.send(Message::Text(request.to_json()?)).await?;

    shared.state.update(|s| {
        s.phase = ConnectorPhase::Subscribed;
        s.consecutive_failures = 0;
        s.subscribed_instant = Some(Instant::now());
        // 건강 판단은 현재 세션의 메시지만 사용
        s.last_message_instant = None;
    });
    info!(topic = %config.topic(), "Subscribed to feed");

    shared
        .bus
        .publish(&FeedEvent::Connected(ConnectionInfo {
            symbol: config.symbol.clone(),
            endpoint: config.url.clone(),
            connected_at: Utc::now(),
        }))
        .await;

    let mut probe_pending = false;

    loop {
        let wait = if probe_pending {
            config.ping_timeout
        } else {
            config.recv_timeout
        };

        let received = tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                return Ok(SessionEnd::Shutdown);
            }
            result = timeout(wait, read.next()) => result,
        };

        let message = match received {
            Err(_) if probe_pending => {
                return Err(ExchangeError::Timeout(format!(
                    "no response to ping within {}ms",
                    config.ping_timeout.as_millis()
                )));
            }
            Err(_) => {
                debug!(
                    idle_ms = config.recv_timeout.as_millis() as u64,
                    "No data received, sending ping probe"
                );
                write.send(Message::Ping(Vec::new())).await?;
                probe_pending = true;
                continue;
            }
            Ok(None) => return Ok(SessionEnd::Closed),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(message))) => message,
        };

        probe_pending = false;

        match message {
            Message::Text(text) => handle_text(shared, &text).await?,
            Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
            Message::Pong(_) => debug!("Pong received"),
            Message::Close(frame) => {
                info!(frame = ?frame, "Server closed the connection");
                return Ok(SessionEnd::Closed);
            }
            Message::Binary(_) | Message::Frame(_) => debug!("Ignoring non-text frame"),
        }
    }
}

/// 텍스트 프레임을 처리합니다.
///
/// 디코딩 실패는 기록만 하고 계속 진행하며, 거부된 구독 응답만 세션을 종료시킵니다.
async fn handle_text(shared: &Shared, text: &str) -> ExchangeResult<()> {
    shared.state.update(|s| {
        s.total_messages += 1;
        s.last_message_at = Some(Utc::now());
        s.last_message_instant = Some(Instant::now());
    });

    match parse_message(text) {
        Ok(InboundMessage::Ticker { last_price, .. }) => {
            shared.state.update(|s| s.last_price = Some(last_price));
            let tick = PriceTick::new(shared.config.symbol.clone(), last_price);
            shared.bus.publish(&FeedEvent::PriceUpdate(tick)).await;
        }
        Ok(message) if message.is_rejected_subscription() => {
            let reason = match message {
                InboundMessage::Operation { ret_msg, .. } => ret_msg.unwrap_or_default(),
                _ => String::new(),
            };
            return Err(ExchangeError::Subscription(reason));
        }
        Ok(InboundMessage::Operation { op, success, ret_msg }) => {
            debug!(op = %op, success = ?success, ret_msg = ?ret_msg, "Operation message");
        }
        Ok(InboundMessage::Other) => debug!("Ignoring non-ticker message"),
        Err(e) => {
            let decode_errors = shared.state.update(|s| {
                s.decode_errors += 1;
                s.decode_errors
            });
            warn!(error = %e, decode_errors, "Failed to decode feed message");
        }
    }

    Ok(())
}
