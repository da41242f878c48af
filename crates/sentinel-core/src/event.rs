//! 프로세스 내부 이벤트 디스패치.
//!
//! 시세 커넥터와 소비자(오케스트레이터, 신호 엔진) 사이의 발행/구독 채널입니다.
//!
//! # 동작 규칙
//!
//! - 이벤트는 문자열이 아닌 타입이 있는 `FeedEvent`로 구분합니다.
//! - 같은 종류의 이벤트는 등록 순서대로 순차 호출됩니다.
//! - 핸들러의 에러와 panic은 잡아서 로그로 남기며, 발행자(커넥터 루프)로 전파하지 않습니다.
//! - 발행 시점에 구독자가 없으면 이벤트는 사라집니다 (재전송/백로그 없음).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::PriceTick;
use crate::error::SentinelResult;

/// 이벤트 종류 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 구독 성공 (연결 수립)
    Connected,
    /// 새 시세 도착
    PriceUpdate,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Connected => write!(f, "connected"),
            EventKind::PriceUpdate => write!(f, "price_update"),
        }
    }
}

/// 연결 수립 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// 구독 심볼
    pub symbol: String,
    /// 피드 엔드포인트
    pub endpoint: String,
    /// 구독 성공 시각
    pub connected_at: DateTime<Utc>,
}

/// 커넥터가 발행하는 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// 구독 성공
    Connected(ConnectionInfo),
    /// 시세 업데이트
    PriceUpdate(PriceTick),
}

impl FeedEvent {
    /// 이벤트 종류를 반환합니다.
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::Connected(_) => EventKind::Connected,
            FeedEvent::PriceUpdate(_) => EventKind::PriceUpdate,
        }
    }
}

/// 이벤트 구독자 trait.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 이벤트를 처리합니다.
    async fn handle(&self, event: &FeedEvent) -> SentinelResult<()>;

    /// 로그에 표시할 핸들러 이름.
    fn name(&self) -> &str {
        "handler"
    }
}

/// 동기 클로저를 감싸는 핸들러.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&FeedEvent) -> SentinelResult<()> + Send + Sync,
{
    /// 새 클로저 핸들러를 생성합니다.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&FeedEvent) -> SentinelResult<()> + Send + Sync,
{
    async fn handle(&self, event: &FeedEvent) -> SentinelResult<()> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 이벤트 종류별 구독자 목록을 관리하는 이벤트 버스.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// 빈 이벤트 버스를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러를 등록합니다.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(kind = %kind, handler = handler.name(), "Event handler subscribed");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// 동기 클로저를 핸들러로 등록합니다.
    pub fn subscribe_fn<F>(&self, kind: EventKind, name: impl Into<String>, f: F)
    where
        F: Fn(&FeedEvent) -> SentinelResult<()> + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler::new(name, f)));
    }

    /// 등록된 핸들러 수를 반환합니다.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// 이벤트를 발행합니다.
    ///
    /// 등록된 모든 핸들러를 순서대로 호출하고, 성공한 핸들러 수를 반환합니다.
    pub async fn publish(&self, event: &FeedEvent) -> usize {
        let kind = event.kind();

        // await 구간에서 락을 잡지 않도록 목록을 복사
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for handler in handlers {
            match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(kind = %kind, handler = handler.name(), error = %e, "Event handler failed");
                }
                Err(_) => {
                    error!(kind = %kind, handler = handler.name(), "Event handler panicked");
                }
            }
        }

        delivered
    }
}
