//! 시세 피드 trait 정의.

use async_trait::async_trait;

use crate::error::ExchangeResult;
use crate::state::ConnectorStats;

/// 오케스트레이터가 의존하는 시세 피드 인터페이스.
///
/// 구현체는 내부에서 재연결을 관리하며, 시세와 연결 이벤트는
/// `EventBus`를 통해 전달합니다.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// 피드 이름 반환.
    fn name(&self) -> &str;

    /// 감독 태스크를 시작합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    async fn connect(&self) -> ExchangeResult<()>;

    /// 감독 태스크를 중지하고 연결을 닫습니다. 여러 번 호출해도 안전합니다.
    async fn disconnect(&self) -> ExchangeResult<()>;

    /// 구독 중이고 최근 메시지가 있는지 확인합니다. 블로킹하지 않습니다.
    fn is_healthy(&self) -> bool;

    /// 상태 스냅샷 반환.
    fn stats(&self) -> ConnectorStats;
}
