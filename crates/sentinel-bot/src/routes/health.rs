//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 호스팅 플랫폼의 헬스 체크에서 사용됩니다.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::app::SentinelBot;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,

    /// 봇 버전
    pub version: String,

    /// 업타임(초)
    pub uptime_secs: u64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// 시세 피드 상태
    pub feed: ComponentStatus,

    /// 알림 전송기 상태
    pub notifier: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down" | "disabled")
    pub status: String,

    /// 추가 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            message: None,
        }
    }
}

fn build_response(bot: &SentinelBot) -> (bool, HealthResponse) {
    let feed = feed_status(bot);
    let healthy = feed.status == "up";
    let notifier = if bot.notifier_enabled() {
        let stats = bot.notifier_stats();
        ComponentStatus::up_with_info(format!(
            "{} sent, {} failed",
            stats.messages_sent, stats.messages_failed
        ))
    } else {
        ComponentStatus::disabled()
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: bot.uptime().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth { feed, notifier },
    };
    (healthy, response)
}

fn feed_status(bot: &SentinelBot) -> ComponentStatus {
    let stats = bot.connector_stats();
    let info = format!("{} {} ({})", stats.name, stats.symbol, stats.phase);
    if stats.healthy {
        ComponentStatus::up_with_info(info)
    } else {
        ComponentStatus::down(info)
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// 피드가 비정상이어도 200을 반환하며 `status`로 구분합니다.
/// GET /health
pub async fn health_check(State(bot): State<Arc<SentinelBot>>) -> impl IntoResponse {
    let (_, response) = build_response(&bot);
    (StatusCode::OK, Json(response))
}

/// 피드 상태 기반 헬스 체크 (readiness probe용).
///
/// GET /health/ready
pub async fn health_ready(State(bot): State<Arc<SentinelBot>>) -> impl IntoResponse {
    let (healthy, response) = build_response(&bot);
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<SentinelBot>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use crate::testing::{test_bot, MockFeed, MockSender};
    use axum::{body::Body, http::Request};
    use sentinel_core::AppConfig;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let feed = Arc::new(MockFeed::new(false));
        let bot = test_bot(AppConfig::default(), feed, Arc::new(MockSender::default()));

        let (status, body) = get_json(create_router(bot), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["feed"]["status"], "down");
        assert_eq!(body["components"]["notifier"]["status"], "up");
    }

    #[tokio::test]
    async fn test_ready_follows_feed_health() {
        let feed = Arc::new(MockFeed::new(false));
        let bot = test_bot(AppConfig::default(), feed.clone(), Arc::new(MockSender::default()));

        let (status, body) = get_json(create_router(bot.clone()), "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");

        feed.set_healthy(true);
        let (status, body) = get_json(create_router(bot), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
