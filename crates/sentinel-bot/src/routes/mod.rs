//! 상태 조회 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness, 항상 200)
//! - `/health/ready` - 피드 상태 기반 readiness (200 / 503)
//! - `/stats` - 전체 봇 상태 JSON
//! - `/ping` - `pong`
//! - `/` - HTML 상태 페이지

pub mod health;
pub mod status;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use status::status_router;

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app::SentinelBot;
use crate::error::ErrorResponse;

/// 전체 라우터 생성.
pub fn create_router(bot: Arc<SentinelBot>) -> Router {
    Router::new()
        .nest("/health", health_router())
        .merge(status_router())
        .fallback(not_found)
        .with_state(bot)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
}

async fn not_found() -> impl IntoResponse {
    ErrorResponse::new(StatusCode::NOT_FOUND)
}
