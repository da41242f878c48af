//! 상태 조회 endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};

use crate::app::{BotStatus, SentinelBot};

/// 전체 봇 상태.
///
/// GET /stats
pub async fn stats(State(bot): State<Arc<SentinelBot>>) -> Json<BotStatus> {
    Json(bot.status().await)
}

/// GET /ping
pub async fn ping() -> &'static str {
    "pong"
}

/// HTML 상태 페이지.
///
/// GET /
pub async fn index(State(bot): State<Arc<SentinelBot>>) -> impl IntoResponse {
    Html(render_index(&bot.status().await))
}

fn display_or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn render_index(status: &BotStatus) -> String {
    let strategy = &status.strategy;
    let connector = &status.connector;
    let state = if status.healthy { "healthy" } else { "degraded" };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Sentinel</title></head>
<body>
<h1>Sentinel {version}</h1>
<p>Status: <b>{state}</b> ({phase})</p>
<table>
<tr><td>Symbol</td><td>{symbol}</td></tr>
<tr><td>Buy level</td><td>{buy}</td></tr>
<tr><td>Sell level</td><td>{sell}</td></tr>
<tr><td>Last price</td><td>{last_price}</td></tr>
<tr><td>Last signal</td><td>{last_signal}</td></tr>
<tr><td>Total signals</td><td>{total_signals}</td></tr>
<tr><td>Messages</td><td>{messages}</td></tr>
<tr><td>Reconnects</td><td>{reconnects}</td></tr>
<tr><td>Uptime</td><td>{uptime}s</td></tr>
</table>
<p><a href="/stats">/stats</a> · <a href="/health">/health</a></p>
</body>
</html>
"#,
        version = status.version,
        state = state,
        phase = connector.phase,
        symbol = strategy.symbol,
        buy = strategy.buy_level,
        sell = strategy.sell_level,
        last_price = display_or_dash(connector.last_price),
        last_signal = display_or_dash(strategy.last_signal),
        total_signals = strategy.total_signals,
        messages = connector.total_messages,
        reconnects = connector.reconnect_count,
        uptime = status.uptime_secs,
    )
}

/// 상태 라우터 생성.
pub fn status_router() -> Router<Arc<SentinelBot>> {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats))
        .route("/ping", get(ping))
}
