//! 시세 감시 봇 실행 파일.
//!
//! 설정을 로드하고 봇과 상태 서버를 시작합니다.
//! Ctrl+C, SIGTERM, SIGHUP을 받으면 종료 알림을 보낸 뒤 정상 종료하며,
//! 종료 중 두 번째 시그널을 받으면 즉시 종료 코드 130으로 끝납니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sentinel_bot::{create_router, SentinelBot};
use sentinel_core::{init_logging, AppConfig, LogConfig};

/// 강제 종료 시 종료 코드 (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

/// 단일 심볼 레벨 감시 봇.
#[derive(Debug, Parser)]
#[command(name = "sentinel", version, about)]
struct Cli {
    /// 설정 파일 경로 (TOML/YAML/JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 로그 레벨 (설정 파일보다 우선)
    #[arg(long)]
    log_level: Option<String>,

    /// 로그 형식: pretty, json, compact
    #[arg(long)]
    log_format: Option<String>,

    /// 설정만 검증하고 종료
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e).context("invalid configuration");
    }

    if cli.check_config {
        info!(config = ?config, "Configuration is valid");
        return Ok(());
    }

    let addr = config.server.bind_addr();
    let bot = Arc::new(SentinelBot::from_config(config).context("failed to build bot")?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind status server on {}", addr))?;
    info!(%addr, "Status server listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = {
        let app = create_router(Arc::clone(&bot));
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
        })
    };

    let result = Arc::clone(&bot).run(shutdown.clone()).await;

    // 봇이 먼저 끝난 경우(시작 실패)에도 서버를 멈춘다
    shutdown.cancel();
    match server.await {
        Ok(Ok(())) => info!("Status server stopped"),
        Ok(Err(e)) => warn!(error = %e, "Status server error"),
        Err(e) => warn!(error = %e, "Status server task failed"),
    }

    result.context("sentinel failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// 종료 시그널 대기.
///
/// 첫 시그널은 종료 토큰을 취소하고, 두 번째 시그널은 프로세스를 즉시 종료합니다.
async fn shutdown_signal(shutdown: CancellationToken) {
    let name = wait_for_signal().await;
    warn!(signal = name, "Received shutdown signal, stopping gracefully");
    shutdown.cancel();

    let name = wait_for_signal().await;
    warn!(signal = name, "Received second signal, forcing exit");
    std::process::exit(FORCED_EXIT_CODE);
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(tokio::signal::unix::SignalKind::terminate());
    #[cfg(unix)]
    let hangup = unix_signal(tokio::signal::unix::SignalKind::hangup());

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
        _ = hangup => "SIGHUP",
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}
