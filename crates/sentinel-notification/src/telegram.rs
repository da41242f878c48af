//! 텔레그램 알림 서비스.
//!
//! Telegram Bot API(`sendMessage`, `getMe`)로 봇 수명 주기와 매매 신호를 전송합니다.
//! 요청은 `max_retries`회까지 `retry_delay` 간격으로 재시도하며,
//! 429 응답의 `retry_after`가 더 길면 그만큼 기다립니다 (최대 `MAX_RETRY_AFTER`).
//! 인증 실패(401/404)는 재시도하지 않습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::types::{
    Notification, NotificationError, NotificationEvent, NotificationResult, NotificationSender,
    NotifierStats,
};

/// Telegram Bot API 기본 URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// 429 응답의 `retry_after`를 따르는 최대 대기 시간.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// 텔레그램 알림 전송 설정.
#[derive(Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// 메시지를 보낼 채팅 ID
    pub chat_id: String,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 파싱 모드 (HTML 또는 MarkdownV2)
    pub parse_mode: String,
    /// Bot API 기본 URL
    pub api_base: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 간격
    pub retry_delay: Duration,
}

impl TelegramConfig {
    /// 새 텔레그램 설정을 생성합니다.
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            enabled: true,
            parse_mode: "HTML".to_string(),
            api_base: TELEGRAM_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 실패한 요청 다음 시도까지의 대기 시간.
    fn retry_wait(&self, error: &NotificationError) -> Duration {
        match error.retry_after() {
            Some(after) => self.retry_delay.max(after.min(MAX_RETRY_AFTER)),
            None => self.retry_delay,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    /// 토큰을 가린 API URL.
    pub fn masked_api_url(&self) -> String {
        format!("{}/bot*****", self.api_base.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"*****")
            .field("chat_id", &self.chat_id)
            .field("enabled", &self.enabled)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl From<&sentinel_core::TelegramConfig> for TelegramConfig {
    fn from(config: &sentinel_core::TelegramConfig) -> Self {
        Self {
            enabled: config.enabled,
            api_base: config.api_base.clone(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            ..Self::new(config.bot_token.clone(), config.chat_id.clone())
        }
    }
}

// ============================================================================
// 메시지 포맷
// ============================================================================

/// HTML 특수문자를 이스케이프합니다.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 가격을 천 단위 구분자와 소수 둘째 자리로 포맷합니다 (예: 27,050.50).
fn format_price(price: Decimal) -> String {
    let formatted = format!("{:.2}", price.round_dp(2));
    let (sign, digits) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{frac_part}")
}

/// 가동 시간을 "1일 02:03:04" 형식으로 포맷합니다.
fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let clock = format!("{:02}:{:02}:{:02}", rem / 3600, rem % 3600 / 60, rem % 60);
    if days > 0 {
        format!("{days}일 {clock}")
    } else {
        clock
    }
}

/// 알림을 텔레그램 HTML 메시지로 포맷합니다.
pub fn format_message(notification: &Notification) -> String {
    let timestamp = notification.timestamp;
    match &notification.event {
        NotificationEvent::Startup {
            symbol,
            buy_level,
            sell_level,
            endpoint,
        } => format!(
            "🤖 <b>시세 감시 봇 시작</b>\n\n\
             📊 심볼: <code>{}</code>\n\
             📈 매수 레벨: <code>{}</code>\n\
             📉 매도 레벨: <code>{}</code>\n\
             ⏰ 시작 시각: <code>{}</code>\n\
             🌐 WebSocket: <code>{}</code>",
            escape_html(symbol),
            format_price(*buy_level),
            format_price(*sell_level),
            timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            escape_html(endpoint),
        ),

        NotificationEvent::Signal {
            symbol,
            kind,
            price,
        } => format!(
            "{} <b>{} 신호</b>\n\n\
             📊 방향: <b>{}</b>\n\
             💰 가격: <code>{}</code>\n\
             ⏰ 시각: <code>{}</code>",
            kind.emoji(),
            escape_html(symbol),
            kind,
            format_price(*price),
            timestamp.format("%H:%M:%S UTC"),
        ),

        NotificationEvent::Shutdown {
            uptime,
            reconnect_count,
            total_signals,
            last_signal,
        } => format!(
            "🛑 <b>시세 감시 봇 종료</b>\n\n\
             ⏱️ 가동 시간: <code>{}</code>\n\
             🔄 재연결: <code>{}</code>\n\
             📊 총 신호: <code>{}</code>\n\
             🎯 마지막 신호: <code>{}</code>",
            format_uptime(*uptime),
            reconnect_count,
            total_signals,
            last_signal
                .map(|k| k.to_string())
                .unwrap_or_else(|| "없음".to_string()),
        ),
    }
}

// ============================================================================
// 응답 해석
// ============================================================================

fn description(body: &Value, fallback: &str) -> String {
    body.get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// HTTP 상태와 본문을 Bot API 결과로 변환합니다.
fn interpret_response(status: u16, body: &str) -> NotificationResult<Value> {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    match status {
        200..=299 => {
            if parsed.get("ok").and_then(Value::as_bool) == Some(true) {
                Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
            } else {
                Err(NotificationError::SendFailed(description(
                    &parsed,
                    "response without ok=true",
                )))
            }
        }
        429 => {
            let retry_after = parsed
                .pointer("/parameters/retry_after")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            Err(NotificationError::RateLimited(retry_after))
        }
        401 | 404 => Err(NotificationError::Unauthorized(description(
            &parsed,
            "invalid bot token",
        ))),
        _ => Err(NotificationError::SendFailed(format!(
            "HTTP {}: {}",
            status,
            description(&parsed, body)
        ))),
    }
}

// ============================================================================
// 전송기
// ============================================================================

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    last_message_at: Mutex<Option<DateTime<Utc>>>,
}

impl TelegramSender {
    /// 새 텔레그램 전송기를 생성합니다.
    pub fn new(config: TelegramConfig) -> NotificationResult<Self> {
        if config.enabled && (config.bot_token.is_empty() || config.chat_id.is_empty()) {
            return Err(NotificationError::InvalidConfig(
                "bot_token and chat_id are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        info!(chat_id = %config.chat_id, enabled = config.enabled, "Telegram sender initialized");

        Ok(Self {
            config,
            client,
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            last_message_at: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn message_payload(&self, text: &str) -> Value {
        json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": self.config.parse_mode,
            "disable_web_page_preview": true,
        })
    }

    fn record(&self, result: &NotificationResult<()>) {
        match result {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                *self
                    .last_message_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
            }
            Err(_) => {
                self.messages_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn request_once(&self, url: &str, payload: Option<&Value>) -> NotificationResult<Value> {
        let request = match payload {
            Some(body) => self.client.post(url).json(body),
            None => self.client.get(url),
        };
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_response(status, &body)
    }

    /// 재시도를 포함한 Bot API 호출.
    async fn call(&self, method: &str, payload: Option<&Value>) -> NotificationResult<Value> {
        let url = self.config.method_url(method);
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.request_once(&url, payload).await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(method, attempt, attempts, error = %e, "Telegram request failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_wait(&e)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| NotificationError::SendFailed("no attempt made".to_string())))
    }
}

/// 전용 OS 스레드에서 사용하는 동기 전송.
fn send_blocking_with_retry(config: &TelegramConfig, payload: &Value) -> NotificationResult<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(config.timeout)
        .build()?;
    let url = config.method_url("sendMessage");
    let attempts = config.max_retries.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = client
            .post(&url)
            .json(payload)
            .send()
            .map_err(NotificationError::from)
            .and_then(|response| {
                let status = response.status().as_u16();
                let body = response.text()?;
                interpret_response(status, &body)
            });

        match result {
            Ok(_) => return Ok(()),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Blocking Telegram request failed");
                if attempt < attempts {
                    std::thread::sleep(config.retry_wait(&e));
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| NotificationError::SendFailed("no attempt made".to_string())))
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("Telegram notifications are disabled, skipping");
            return Ok(());
        }

        let payload = self.message_payload(&format_message(notification));
        let result = self.call("sendMessage", Some(&payload)).await.map(|_| ());
        self.record(&result);

        if result.is_ok() {
            debug!(event = notification.event.label(), "Telegram notification sent");
        }
        result
    }

    fn send_blocking(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("Telegram notifications are disabled, skipping");
            return Ok(());
        }

        let payload = self.message_payload(&format_message(notification));
        let config = self.config.clone();

        // 런타임 컨텍스트 밖에서 blocking 클라이언트를 사용
        let result = std::thread::Builder::new()
            .name("telegram-blocking".to_string())
            .spawn(move || send_blocking_with_retry(&config, &payload))
            .map_err(|e| NotificationError::SendFailed(format!("thread spawn failed: {}", e)))?
            .join()
            .unwrap_or_else(|_| {
                Err(NotificationError::SendFailed(
                    "blocking sender thread panicked".to_string(),
                ))
            });

        self.record(&result);
        if result.is_ok() {
            debug!(event = notification.event.label(), "Telegram notification sent (blocking)");
        }
        result
    }

    async fn verify(&self) -> NotificationResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let me = self.call("getMe", None).await?;
        let username = me
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(bot = %username, "Telegram bot verified");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty() && !self.config.chat_id.is_empty()
    }

    fn name(&self) -> &str {
        "telegram"
    }

    fn stats(&self) -> NotifierStats {
        let sent = self.messages_sent.load(Ordering::Relaxed);
        let failed = self.messages_failed.load(Ordering::Relaxed);
        NotifierStats {
            name: self.name().to_string(),
            enabled: self.is_enabled(),
            messages_sent: sent,
            messages_failed: failed,
            success_rate: NotifierStats::success_rate(sent, failed),
            last_message_at: *self
                .last_message_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            api_url: self.config.masked_api_url(),
        }
    }
}
