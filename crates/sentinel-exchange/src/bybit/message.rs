//! Bybit v5 public WebSocket 메시지 타입.
//!
//! 수신 메시지는 세 종류로 분류합니다:
//! - 티커: `{"topic":"tickers.BTCUSDT","data":{"lastPrice":"27050.5",...}}`
//! - 운영 메시지: `{"op":"subscribe","success":true,"ret_msg":""}` (구독 응답, pong)
//! - 그 외 JSON: 무시

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExchangeError, ExchangeResult};

// ============================================================================
// 송신 메시지
// ============================================================================

/// 구독 요청.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub op: String,
    pub args: Vec<String>,
}

impl SubscribeRequest {
    /// 단일 토픽 구독 요청 (예: "tickers.BTCUSDT").
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: vec![topic.into()],
        }
    }

    pub fn to_json(&self) -> ExchangeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// 수신 메시지
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: Option<String>,
    success: Option<bool>,
    ret_msg: Option<String>,
    topic: Option<String>,
    data: Option<Value>,
}

/// 분류된 수신 메시지.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// 시세 업데이트
    Ticker {
        topic: Option<String>,
        last_price: Decimal,
    },
    /// 운영 메시지 (구독 응답, pong 등)
    Operation {
        op: String,
        success: Option<bool>,
        ret_msg: Option<String>,
    },
    /// 처리하지 않는 메시지
    Other,
}

impl InboundMessage {
    /// 실패한 구독 응답인지 확인.
    pub fn is_rejected_subscription(&self) -> bool {
        matches!(
            self,
            InboundMessage::Operation { op, success: Some(false), .. } if op == "subscribe"
        )
    }
}

fn parse_price(value: &Value) -> ExchangeResult<Option<Decimal>> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(|e| ExchangeError::ParseError(format!("invalid lastPrice {:?}: {}", s, e))),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .map(Some)
            .map_err(|e| ExchangeError::ParseError(format!("invalid lastPrice {}: {}", n, e))),
        other => Err(ExchangeError::ParseError(format!(
            "unexpected lastPrice type: {}",
            other
        ))),
    }
}

/// 텍스트 프레임을 분류합니다.
///
/// JSON이 아니거나 `lastPrice`를 해석할 수 없으면 `ParseError`를 반환합니다.
pub fn parse_message(text: &str) -> ExchangeResult<InboundMessage> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Ok(InboundMessage::Other);
    }
    let frame: RawFrame = serde_json::from_value(value)?;

    if let Some(op) = frame.op {
        return Ok(InboundMessage::Operation {
            op,
            success: frame.success,
            ret_msg: frame.ret_msg.filter(|m| !m.is_empty()),
        });
    }

    let Some(Value::Object(data)) = frame.data else {
        return Ok(InboundMessage::Other);
    };

    let Some(raw_price) = data.get("lastPrice") else {
        return Ok(InboundMessage::Other);
    };

    match parse_price(raw_price)? {
        Some(last_price) => Ok(InboundMessage::Ticker {
            topic: frame.topic,
            last_price,
        }),
        None => Ok(InboundMessage::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscribe_request_format() {
        let json = SubscribeRequest::new("tickers.BTCUSDT").to_json().unwrap();
        assert_eq!(json, r#"{"op":"subscribe","args":["tickers.BTCUSDT"]}"#);
    }

    #[test]
    fn test_parse_ticker() {
        let text = r#"{"topic":"tickers.BTCUSDT","ts":1673853746003,"type":"snapshot","cs":2588407389,
            "data":{"symbol":"BTCUSDT","lastPrice":"27050.50","highPrice24h":"27500"}}"#;

        let msg = parse_message(text).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Ticker {
                topic: Some("tickers.BTCUSDT".to_string()),
                last_price: dec!(27050.50),
            }
        );
    }

    #[test]
    fn test_parse_numeric_price() {
        let msg = parse_message(r#"{"data":{"lastPrice":26000.25}}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Ticker { last_price, .. } if last_price == dec!(26000.25)));
    }

    #[test]
    fn test_operation_is_never_a_ticker() {
        let ack = parse_message(
            r#"{"success":true,"ret_msg":"","conn_id":"abc","req_id":"","op":"subscribe"}"#,
        )
        .unwrap();
        assert_eq!(
            ack,
            InboundMessage::Operation {
                op: "subscribe".to_string(),
                success: Some(true),
                ret_msg: None,
            }
        );
        assert!(!ack.is_rejected_subscription());

        let rejected = parse_message(
            r#"{"success":false,"ret_msg":"error:handler not found,topic:tickers.NOPE","op":"subscribe"}"#,
        )
        .unwrap();
        assert!(rejected.is_rejected_subscription());

        let pong = parse_message(r#"{"op":"pong","success":true,"data":{"lastPrice":"1"}}"#).unwrap();
        assert!(matches!(pong, InboundMessage::Operation { .. }));
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(parse_message(r#"{"topic":"x","data":[1,2]}"#).unwrap(), InboundMessage::Other);
        assert_eq!(parse_message(r#"{"data":{"bid1Price":"1"}}"#).unwrap(), InboundMessage::Other);
        assert_eq!(parse_message(r#"{"data":{"lastPrice":""}}"#).unwrap(), InboundMessage::Other);
        assert_eq!(parse_message("{}").unwrap(), InboundMessage::Other);
        assert_eq!(parse_message("[1,2,3]").unwrap(), InboundMessage::Other);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_message("not json"), Err(ExchangeError::ParseError(_))));
        assert!(matches!(
            parse_message(r#"{"data":{"lastPrice":"abc"}}"#),
            Err(ExchangeError::ParseError(_))
        ));
        assert!(matches!(
            parse_message(r#"{"data":{"lastPrice":null}}"#),
            Err(ExchangeError::ParseError(_))
        ));
    }
}
