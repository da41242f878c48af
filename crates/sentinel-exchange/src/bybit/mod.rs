//! Bybit v5 공개 스트림.

pub mod connector;
pub mod message;

pub use connector::BybitConnector;
pub use message::{parse_message, InboundMessage, SubscribeRequest};
