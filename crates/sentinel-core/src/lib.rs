//! # Sentinel Core
//!
//! 시세 감시 봇의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시세 틱 및 매매 신호 타입
//! - 커넥터와 소비자 사이의 이벤트 디스패치
//! - 설정 관리
//! - 로깅 인프라
//! - 공통 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use event::*;
pub use logging::*;
