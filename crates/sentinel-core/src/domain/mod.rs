//! 시세 감시를 위한 도메인 모델.

mod market_data;
mod signal;

pub use market_data::*;
pub use signal::*;
