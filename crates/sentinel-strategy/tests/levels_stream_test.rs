//! 레벨 전략 통합 테스트
//!
//! 연속된 시세 스트림을 주입하여 방향 전환 시점에만 신호가 나오는지 확인

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_core::{SignalEvent, SignalKind};
use sentinel_strategy::LevelStrategy;

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

/// 여러 개의 가격을 전략에 주입하고 생성된 신호를 모음
fn feed_prices(strategy: &mut LevelStrategy, prices: &[Decimal]) -> Vec<SignalEvent> {
    prices
        .iter()
        .filter_map(|price| strategy.evaluate(*price).unwrap())
        .collect()
}

fn kinds(signals: &[SignalEvent]) -> Vec<SignalKind> {
    signals.iter().map(|s| s.kind).collect()
}

// ============================================================================
// 시나리오
// ============================================================================

#[test]
fn test_oscillating_market_alternates_signals() {
    let mut strategy = LevelStrategy::new("BTCUSDT", dec!(27000), dec!(26000)).unwrap();

    let prices = [
        dec!(26500),
        dec!(27010),
        dec!(27200),
        dec!(26900),
        dec!(27300),
        dec!(25990),
        dec!(25500),
        dec!(26000),
        dec!(27000),
        dec!(27000.01),
    ];
    let signals = feed_prices(&mut strategy, &prices);

    assert_eq!(
        kinds(&signals),
        vec![SignalKind::Buy, SignalKind::Sell, SignalKind::Buy]
    );
    assert_eq!(signals[0].price, dec!(27010));
    assert_eq!(signals[1].price, dec!(25990));
    assert_eq!(signals[2].price, dec!(27000.01));
    assert!(signals.iter().all(|s| s.symbol == "BTCUSDT"));

    assert_eq!(strategy.signal_count(), 3);
    assert_eq!(strategy.last_price(), Some(dec!(27000.01)));
}

#[test]
fn test_level_change_mid_stream() {
    let mut strategy = LevelStrategy::new("BTCUSDT", dec!(27000), dec!(26000)).unwrap();

    let first = feed_prices(&mut strategy, &[dec!(27100), dec!(27500)]);
    assert_eq!(kinds(&first), vec![SignalKind::Buy]);

    // 레벨 변경 후에는 같은 방향이라도 다시 신호가 나온다
    strategy.update_levels(dec!(28000), dec!(27000)).unwrap();
    let second = feed_prices(&mut strategy, &[dec!(27500), dec!(28100), dec!(28200)]);
    assert_eq!(kinds(&second), vec![SignalKind::Buy]);
    assert_eq!(second[0].price, dec!(28100));

    let snapshot = strategy.snapshot();
    assert_eq!(snapshot.buy_level, dec!(28000));
    assert_eq!(snapshot.total_signals, 2);
}

#[test]
fn test_invalid_ticks_do_not_break_stream() {
    let mut strategy = LevelStrategy::new("ETHUSDT", dec!(2000), dec!(1900)).unwrap();

    assert!(strategy.evaluate(dec!(2100)).unwrap().is_some());
    assert!(strategy.evaluate(dec!(-5)).is_err());
    // 잘못된 틱 이후에도 중복 억제 상태가 유지된다
    assert!(strategy.evaluate(dec!(2050)).unwrap().is_none());
    assert_eq!(
        strategy.evaluate(dec!(1850)).unwrap().map(|s| s.kind),
        Some(SignalKind::Sell)
    );
}
