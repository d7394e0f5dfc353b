//! Resilience layer circuit breaker trip/recovery scenario, exercised
//! directly through the Execution Bridge against a broker adapter primed to
//! fail transiently.

use aegis_trader::application::execution::{
    BridgeConfig, ExecutionBridge, MockBrokerAdapter, Quote,
};
use aegis_trader::domain::symbol::StaticSymbolNormalizer;
use aegis_trader::domain::types::{AssetClass, Direction, NormalizedSymbolInfo, Signal};
use aegis_trader::domain::errors::CoreError;
use aegis_trader::infrastructure::resilience::{CircuitBreaker, RetryPolicy};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn normalizer() -> StaticSymbolNormalizer {
    StaticSymbolNormalizer::new(
        vec![NormalizedSymbolInfo {
            symbol: "EUR/USD".to_string(),
            asset_class: AssetClass::Fx,
            tick_size: dec!(0.00001),
            contract_multiplier: dec!(100000),
            tick_value_quote: dec!(1),
            min_lot: dec!(0.01),
            max_lot: dec!(50),
            lot_step: dec!(0.01),
            base: Some("EUR".to_string()),
            quote: Some("USD".to_string()),
        }],
        Duration::from_secs(60),
    )
}

fn signal() -> Signal {
    Signal {
        symbol: "EUR/USD".to_string(),
        direction: Direction::Long,
        size: dec!(1.0),
        confidence: 0.8,
        stop_loss: Some(dec!(1.0950)),
        take_profit: Some(dec!(1.1100)),
        reasoning: None,
        source_decision_id: "s5-decision".to_string(),
    }
}

/// S5 Circuit trip: three consecutive transient adapter faults open the
/// breaker; the fourth call fails fast without reaching the adapter; after
/// `recovery_timeout`, two successive probes close it again.
#[tokio::test]
async fn test_s5_circuit_trips_then_recovers() {
    let adapter = Arc::new(MockBrokerAdapter::new());
    adapter.connect().await.unwrap();
    adapter.prime_quote(
        "EUR/USD",
        Quote {
            bid: dec!(1.0998),
            ask: dec!(1.1000),
            market_open: true,
        },
    );
    adapter.prime_symbol(
        "EUR/USD",
        NormalizedSymbolInfo {
            symbol: "EUR/USD".to_string(),
            asset_class: AssetClass::Fx,
            tick_size: dec!(0.00001),
            contract_multiplier: dec!(100000),
            tick_value_quote: dec!(1),
            min_lot: dec!(0.01),
            max_lot: dec!(50),
            lot_step: dec!(0.01),
            base: Some("EUR".to_string()),
            quote: Some("USD".to_string()),
        },
    );
    // Three consecutive place_order calls will fail transiently.
    adapter.prime_failures("EUR/USD", 3);

    // max_attempts=1 so each `submit` maps to exactly one breaker outcome.
    let bridge = ExecutionBridge::new(
        adapter,
        Arc::new(normalizer()),
        CircuitBreaker::new("s5-test", 3, Duration::from_millis(30), 2),
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(5)),
        BridgeConfig {
            max_spread_pips: dec!(20),
            min_stop_distance_pips: dec!(5),
            pip_size: dec!(0.0001),
        },
    );

    for attempt in 1..=3 {
        let result = bridge.submit(&signal()).await;
        assert!(result.is_err(), "attempt {attempt} should surface the simulated fault");
        assert!(
            !matches!(result, Err(CoreError::CircuitOpen(_))),
            "attempt {attempt} should fail from the adapter, not an already-open breaker"
        );
    }

    // Fourth call: breaker is now open, adapter must not be reached.
    let fourth = bridge.submit(&signal()).await;
    assert!(matches!(fourth, Err(CoreError::CircuitOpen(_))));

    // After the recovery timeout, two successive probes should close it.
    tokio::time::sleep(Duration::from_millis(40)).await;
    let probe_one = bridge.submit(&signal()).await;
    assert!(probe_one.is_ok(), "first half-open probe should succeed and fill");
    let probe_two = bridge.submit(&signal()).await;
    assert!(probe_two.is_ok(), "second half-open probe should close the breaker");

    // Breaker closed: subsequent calls proceed normally.
    let normal = bridge.submit(&signal()).await;
    assert!(normal.is_ok());
}
