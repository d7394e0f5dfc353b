//! Execution Bridge market-layer rejection scenario.

use aegis_trader::application::execution::{
    BridgeConfig, ExecutionBridge, MockBrokerAdapter, Quote,
};
use aegis_trader::domain::symbol::StaticSymbolNormalizer;
use aegis_trader::domain::types::{AssetClass, Direction, NormalizedSymbolInfo, Signal};
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
        source_decision_id: "s4-decision".to_string(),
    }
}

/// S4 Spread too wide: current spread (30 pips) exceeds the configured max
/// (20 pips); the adapter must never be invoked and no retry is attempted.
#[tokio::test]
async fn test_s4_wide_spread_rejects_before_adapter_call() {
    let adapter = Arc::new(MockBrokerAdapter::new());
    adapter.connect().await.unwrap();
    // bid/ask 30 pips apart at pip_size 0.0001.
    adapter.prime_quote(
        "EUR/USD",
        Quote {
            bid: dec!(1.0820),
            ask: dec!(1.0850),
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

    let bridge = ExecutionBridge::new(
        adapter,
        Arc::new(normalizer()),
        CircuitBreaker::new("s4-test", 3, Duration::from_secs(1), 1),
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(5)),
        BridgeConfig {
            max_spread_pips: dec!(20),
            min_stop_distance_pips: dec!(5),
            pip_size: dec!(0.0001),
        },
    );

    let result = bridge.submit(&signal()).await;
    assert!(result.is_err(), "wide spread must be rejected before the adapter is called");
}
