//! End-to-end run of one Decision Engine iteration: a live Fusion Engine fed
//! real price ticks, a deterministic orchestrator completion, and a mock
//! broker filling the resulting order.

use aegis_trader::application::calibration::Calibrator;
use aegis_trader::application::decision_engine::{DecisionEngine, DecisionEngineConfig, OutcomeRegistry};
use aegis_trader::application::execution::{
    BridgeConfig, ExecutionBridge, MockBrokerAdapter, Quote,
};
use aegis_trader::application::fusion::{FusionEngine, FusionEngineConfig, PriceStream};
use aegis_trader::application::orchestrator::{InotConfig, MockLlmClient, Orchestrator};
use aegis_trader::domain::analytics::SizingConfig;
use aegis_trader::domain::symbol::StaticSymbolNormalizer;
use aegis_trader::domain::types::{AccountState, Action, AssetClass, FusedEvent, NormalizedSymbolInfo, PriceTick};
use aegis_trader::infrastructure::persistence::{Database, SqliteMemoryStore};
use aegis_trader::infrastructure::resilience::{CircuitBreaker, HealthRegistry, RetryPolicy};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CLEAN_BUY: &str = r#"[
    {"action":"BUY","confidence":0.90,"reasoning":"momentum confirms breakout"},
    {"approved":true,"confidence":0.85,"position_size_adjustment":1.0,"stop_loss_required":true},
    {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
    {"final_decision":{"action":"BUY","lots":0.10,"stop_loss":1.0800,"take_profit":1.0950,"confidence":0.88,"reasoning":"all agents agree"}}
]"#;

#[tokio::test]
async fn test_run_once_drives_clean_buy_through_to_a_filled_order() {
    let price_stream_id = "price:EURUSD".to_string();
    let fusion = Arc::new(FusionEngine::new(FusionEngineConfig {
        sync_window: ChronoDuration::milliseconds(50),
        cleanup_interval: Duration::from_secs(60),
        active_buffer_cap: 100,
        archival_buffer_cap: 20,
    }));
    let price_stream = Arc::new(PriceStream::new(&price_stream_id));
    price_stream.connect().await.unwrap();
    fusion.add_stream(price_stream.clone()).await;
    fusion.start().await;

    let now = Utc::now();
    for (i, close) in [dec!(1.0820), dec!(1.0835), dec!(1.0850)].into_iter().enumerate() {
        price_stream.publish(FusedEvent::Price(PriceTick {
            symbol: "EUR/USD".to_string(),
            timestamp_utc: now + ChronoDuration::seconds(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
            bid: None,
            ask: None,
        }));
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    let orchestrator = Arc::new(Orchestrator::new(
        MockLlmClient::new(CLEAN_BUY),
        InotConfig {
            model_version: "test-model".to_string(),
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 512,
            max_daily_cost_cents: 10_000,
            max_daily_decisions: 1000,
            max_validation_attempts: 2,
            confidence_threshold: 0.5,
            calibration_refit_interval_secs: 3600,
        },
        Calibrator::new(),
    ));

    let adapter = Arc::new(MockBrokerAdapter::new());
    adapter.connect().await.unwrap();
    adapter.prime_quote(
        "EUR/USD",
        Quote {
            bid: dec!(1.0849),
            ask: dec!(1.0851),
            market_open: true,
        },
    );
    let symbol_info = NormalizedSymbolInfo {
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
    };
    adapter.prime_symbol("EUR/USD", symbol_info.clone());

    let normalizer = Arc::new(StaticSymbolNormalizer::new(vec![symbol_info], Duration::from_secs(60)));

    let bridge = Arc::new(ExecutionBridge::new(
        adapter.clone(),
        normalizer,
        CircuitBreaker::new("e2e-test", 3, Duration::from_secs(1), 1),
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(5)),
        BridgeConfig {
            max_spread_pips: dec!(20),
            min_stop_distance_pips: dec!(5),
            pip_size: dec!(0.0001),
        },
    ));

    let db = Database::new("sqlite::memory:").await.expect("in-memory db");
    let memory = Arc::new(SqliteMemoryStore::new(db));

    let engine = DecisionEngine::new(
        DecisionEngineConfig {
            symbol: "EUR/USD".to_string(),
            price_stream_id,
            min_rule_agreement: 0.5,
            sizing: SizingConfig {
                risk_per_trade_percent: dec!(0.01),
                max_positions: 5,
                max_position_size_pct: dec!(0.2),
            },
            default_stop_distance: dec!(0.005),
            pip_size: dec!(0.0001),
        },
        fusion.clone(),
        orchestrator,
        bridge,
        memory,
        Arc::new(HealthRegistry::new()),
        Arc::new(OutcomeRegistry::new()),
    );

    let account = AccountState {
        equity: dec!(100000),
        available_cash: dec!(50000),
        open_position_qty: HashMap::new(),
    };

    let decision = engine.run_once(account).await.expect("fused data should be available");
    assert!(!decision.vetoed);
    assert_eq!(decision.action, Action::Buy);

    fusion.stop().await;
}
