//! Orchestrator decision scenarios mirroring the synthesize/veto and
//! nondeterminism-guard properties documented for the INoT pipeline.

use aegis_trader::application::orchestrator::{InotConfig, MockLlmClient, Orchestrator};
use aegis_trader::application::calibration::Calibrator;
use aegis_trader::domain::memory::MemorySnapshot;
use aegis_trader::domain::types::{AccountState, Action, MarketRegime, MarketRegimeType};
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn ctx() -> aegis_trader::domain::types::FusedContext {
    aegis_trader::domain::types::FusedContext {
        symbol: "EUR/USD".to_string(),
        price: dec!(1.0850),
        rsi: Some(58.0),
        macd: None,
        bollinger: None,
        regime: MarketRegime {
            regime_type: MarketRegimeType::TrendingUp,
            confidence: 0.8,
            volatility_score: 0.6,
            trend_strength: 0.5,
        },
        volatility: 0.6,
        composite_signal: 0.5,
        agreement_score: 0.7,
        latest_news: vec![],
        upcoming_events: vec![],
        account: AccountState {
            equity: dec!(100000),
            available_cash: dec!(50000),
            open_position_qty: HashMap::new(),
        },
        max_risk_per_trade_percent: dec!(0.01),
        default_stop_distance: dec!(0.005),
    }
}

fn config() -> InotConfig {
    InotConfig {
        model_version: "test-model".to_string(),
        temperature: 0.0,
        top_p: 1.0,
        max_tokens: 512,
        max_daily_cost_cents: 10_000,
        max_daily_decisions: 1000,
        max_validation_attempts: 2,
        confidence_threshold: 0.80,
        calibration_refit_interval_secs: 3600,
    }
}

const CLEAN_BUY: &str = r#"[
    {"action":"BUY","confidence":0.90,"reasoning":"momentum confirms breakout"},
    {"approved":true,"confidence":0.85,"position_size_adjustment":1.0,"stop_loss_required":true},
    {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
    {"final_decision":{"action":"BUY","lots":0.10,"stop_loss":1.0800,"take_profit":1.0950,"confidence":0.88,"reasoning":"all agents agree"}}
]"#;

/// S1 Clean BUY: all four agents agree, calibrator untrained (identity map).
#[tokio::test]
async fn test_s1_clean_buy_produces_actionable_decision() {
    let orchestrator = Orchestrator::new(MockLlmClient::new(CLEAN_BUY), config(), Calibrator::new());
    let decision = orchestrator.decide(&ctx(), &MemorySnapshot::empty()).await;

    assert!(!decision.vetoed);
    assert_eq!(decision.action, Action::Buy);
    assert_eq!(decision.lots, dec!(0.10));
    assert_eq!(decision.stop_loss, Some(dec!(1.0800)));
    assert_eq!(decision.take_profit, Some(dec!(1.0950)));
    assert!((decision.confidence - 0.88).abs() < 0.05);
    assert!(orchestrator.meets_confidence_threshold(&decision));
}

const HARD_VETO: &str = r#"[
    {"action":"BUY","confidence":0.90,"reasoning":"momentum confirms breakout"},
    {"approved":false,"confidence":0.85,"position_size_adjustment":1.0,"stop_loss_required":true,"veto_reason":"excess correlation"},
    {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
    {"final_decision":{"action":"BUY","lots":0.10,"stop_loss":1.0800,"take_profit":1.0950,"confidence":0.88,"reasoning":"all agents agree"}}
]"#;

/// S2 Hard veto: the risk agent disapproves, overriding every other agent.
#[tokio::test]
async fn test_s2_hard_veto_forces_hold() {
    let orchestrator = Orchestrator::new(MockLlmClient::new(HARD_VETO), config(), Calibrator::new());
    let decision = orchestrator.decide(&ctx(), &MemorySnapshot::empty()).await;

    assert!(decision.vetoed);
    assert_eq!(decision.action, Action::Hold);
    assert_eq!(decision.lots, rust_decimal::Decimal::ZERO);
    assert_eq!(decision.veto_reason.as_deref(), Some("excess correlation"));
}

const MISSING_STOP_LOSS: &str = r#"[
    {"action":"BUY","confidence":0.85,"reasoning":"momentum confirms breakout"},
    {"approved":true,"confidence":0.8,"position_size_adjustment":1.0,"stop_loss_required":true},
    {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
    {"final_decision":{"action":"BUY","lots":0.10,"take_profit":1.0950,"confidence":0.8,"reasoning":"all agents agree"}}
]"#;

/// S3 Missing stop_loss under requirement: risk demands a stop but synthesis
/// omits one, which must veto regardless of confidence.
#[tokio::test]
async fn test_s3_missing_required_stop_loss_forces_hold() {
    let orchestrator = Orchestrator::new(MockLlmClient::new(MISSING_STOP_LOSS), config(), Calibrator::new());
    let decision = orchestrator.decide(&ctx(), &MemorySnapshot::empty()).await;

    assert!(decision.vetoed);
    assert_eq!(decision.action, Action::Hold);
    assert!(decision
        .veto_reason
        .as_deref()
        .unwrap_or_default()
        .contains("stop_loss_required"));
}

/// S6 LLM nondeterminism guard: at temperature 0 with a deterministic mock,
/// issuing the same context/memory pair twice must yield identical decisions.
#[tokio::test]
async fn test_s6_repeated_context_yields_identical_decision() {
    let orchestrator = Orchestrator::new(MockLlmClient::new(CLEAN_BUY), config(), Calibrator::new());
    let memory = MemorySnapshot::empty();

    let first = orchestrator.decide(&ctx(), &memory).await;
    let second = orchestrator.decide(&ctx(), &memory).await;

    assert_eq!(first.action, second.action);
    assert_eq!(first.lots, second.lots);
    assert_eq!(first.stop_loss, second.stop_loss);
    assert_eq!(first.take_profit, second.take_profit);
    assert!((first.confidence - second.confidence).abs() <= 1e-9);
}
