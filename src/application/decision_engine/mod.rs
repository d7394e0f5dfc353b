//! Decision Engine (spec.md §4.7): the top-level conductor. Owns one Fusion
//! Engine, Orchestrator, Execution Bridge, Memory Store, Calibrator and
//! Resilience registry; runs one pipeline iteration per tick and drives the
//! background outcome/pattern/calibration tasks.

pub mod context;
pub mod outcome_monitor;

pub use context::build_fused_context;
pub use outcome_monitor::{OpenTrade, OutcomeRegistry};

use crate::application::calibration::Calibrator;
use crate::application::execution::{BridgeConfig, ExecutionBridge};
use crate::application::fusion::FusionEngine;
use crate::application::orchestrator::{LlmClient, Orchestrator};
use crate::domain::analytics::{build_signal, MarketRegimeDetector, SizingConfig};
use crate::domain::errors::StorageError;
use crate::domain::memory::StoredDecision;
use crate::domain::orchestrator::Decision;
use crate::domain::symbol::SymbolNormalizer;
use crate::domain::types::{AccountState, Action, Direction, Signal};
use crate::application::execution::BrokerAdapter;
use crate::infrastructure::persistence::MemoryStore;
use crate::infrastructure::resilience::{HealthRegistry, HealthStatus};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct DecisionEngineConfig {
    pub symbol: String,
    pub price_stream_id: String,
    pub min_rule_agreement: f64,
    pub sizing: SizingConfig,
    pub default_stop_distance: Decimal,
    pub pip_size: Decimal,
}

/// The single conductor wiring together every other component (spec.md §3
/// "Ownership"). Generic over the four dependency-injected boundaries.
pub struct DecisionEngine<A, N, M, C>
where
    A: BrokerAdapter,
    N: SymbolNormalizer,
    M: MemoryStore,
    C: LlmClient,
{
    config: DecisionEngineConfig,
    fusion: Arc<FusionEngine>,
    orchestrator: Arc<Orchestrator<C>>,
    bridge: Arc<ExecutionBridge<A, N>>,
    memory: Arc<M>,
    health: Arc<HealthRegistry>,
    outcomes: Arc<OutcomeRegistry>,
    regime_detector: MarketRegimeDetector,
}

impl<A, N, M, C> DecisionEngine<A, N, M, C>
where
    A: BrokerAdapter,
    N: SymbolNormalizer,
    M: MemoryStore,
    C: LlmClient,
{
    pub fn new(
        config: DecisionEngineConfig,
        fusion: Arc<FusionEngine>,
        orchestrator: Arc<Orchestrator<C>>,
        bridge: Arc<ExecutionBridge<A, N>>,
        memory: Arc<M>,
        health: Arc<HealthRegistry>,
        outcomes: Arc<OutcomeRegistry>,
    ) -> Self {
        Self {
            config,
            fusion,
            orchestrator,
            bridge,
            memory,
            health,
            outcomes,
            regime_detector: MarketRegimeDetector::new(20, 0.3, 1.5),
        }
    }

    /// Runs one pipeline iteration (spec.md §4.7 steps 1-8). Returns the
    /// decision actually taken (None if no FusedContext could be built yet).
    #[tracing::instrument(skip(self, account), fields(symbol = %self.config.symbol))]
    pub async fn run_once(&self, account: AccountState) -> Option<Decision> {
        // Step 1: pull the latest aligned snapshots.
        let snapshots = self.fusion.latest(64);
        if snapshots.is_empty() {
            self.health.report("fusion", HealthStatus::Degraded);
            return None;
        }

        // Step 2: compute tool outputs and build the FusedContext.
        let ctx = build_fused_context(
            &snapshots,
            &self.config.symbol,
            &self.config.price_stream_id,
            &self.regime_detector,
            account,
            self.config.sizing.risk_per_trade_percent,
            self.config.default_stop_distance,
        )?;

        // Step 3: load the MemorySnapshot.
        let memory_snapshot = match self.memory.load_snapshot(30, Some(&self.config.symbol)).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "failed to load memory snapshot, proceeding with empty one");
                self.health.report("memory", HealthStatus::Degraded);
                crate::domain::memory::MemorySnapshot::empty()
            }
        };

        // Step 4-5: orchestrator-vs-rules policy.
        let use_orchestrator = self.orchestrator.check_budget().is_ok();
        let decision = if use_orchestrator {
            self.orchestrator.decide(&ctx, &memory_snapshot).await
        } else {
            info!("daily budget exhausted, falling back to rule tree");
            self.rule_tree_decision(&ctx)
        };

        if !decision.vetoed && !self.orchestrator.meets_confidence_threshold(&decision) {
            info!(confidence = decision.confidence, "decision below confidence threshold, treating as HOLD");
        }

        // Step 6: persist with full provenance.
        let decision_id = Uuid::new_v4().to_string();
        let stored = StoredDecision {
            id: decision_id.clone(),
            timestamp_utc: Utc::now(),
            symbol: ctx.symbol.clone(),
            action: decision.action,
            confidence: decision.confidence,
            lots: decision.lots,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            price: ctx.price,
            rsi: ctx.rsi,
            macd: ctx.macd.map(|(m, _, _)| m),
            bb_position: ctx.bollinger.map(|(_, mid, _)| format!("{mid:.5}")),
            regime: Some(ctx.regime.regime_type),
            signal_agent_output: Some(decision.signal_agent_output.clone()),
            risk_agent_output: Some(decision.risk_agent_output.clone()),
            context_agent_output: Some(decision.context_agent_output.clone()),
            synthesis_agent_output: Some(decision.synthesis_agent_output.clone()),
            vetoed: decision.vetoed,
            veto_reason: decision.veto_reason.clone(),
        };
        if let Err(err) = self.memory.save_decision(&stored).await {
            warn!(%err, "failed to persist decision");
            self.health.report("memory", HealthStatus::Unhealthy);
        }

        // Step 7: size and submit if actionable.
        let actionable = !decision.vetoed
            && decision.action != Action::Hold
            && self.orchestrator.meets_confidence_threshold(&decision);

        if actionable {
            self.submit_decision(&ctx.symbol, &decision, &decision_id, ctx.price).await;
        }

        // Step 8: update health probes.
        self.health.report("fusion", HealthStatus::Healthy);
        self.health.report("decision_engine", HealthStatus::Healthy);

        Some(decision)
    }

    /// Deterministic rule-tree fallback (spec.md §4.7 step 5), same Decision
    /// shape as the orchestrator path but never vetoed by the hard-veto rules
    /// since there is no risk agent — stop_loss is always attached instead.
    fn rule_tree_decision(&self, ctx: &crate::domain::types::FusedContext) -> Decision {
        let temp_id = "rule-tree";
        match build_signal(ctx, &self.config.sizing, None, self.config.min_rule_agreement, temp_id) {
            Some(signal) => Decision {
                action: match signal.direction {
                    Direction::Long => Action::Buy,
                    Direction::Short => Action::Sell,
                },
                lots: signal.size,
                stop_loss: signal.stop_loss,
                take_profit: signal.take_profit,
                confidence: signal.confidence,
                vetoed: false,
                veto_reason: None,
                reasoning: signal.reasoning.unwrap_or_default(),
                signal_agent_output: serde_json::Value::Null,
                risk_agent_output: serde_json::Value::Null,
                context_agent_output: serde_json::Value::Null,
                synthesis_agent_output: serde_json::Value::Null,
            },
            None => Decision::safe_hold("rule tree found no actionable signal"),
        }
    }

    #[tracing::instrument(skip(self, decision, entry_price), fields(%symbol, %decision_id, action = ?decision.action))]
    async fn submit_decision(&self, symbol: &str, decision: &Decision, decision_id: &str, entry_price: Decimal) {
        let direction = match decision.action {
            Action::Buy => Direction::Long,
            Action::Sell => Direction::Short,
            Action::Hold => return,
        };

        let size = match self.bridge.normalizer().round_lot(symbol, decision.lots).await {
            Ok(rounded) => rounded,
            Err(err) => {
                warn!(%err, "failed to round order size to lot grid, skipping submission");
                self.health.report("execution", HealthStatus::Degraded);
                return;
            }
        };

        let signal = Signal {
            symbol: symbol.to_string(),
            direction,
            size,
            confidence: decision.confidence,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            reasoning: Some(decision.reasoning.clone()),
            source_decision_id: decision_id.to_string(),
        };

        match self.bridge.submit(&signal).await {
            Ok(result) if result.success => {
                if let Some(order_id) = result.order_id.clone() {
                    if let Err(err) = self.memory.record_order_id(decision_id, &order_id).await {
                        warn!(%err, "failed to persist order id, restart reconciliation will miss this trade");
                    }
                    self.outcomes.register(OpenTrade {
                        order_id,
                        decision_id: decision_id.to_string(),
                        direction,
                        entry_price: result.fill_price.unwrap_or(entry_price),
                        opened_at: Utc::now(),
                        pip_size: self.config.pip_size,
                    });
                }
                self.health.report("execution", HealthStatus::Healthy);
            }
            Ok(result) => {
                warn!(status = ?result.status, "order submission did not succeed");
                self.health.report("execution", HealthStatus::Degraded);
            }
            Err(err) => {
                warn!(%err, "order submission failed");
                self.health.report("execution", HealthStatus::Unhealthy);
            }
        }
    }

    /// Background task: polls open trades for close events and records
    /// outcomes (spec.md §4.7 "Outcome tracking").
    pub async fn poll_outcomes_once(&self, adapter: &A) -> usize {
        outcome_monitor::poll_once(&self.outcomes, adapter, self.memory.as_ref()).await
    }

    /// Periodic task: aggregates closed decisions into the pattern table.
    pub async fn rebuild_patterns_once(&self) -> Result<u64, StorageError> {
        self.memory.rebuild_patterns().await
    }

    /// Periodic task: refits the orchestrator's own calibrator from the
    /// outcomes window (spec.md §4.7 "periodically, the calibrator refits").
    pub async fn refit_calibrator_once(&self, window: i64) {
        match self.memory.recent_calibration_pairs(window).await {
            Ok(pairs) if !pairs.is_empty() => {
                self.orchestrator.calibrator().refit(&pairs);
                info!(samples = pairs.len(), "calibrator refit completed");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "failed to load calibration pairs"),
        }
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::execution::MockBrokerAdapter;
    use crate::application::fusion::FusionEngineConfig;
    use crate::application::orchestrator::{InotConfig, MockLlmClient};
    use crate::domain::symbol::StaticSymbolNormalizer;
    use crate::infrastructure::persistence::{Database, SqliteMemoryStore};
    use crate::infrastructure::resilience::{CircuitBreaker, RetryPolicy};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    fn inot_config() -> InotConfig {
        InotConfig {
            model_version: "test-model".to_string(),
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 512,
            max_daily_cost_cents: 10_000,
            max_daily_decisions: 1000,
            max_validation_attempts: 2,
            confidence_threshold: 0.0,
            calibration_refit_interval_secs: 3600,
        }
    }

    async fn engine() -> DecisionEngine<MockBrokerAdapter, StaticSymbolNormalizer, SqliteMemoryStore, MockLlmClient> {
        let fusion = Arc::new(FusionEngine::new(FusionEngineConfig::default()));

        let orchestrator = Arc::new(Orchestrator::new(
            MockLlmClient::new("not json, forces rule-tree-equivalent safe hold"),
            inot_config(),
            Calibrator::new(),
        ));

        let adapter = Arc::new(MockBrokerAdapter::new());
        let normalizer = Arc::new(StaticSymbolNormalizer::new(vec![], Duration::from_secs(60)));
        let bridge = Arc::new(ExecutionBridge::new(
            adapter,
            normalizer,
            CircuitBreaker::new("test", 3, Duration::from_secs(1), 1),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(5)),
            BridgeConfig {
                max_spread_pips: dec!(20),
                min_stop_distance_pips: dec!(5),
                pip_size: dec!(0.0001),
            },
        ));

        let db = Database::new("sqlite::memory:").await.expect("in-memory db");
        let memory = Arc::new(SqliteMemoryStore::new(db));

        DecisionEngine::new(
            DecisionEngineConfig {
                symbol: "EUR/USD".to_string(),
                price_stream_id: "price:EURUSD".to_string(),
                min_rule_agreement: 0.5,
                sizing: SizingConfig {
                    risk_per_trade_percent: dec!(0.01),
                    max_positions: 5,
                    max_position_size_pct: dec!(0.2),
                },
                default_stop_distance: dec!(0.005),
                pip_size: dec!(0.0001),
            },
            fusion,
            orchestrator,
            bridge,
            memory,
            Arc::new(HealthRegistry::new()),
            Arc::new(OutcomeRegistry::new()),
        )
    }

    fn account() -> AccountState {
        AccountState {
            equity: dec!(100000),
            available_cash: dec!(50000),
            open_position_qty: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_run_once_returns_none_without_fused_data() {
        let engine = engine().await;
        let decision = engine.run_once(account()).await;
        assert!(decision.is_none());
        assert_eq!(engine.health().overall(), HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_rebuild_patterns_once_runs_without_data() {
        let engine = engine().await;
        let upserted = engine.rebuild_patterns_once().await.unwrap();
        assert_eq!(upserted, 0);
    }

    #[tokio::test]
    async fn test_refit_calibrator_once_skips_on_empty_window() {
        let engine = engine().await;
        engine.refit_calibrator_once(1000).await;
        assert!(!engine.orchestrator.calibrator().is_active());
    }
}
