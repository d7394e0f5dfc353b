//! INoT Orchestrator glue: assembles the prompt, drives the LLM call through
//! a retry policy with a stricter postscript on validation failure, applies
//! the system-enforced veto/synthesis rules, then the calibrator.

use crate::application::calibration::Calibrator;
use crate::application::orchestrator::llm_client::{LlmClient, LlmError, LlmRequest};
use crate::application::orchestrator::prompt::{build_system_prompt, build_user_prompt};
use crate::application::orchestrator::validate::parse_and_validate;
use crate::domain::errors::BudgetExceededError;
use crate::domain::memory::MemorySnapshot;
use crate::domain::orchestrator::{synthesize, Decision};
use crate::domain::types::FusedContext;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{info, warn};

pub struct InotConfig {
    pub model_version: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub max_daily_cost_cents: u64,
    pub max_daily_decisions: u32,
    pub max_validation_attempts: u32,
    /// Minimum post-calibration confidence an un-vetoed decision must carry
    /// before the Decision Engine will act on it (spec.md §6 `inot.confidence_threshold`).
    pub confidence_threshold: f64,
    /// Cadence, in seconds, at which the Decision Engine refits the calibrator
    /// from accumulated outcomes (spec.md §6 `inot.calibration_refit_interval_secs`).
    pub calibration_refit_interval_secs: u64,
}

/// Per-day decision/cost counters; reset externally at day boundary by the
/// Decision Engine's scheduling loop.
struct BudgetCounters {
    decisions_today: AtomicU32,
    cost_cents_today: AtomicU64,
    day: RwLock<chrono::NaiveDate>,
}

impl BudgetCounters {
    fn new() -> Self {
        Self {
            decisions_today: AtomicU32::new(0),
            cost_cents_today: AtomicU64::new(0),
            day: RwLock::new(chrono::Utc::now().date_naive()),
        }
    }

    fn roll_if_new_day(&self) {
        let today = chrono::Utc::now().date_naive();
        let mut day = self.day.write().expect("budget day lock poisoned");
        if *day != today {
            *day = today;
            self.decisions_today.store(0, Ordering::SeqCst);
            self.cost_cents_today.store(0, Ordering::SeqCst);
        }
    }
}

pub struct Orchestrator<C: LlmClient> {
    llm: C,
    config: InotConfig,
    calibrator: Calibrator,
    budget: BudgetCounters,
}

impl<C: LlmClient> Orchestrator<C> {
    pub fn new(llm: C, config: InotConfig, calibrator: Calibrator) -> Self {
        Self {
            llm,
            config,
            calibrator,
            budget: BudgetCounters::new(),
        }
    }

    /// Fails fast with `BudgetExceeded` when daily quotas are hit; the
    /// Decision Engine treats this as a signal to fall back to rules.
    pub fn check_budget(&self) -> Result<(), BudgetExceededError> {
        self.budget.roll_if_new_day();

        let decisions = self.budget.decisions_today.load(Ordering::SeqCst);
        if decisions >= self.config.max_daily_decisions {
            return Err(BudgetExceededError {
                resource: "daily_decisions".to_string(),
                limit: self.config.max_daily_decisions as u64,
                used: decisions as u64,
            });
        }

        let cost = self.budget.cost_cents_today.load(Ordering::SeqCst);
        if cost >= self.config.max_daily_cost_cents {
            return Err(BudgetExceededError {
                resource: "daily_cost_cents".to_string(),
                limit: self.config.max_daily_cost_cents,
                used: cost,
            });
        }

        Ok(())
    }

    /// Whether a decision's (post-calibration) confidence clears the acting
    /// threshold; vetoed decisions are exempt since they never reach execution.
    pub fn meets_confidence_threshold(&self, decision: &Decision) -> bool {
        decision.vetoed || decision.confidence >= self.config.confidence_threshold
    }

    pub fn calibration_refit_interval_secs(&self) -> u64 {
        self.config.calibration_refit_interval_secs
    }

    /// Exposes the owned Calibrator so a periodic task can refit it from
    /// fresh outcomes; `Calibrator` is internally synchronized so `&self`
    /// suffices (spec.md §5 "copy-on-update").
    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    #[tracing::instrument(skip(self, ctx, memory), fields(symbol = %ctx.symbol))]
    pub async fn decide(&self, ctx: &FusedContext, memory: &MemorySnapshot) -> Decision {
        let system_prompt = build_system_prompt();
        let base_user_prompt = build_user_prompt(ctx, memory);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let user_prompt = if attempt == 1 {
                base_user_prompt.clone()
            } else {
                format!(
                    "{base_user_prompt}\n\nSTRICT: respond with exactly one JSON array of four objects, no prose, no trailing commas."
                )
            };

            let request = LlmRequest {
                system_prompt: system_prompt.clone(),
                user_prompt,
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_tokens: self.config.max_tokens,
            };

            let completion = match self.llm.complete(&request).await {
                Ok(text) => text,
                Err(LlmError::Transient(reason)) if attempt < self.config.max_validation_attempts => {
                    warn!(attempt, reason, "transient LLM failure, retrying");
                    continue;
                }
                Err(err) => {
                    warn!(%err, "LLM call failed permanently");
                    return Decision::safe_hold("reasoning failure");
                }
            };

            match parse_and_validate(&completion) {
                Ok(outputs) => {
                    self.budget.decisions_today.fetch_add(1, Ordering::SeqCst);
                    let mut decision = synthesize(&outputs)
                        .unwrap_or_else(|_| Decision::safe_hold("reasoning failure"));
                    if !decision.vetoed {
                        decision.confidence = self.calibrator.map(decision.confidence);
                    }
                    info!(action = ?decision.action, vetoed = decision.vetoed, "orchestrator decision produced");
                    return decision;
                }
                Err(err) if attempt < self.config.max_validation_attempts => {
                    warn!(attempt, %err, "validation failed, retrying with stricter prompt");
                    continue;
                }
                Err(_) => {
                    return Decision::safe_hold("reasoning failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::llm_client::MockLlmClient;
    use crate::domain::types::{AccountState, Action, MarketRegime, MarketRegimeType};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn ctx() -> FusedContext {
        FusedContext {
            symbol: "EUR/USD".to_string(),
            price: dec!(1.10),
            rsi: Some(60.0),
            macd: None,
            bollinger: None,
            regime: MarketRegime {
                regime_type: MarketRegimeType::TrendingUp,
                confidence: 0.8,
                volatility_score: 1.0,
                trend_strength: 0.4,
            },
            volatility: 1.0,
            composite_signal: 0.4,
            agreement_score: 0.7,
            latest_news: vec![],
            upcoming_events: vec![],
            account: AccountState {
                equity: dec!(10000),
                available_cash: dec!(5000),
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
            confidence_threshold: 0.5,
            calibration_refit_interval_secs: 3600,
        }
    }

    const VALID_BUY: &str = r#"[
        {"action":"BUY","confidence":0.8,"reasoning":"bullish"},
        {"approved":true,"confidence":0.7,"position_size_adjustment":1.0,"stop_loss_required":true},
        {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
        {"final_decision":{"action":"BUY","lots":1.0,"stop_loss":1.0950,"take_profit":1.1100,"confidence":0.75,"reasoning":"agrees"}}
    ]"#;

    #[tokio::test]
    async fn test_decide_returns_clean_buy_on_valid_completion() {
        let orchestrator = Orchestrator::new(MockLlmClient::new(VALID_BUY), config(), Calibrator::new());
        let decision = orchestrator.decide(&ctx(), &MemorySnapshot::empty()).await;
        assert!(!decision.vetoed);
        assert_eq!(decision.action, Action::Buy);
    }

    #[tokio::test]
    async fn test_decide_safe_holds_on_unparseable_completion() {
        let orchestrator = Orchestrator::new(MockLlmClient::new("not json at all"), config(), Calibrator::new());
        let decision = orchestrator.decide(&ctx(), &MemorySnapshot::empty()).await;
        assert!(decision.vetoed);
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.veto_reason.as_deref(), Some("reasoning failure"));
    }

    #[test]
    fn test_meets_confidence_threshold_rejects_low_confidence() {
        let mut cfg = config();
        cfg.confidence_threshold = 0.9;
        let orchestrator = Orchestrator::new(MockLlmClient::new(VALID_BUY), cfg, Calibrator::new());
        let mut decision = Decision::safe_hold("n/a");
        decision.vetoed = false;
        decision.confidence = 0.5;
        assert!(!orchestrator.meets_confidence_threshold(&decision));
    }

    #[test]
    fn test_meets_confidence_threshold_exempts_vetoed_decisions() {
        let orchestrator = Orchestrator::new(MockLlmClient::new(VALID_BUY), config(), Calibrator::new());
        let decision = Decision::safe_hold("n/a");
        assert!(orchestrator.meets_confidence_threshold(&decision));
    }

    #[test]
    fn test_check_budget_fails_when_decisions_exhausted() {
        let mut cfg = config();
        cfg.max_daily_decisions = 0;
        let orchestrator = Orchestrator::new(MockLlmClient::new(VALID_BUY), cfg, Calibrator::new());
        assert!(orchestrator.check_budget().is_err());
    }
}
