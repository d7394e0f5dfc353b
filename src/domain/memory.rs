//! Domain types persisted by the Memory Store (spec.md §3/§4.3).

use crate::domain::types::{Action, ExitReason, MarketRegimeType, TradeResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDecision {
    pub id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    pub lots: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub price: Decimal,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub bb_position: Option<String>,
    pub regime: Option<MarketRegimeType>,
    pub signal_agent_output: Option<Value>,
    pub risk_agent_output: Option<Value>,
    pub context_agent_output: Option<Value>,
    pub synthesis_agent_output: Option<Value>,
    pub vetoed: bool,
    pub veto_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub decision_id: String,
    pub closed_at_utc: DateTime<Utc>,
    pub result: TradeResult,
    pub pips: f64,
    pub duration_minutes: i64,
    pub exit_reason: ExitReason,
    pub fill_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
}

impl TradeOutcome {
    /// `WIN ⇒ pips > 0`, `LOSS ⇒ pips < 0`, `BREAKEVEN ⇒ pips = 0` (spec.md §4.3).
    pub fn sign_agrees_with_result(&self) -> bool {
        match self.result {
            TradeResult::Win => self.pips > 0.0,
            TradeResult::Loss => self.pips < 0.0,
            TradeResult::Breakeven => self.pips == 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub macd_signal: String,
    pub bb_position: Option<String>,
    pub regime: Option<MarketRegimeType>,
    pub win_rate: f64,
    pub avg_pips: f64,
    pub sample_size: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub recent_decisions: Vec<StoredDecision>,
    pub current_regime: Option<MarketRegimeType>,
    pub win_rate_30d: f64,
    pub avg_win_pips: f64,
    pub avg_loss_pips: f64,
    pub total_trades_30d: i64,
    pub similar_patterns: Vec<Pattern>,
}

impl MemorySnapshot {
    pub fn empty() -> Self {
        Self {
            recent_decisions: Vec::new(),
            current_regime: None,
            win_rate_30d: 0.0,
            avg_win_pips: 0.0,
            avg_loss_pips: 0.0,
            total_trades_30d: 0,
            similar_patterns: Vec::new(),
        }
    }
}
