use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trade direction carried by a `Signal` through the Execution Bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

/// Final action a `Decision` or rule-tree evaluation settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// Broker-side asset classification; pip/tick semantics hinge on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    Fx,
    FxJpy,
    Crypto,
    Cfd,
    Equity,
}

impl std::str::FromStr for AssetClass {
    type Err = crate::domain::errors::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FX" => Ok(AssetClass::Fx),
            "FX_JPY" => Ok(AssetClass::FxJpy),
            "CRYPTO" => Ok(AssetClass::Crypto),
            "CFD" => Ok(AssetClass::Cfd),
            "EQUITY" => Ok(AssetClass::Equity),
            other => Err(crate::domain::errors::ConfigError::Invalid {
                key: "asset_class".to_string(),
                reason: format!("unrecognized asset class '{other}'"),
            }),
        }
    }
}

/// Unit in which a risk distance (stop/target) is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Pips,
    Ticks,
    Points,
    Price,
}

/// One immutable tick emitted by a `PriceStream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub timestamp_utc: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl PriceTick {
    /// `low ≤ open,close ≤ high`, per spec.md §3 / §8.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub title: String,
    pub source: String,
    pub sentiment_score: f64,
    pub sentiment_confidence: f64,
    pub relevance_per_symbol: HashMap<String, f64>,
    pub is_major_event: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub id: String,
    pub scheduled_utc: DateTime<Utc>,
    pub currency: String,
    pub impact: ImpactLevel,
    pub impact_score: f64,
    pub category: String,
    pub forecast: Option<f64>,
    pub previous: Option<f64>,
    pub actual: Option<f64>,
    pub affected_symbols: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Synced,
    Delayed,
    Stale,
    Disconnected,
}

/// One aligned event per stream, keyed by the stream's id, for a FusedSnapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FusedEvent {
    Price(PriceTick),
    News(NewsEvent),
    Economic(EconomicEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedSnapshot {
    pub reference_time: DateTime<Utc>,
    pub events: HashMap<String, FusedEvent>,
    pub sync_status: SyncStatus,
}

impl FusedSnapshot {
    /// Every included event must satisfy `|event.ts - reference_time| <= sync_window`.
    pub fn within_window(&self, sync_window: chrono::Duration) -> bool {
        self.events.values().all(|e| {
            let ts = match e {
                FusedEvent::Price(p) => p.timestamp_utc,
                FusedEvent::News(n) => n.timestamp_utc,
                FusedEvent::Economic(ev) => ev.scheduled_utc,
            };
            (ts - self.reference_time).abs() <= sync_window
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegimeType {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
    Unknown,
}

impl std::fmt::Display for MarketRegimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketRegimeType::TrendingUp => write!(f, "TRENDING_UP"),
            MarketRegimeType::TrendingDown => write!(f, "TRENDING_DOWN"),
            MarketRegimeType::Ranging => write!(f, "RANGING"),
            MarketRegimeType::Volatile => write!(f, "VOLATILE"),
            MarketRegimeType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub regime_type: MarketRegimeType,
    pub confidence: f64,
    pub volatility_score: f64,
    pub trend_strength: f64,
}

impl MarketRegime {
    pub fn unknown() -> Self {
        Self {
            regime_type: MarketRegimeType::Unknown,
            confidence: 0.0,
            volatility_score: 0.0,
            trend_strength: 0.0,
        }
    }
}

/// Account state as seen by reasoning and sizing; a read-only view, never
/// mutated by the Execution Bridge (spec.md §4.6: "the bridge never holds money").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub equity: Decimal,
    pub available_cash: Decimal,
    pub open_position_qty: HashMap<String, Decimal>,
}

/// The decision-time view composed from a FusedSnapshot plus derived analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedContext {
    pub symbol: String,
    pub price: Decimal,
    pub rsi: Option<f64>,
    pub macd: Option<(f64, f64, f64)>,
    pub bollinger: Option<(f64, f64, f64)>,
    pub regime: MarketRegime,
    pub volatility: f64,
    pub composite_signal: f64,
    pub agreement_score: f64,
    pub latest_news: Vec<NewsEvent>,
    pub upcoming_events: Vec<EconomicEvent>,
    pub account: AccountState,
    pub max_risk_per_trade_percent: Decimal,
    pub default_stop_distance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Manual,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
}

/// An execution intent produced by the orchestrator or rule tree, consumed
/// once by the Execution Bridge and never persisted outside the StoredDecision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub confidence: f64,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reasoning: Option<String>,
    pub source_decision_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Rejected,
    Timeout,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub fill_price: Option<Decimal>,
    pub fill_volume: Option<Decimal>,
    pub slippage_pips: Option<f64>,
    pub status: ExecutionStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Cached symbol metadata; provider-chosen TTL is enforced by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSymbolInfo {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub tick_size: Decimal,
    pub contract_multiplier: Decimal,
    pub tick_value_quote: Decimal,
    pub min_lot: Decimal,
    pub max_lot: Decimal,
    pub lot_step: Decimal,
    pub base: Option<String>,
    pub quote: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(low: Decimal, open: Decimal, close: Decimal, high: Decimal) -> PriceTick {
        PriceTick {
            symbol: "EUR/USD".to_string(),
            timestamp_utc: Utc::now(),
            open,
            high,
            low,
            close,
            volume: dec!(100),
            bid: None,
            ask: None,
        }
    }

    #[test]
    fn test_price_tick_well_formed() {
        let t = tick(dec!(1.0), dec!(1.05), dec!(1.04), dec!(1.10));
        assert!(t.is_well_formed());
    }

    #[test]
    fn test_price_tick_violates_invariant() {
        let t = tick(dec!(1.10), dec!(1.05), dec!(1.04), dec!(1.0));
        assert!(!t.is_well_formed());
    }
}
