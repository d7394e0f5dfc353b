//! Background outcome tracking: polls the adapter for close events on open
//! trades and records them via `save_outcome` (spec.md §4.7, "Outcome
//! tracking (asynchronous)").

use crate::application::execution::BrokerAdapter;
use crate::domain::memory::TradeOutcome;
use crate::domain::types::{Direction, ExitReason, TradeResult};
use crate::infrastructure::persistence::MemoryStore;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{error, warn};

/// One open position awaiting a close event, enough context to compute
/// pips/duration once it closes.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub order_id: String,
    pub decision_id: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub opened_at: chrono::DateTime<Utc>,
    pub pip_size: Decimal,
}

/// Registry of trades awaiting a close event; the Decision Engine registers
/// one entry per successful BUY/SELL submission, the monitor task drains it.
pub struct OutcomeRegistry {
    open: Mutex<HashMap<String, OpenTrade>>,
}

impl OutcomeRegistry {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, trade: OpenTrade) {
        self.open
            .lock()
            .expect("outcome registry lock poisoned")
            .insert(trade.order_id.clone(), trade);
    }

    fn open_order_ids(&self) -> Vec<String> {
        self.open
            .lock()
            .expect("outcome registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn take(&self, order_id: &str) -> Option<OpenTrade> {
        self.open
            .lock()
            .expect("outcome registry lock poisoned")
            .remove(order_id)
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().expect("outcome registry lock poisoned").len()
    }
}

impl Default for OutcomeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn exit_reason_from_str(s: Option<&str>) -> ExitReason {
    match s {
        Some("stop_loss") | Some("StopLoss") => ExitReason::StopLoss,
        Some("take_profit") | Some("TakeProfit") => ExitReason::TakeProfit,
        Some("timeout") | Some("Timeout") => ExitReason::Timeout,
        _ => ExitReason::Manual,
    }
}

fn pips(direction: Direction, entry: Decimal, exit: Decimal, pip_size: Decimal) -> f64 {
    if pip_size.is_zero() {
        return 0.0;
    }
    let delta = match direction {
        Direction::Long => exit - entry,
        Direction::Short => entry - exit,
    };
    (delta / pip_size).to_f64().unwrap_or(0.0)
}

/// Polls every open trade once; closed ones are removed from the registry
/// and their outcome persisted. Returns the number of outcomes recorded.
pub async fn poll_once<A: BrokerAdapter, M: MemoryStore>(
    registry: &OutcomeRegistry,
    adapter: &A,
    memory: &M,
) -> usize {
    let mut recorded = 0;
    for order_id in registry.open_order_ids() {
        let info = match adapter.get_order_info(&order_id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(order_id, %err, "failed to poll order status");
                continue;
            }
        };

        if !info.closed {
            continue;
        }

        let Some(trade) = registry.take(&order_id) else {
            continue;
        };

        let exit_price = info.exit_price.unwrap_or(trade.entry_price);
        let pip_count = pips(trade.direction, trade.entry_price, exit_price, trade.pip_size);
        let result = if pip_count > 0.0 {
            TradeResult::Win
        } else if pip_count < 0.0 {
            TradeResult::Loss
        } else {
            TradeResult::Breakeven
        };

        let duration_minutes = (Utc::now() - trade.opened_at).num_minutes();

        let outcome = TradeOutcome {
            decision_id: trade.decision_id.clone(),
            closed_at_utc: Utc::now(),
            result,
            pips: pip_count,
            duration_minutes,
            exit_reason: exit_reason_from_str(info.exit_reason.as_deref()),
            fill_price: Some(trade.entry_price),
            exit_price: info.exit_price,
        };

        if let Err(err) = memory.save_outcome(&outcome).await {
            error!(decision_id = trade.decision_id, %err, "failed to save trade outcome");
        } else {
            recorded += 1;
        }
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::execution::MockBrokerAdapter;
    use crate::domain::types::Direction;
    use crate::infrastructure::persistence::{Database, SqliteMemoryStore};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_poll_once_records_outcome_on_close() {
        let adapter = MockBrokerAdapter::new();
        adapter.connect().await.unwrap();
        adapter.prime_quote(
            "EUR/USD",
            crate::application::execution::Quote {
                bid: dec!(1.0998),
                ask: dec!(1.1000),
                market_open: true,
            },
        );
        let result = adapter
            .place_order("EUR/USD", Direction::Long, dec!(1.0), None, None)
            .await
            .unwrap();
        let order_id = result.order_id.unwrap();

        let db = Database::new("sqlite::memory:").await.unwrap();
        let memory = SqliteMemoryStore::new(db);
        memory
            .save_decision(&crate::domain::memory::StoredDecision {
                id: "decision-1".to_string(),
                timestamp_utc: Utc::now(),
                symbol: "EUR/USD".to_string(),
                action: crate::domain::types::Action::Buy,
                confidence: 0.7,
                lots: dec!(1.0),
                stop_loss: None,
                take_profit: None,
                price: dec!(1.10),
                rsi: None,
                macd: None,
                bb_position: None,
                regime: None,
                signal_agent_output: None,
                risk_agent_output: None,
                context_agent_output: None,
                synthesis_agent_output: None,
                vetoed: false,
                veto_reason: None,
            })
            .await
            .unwrap();

        let registry = OutcomeRegistry::new();
        registry.register(OpenTrade {
            order_id: order_id.clone(),
            decision_id: "decision-1".to_string(),
            direction: Direction::Long,
            entry_price: dec!(1.1000),
            opened_at: Utc::now(),
            pip_size: dec!(0.0001),
        });

        // Order isn't closed yet in the mock adapter.
        assert_eq!(poll_once(&registry, &adapter, &memory).await, 0);
        assert_eq!(registry.open_count(), 1);
    }
}
