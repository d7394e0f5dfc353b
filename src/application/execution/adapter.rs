//! Broker adapter interface (spec.md §4.6, §6): polymorphic over any
//! concrete broker. Implementations declare their transient error classes
//! for retry classification via `AdapterError::Transient`.

use crate::domain::errors::AdapterError;
use crate::domain::types::{Direction, ExecutionResult, NormalizedSymbolInfo};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct OrderInfo {
    pub closed: bool,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub market_open: bool,
}

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn connect(&self) -> Result<(), AdapterError>;
    async fn disconnect(&self) -> Result<(), AdapterError>;
    async fn place_order(
        &self,
        symbol: &str,
        direction: Direction,
        volume: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<ExecutionResult, AdapterError>;
    async fn get_order_info(&self, order_id: &str) -> Result<OrderInfo, AdapterError>;
    async fn symbol_info(&self, symbol: &str) -> Result<NormalizedSymbolInfo, AdapterError>;
    async fn quote(&self, symbol: &str) -> Result<Quote, AdapterError>;
    async fn ping(&self) -> Result<(), AdapterError>;
    fn is_connected(&self) -> bool;
}

/// Deterministic in-memory broker for tests and the S1-S6 scenarios: always
/// fills at the quoted ask/bid with zero slippage unless primed otherwise.
pub struct MockBrokerAdapter {
    connected: RwLock<bool>,
    quotes: RwLock<HashMap<String, Quote>>,
    symbols: RwLock<HashMap<String, NormalizedSymbolInfo>>,
    orders: RwLock<HashMap<String, OrderInfo>>,
    next_order_id: RwLock<u64>,
    pending_failures: RwLock<HashMap<String, u32>>,
}

impl MockBrokerAdapter {
    pub fn new() -> Self {
        Self {
            connected: RwLock::new(false),
            quotes: RwLock::new(HashMap::new()),
            symbols: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            next_order_id: RwLock::new(1),
            pending_failures: RwLock::new(HashMap::new()),
        }
    }

    pub fn prime_quote(&self, symbol: &str, quote: Quote) {
        self.quotes
            .write()
            .expect("mock broker lock poisoned")
            .insert(symbol.to_string(), quote);
    }

    pub fn prime_symbol(&self, symbol: &str, info: NormalizedSymbolInfo) {
        self.symbols
            .write()
            .expect("mock broker lock poisoned")
            .insert(symbol.to_string(), info);
    }

    /// Makes the next `count` `place_order` calls for `symbol` fail with a
    /// transient adapter fault, for exercising circuit breaker/retry behavior.
    pub fn prime_failures(&self, symbol: &str, count: u32) {
        self.pending_failures
            .write()
            .expect("mock broker lock poisoned")
            .insert(symbol.to_string(), count);
    }

    fn take_pending_failure(&self, symbol: &str) -> bool {
        let mut pending = self.pending_failures.write().expect("mock broker lock poisoned");
        match pending.get_mut(symbol) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for MockBrokerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for MockBrokerAdapter {
    async fn connect(&self) -> Result<(), AdapterError> {
        *self.connected.write().expect("mock broker lock poisoned") = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        *self.connected.write().expect("mock broker lock poisoned") = false;
        Ok(())
    }

    async fn place_order(
        &self,
        symbol: &str,
        direction: Direction,
        volume: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<ExecutionResult, AdapterError> {
        if !self.is_connected() {
            return Err(AdapterError::Disconnected);
        }

        if self.take_pending_failure(symbol) {
            return Err(AdapterError::Transient {
                reason: "simulated transient broker fault".to_string(),
            });
        }

        let quote = self
            .quotes
            .read()
            .expect("mock broker lock poisoned")
            .get(symbol)
            .cloned()
            .ok_or_else(|| AdapterError::Permanent {
                reason: format!("no quote primed for {symbol}"),
            })?;

        let fill_price = match direction {
            Direction::Long => quote.ask,
            Direction::Short => quote.bid,
        };

        let order_id = {
            let mut next = self.next_order_id.write().expect("mock broker lock poisoned");
            let id = format!("mock-{}", *next);
            *next += 1;
            id
        };

        self.orders.write().expect("mock broker lock poisoned").insert(
            order_id.clone(),
            OrderInfo {
                closed: false,
                exit_price: None,
                exit_reason: None,
            },
        );

        let _ = (stop_loss, take_profit);

        Ok(ExecutionResult {
            success: true,
            order_id: Some(order_id),
            fill_price: Some(fill_price),
            fill_volume: Some(volume),
            slippage_pips: Some(0.0),
            status: crate::domain::types::ExecutionStatus::Success,
            error_code: None,
            error_message: None,
        })
    }

    async fn get_order_info(&self, order_id: &str) -> Result<OrderInfo, AdapterError> {
        self.orders
            .read()
            .expect("mock broker lock poisoned")
            .get(order_id)
            .cloned()
            .ok_or_else(|| AdapterError::Permanent {
                reason: format!("unknown order {order_id}"),
            })
    }

    async fn symbol_info(&self, symbol: &str) -> Result<NormalizedSymbolInfo, AdapterError> {
        self.symbols
            .read()
            .expect("mock broker lock poisoned")
            .get(symbol)
            .cloned()
            .ok_or_else(|| AdapterError::Permanent {
                reason: format!("unknown symbol {symbol}"),
            })
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, AdapterError> {
        self.quotes
            .read()
            .expect("mock broker lock poisoned")
            .get(symbol)
            .cloned()
            .ok_or_else(|| AdapterError::Permanent {
                reason: format!("no quote primed for {symbol}"),
            })
    }

    async fn ping(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::Disconnected)
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.read().expect("mock broker lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_place_order_requires_connection() {
        let adapter = MockBrokerAdapter::new();
        let result = adapter
            .place_order("EUR/USD", Direction::Long, dec!(1.0), None, None)
            .await;
        assert!(matches!(result, Err(AdapterError::Disconnected)));
    }

    #[tokio::test]
    async fn test_place_order_fills_at_quoted_price() {
        let adapter = MockBrokerAdapter::new();
        adapter.connect().await.unwrap();
        adapter.prime_quote(
            "EUR/USD",
            Quote {
                bid: dec!(1.0998),
                ask: dec!(1.1000),
                market_open: true,
            },
        );
        let result = adapter
            .place_order("EUR/USD", Direction::Long, dec!(1.0), None, None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.fill_price, Some(dec!(1.1000)));
    }
}
