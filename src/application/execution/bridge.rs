//! Execution Bridge (spec.md §4.6): runs a Signal through the three
//! validation layers, then the adapter's `place_order` wrapped in a circuit
//! breaker and retry policy. Holds no money, no positions, no history.

use crate::application::execution::adapter::BrokerAdapter;
use crate::application::execution::validation::{validate_input, validate_market, validate_symbol};
use crate::domain::errors::{AdapterError, CoreError};
use crate::domain::symbol::SymbolNormalizer;
use crate::domain::types::{ExecutionResult, ExecutionStatus, Signal};
use crate::infrastructure::resilience::circuit_breaker::CallError;
use crate::infrastructure::resilience::{CircuitBreaker, RetryPolicy, Retryable};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{info, warn};

pub struct BridgeConfig {
    pub max_spread_pips: rust_decimal::Decimal,
    pub min_stop_distance_pips: rust_decimal::Decimal,
    pub pip_size: rust_decimal::Decimal,
}

pub struct ExecutionBridge<A: BrokerAdapter, N: SymbolNormalizer> {
    adapter: Arc<A>,
    normalizer: Arc<N>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    config: BridgeConfig,
}

impl<A: BrokerAdapter, N: SymbolNormalizer> ExecutionBridge<A, N> {
    pub fn new(
        adapter: Arc<A>,
        normalizer: Arc<N>,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
        config: BridgeConfig,
    ) -> Self {
        Self {
            adapter,
            normalizer,
            breaker,
            retry,
            config,
        }
    }

    /// The Symbol Normalizer this bridge validates against, exposed so
    /// callers can round a synthesized order size to the broker's lot grid
    /// before building the `Signal` (spec.md §4.5, §4.7 step 7).
    pub fn normalizer(&self) -> &Arc<N> {
        &self.normalizer
    }

    /// Validates then submits a Signal. Any validation failure stops the
    /// pipeline before the adapter is ever called.
    #[tracing::instrument(skip(self, signal), fields(symbol = %signal.symbol, direction = ?signal.direction))]
    pub async fn submit(&self, signal: &Signal) -> Result<ExecutionResult, CoreError> {
        validate_input(signal)?;
        validate_symbol(signal, self.adapter.as_ref(), self.normalizer.as_ref()).await?;

        let quoted_entry = self
            .adapter
            .quote(&signal.symbol)
            .await
            .ok()
            .map(|q| match signal.direction {
                crate::domain::types::Direction::Long => q.ask,
                crate::domain::types::Direction::Short => q.bid,
            });

        validate_market(
            signal,
            self.adapter.as_ref(),
            self.config.max_spread_pips,
            self.config.min_stop_distance_pips,
            self.config.pip_size,
        )
        .await?;

        let adapter = self.adapter.clone();
        let symbol = signal.symbol.clone();
        let direction = signal.direction;
        let size = signal.size;
        let stop_loss = signal.stop_loss;
        let take_profit = signal.take_profit;
        let retry = self.retry;

        let result = self
            .breaker
            .call(|| async move {
                retry
                    .run(
                        |e: &AdapterError| e.is_retryable(),
                        || {
                            let adapter = adapter.clone();
                            let symbol = symbol.clone();
                            async move {
                                adapter
                                    .place_order(&symbol, direction, size, stop_loss, take_profit)
                                    .await
                            }
                        },
                    )
                    .await
            })
            .await;

        match result {
            Ok(mut execution) => {
                if let (Some(entry), Some(fill)) = (quoted_entry, execution.fill_price) {
                    let pip_size = self.config.pip_size.max(rust_decimal::Decimal::new(1, 8));
                    let slippage = ((fill - entry) / pip_size).to_f64().unwrap_or(0.0);
                    execution.slippage_pips = Some(slippage.abs());
                }
                info!(symbol = %signal.symbol, order_id = ?execution.order_id, "order placed");
                Ok(execution)
            }
            Err(CallError::Open(open)) => {
                warn!(symbol = %signal.symbol, "execution bridge circuit open");
                Err(CoreError::CircuitOpen(open))
            }
            Err(CallError::Inner(adapter_err)) => Err(CoreError::Adapter(adapter_err)),
        }
    }

    /// Reconciles open orders registered before a restart by polling the
    /// adapter for their current state; called once at startup.
    #[tracing::instrument(skip(self, order_ids), fields(count = order_ids.len()))]
    pub async fn reconcile_open_orders(&self, order_ids: &[String]) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let still_open = match self.adapter.get_order_info(order_id).await {
                Ok(info) => !info.closed,
                Err(_) => false,
            };
            results.push((order_id.clone(), still_open));
        }
        results
    }
}
