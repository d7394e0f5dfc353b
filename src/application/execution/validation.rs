//! Three fixed validation layers a Signal traverses before the bridge
//! delegates to the adapter (spec.md §4.6). Any failure stops the pipeline;
//! no partial order is ever placed.

use crate::application::execution::adapter::{BrokerAdapter, Quote};
use crate::domain::errors::{MarketError, ValidationLayerError};
use crate::domain::symbol::SymbolNormalizer;
use crate::domain::types::Signal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Input layer: shape of the Signal itself, no I/O.
pub fn validate_input(signal: &Signal) -> Result<(), ValidationLayerError> {
    if !(0.0..=1.0).contains(&signal.confidence) {
        return Err(ValidationLayerError::InputInvalid {
            reason: format!("confidence {} outside [0,1]", signal.confidence),
        });
    }
    if signal.size <= Decimal::ZERO {
        return Err(ValidationLayerError::SizeInvalid {
            reason: format!("size {} must be > 0", signal.size),
        });
    }
    if signal.symbol.trim().is_empty() {
        return Err(ValidationLayerError::InputInvalid {
            reason: "symbol is empty".to_string(),
        });
    }
    Ok(())
}

/// Symbol layer: adapter connectivity, symbol recognition and lot-grid fit.
pub async fn validate_symbol(
    signal: &Signal,
    adapter: &dyn BrokerAdapter,
    normalizer: &dyn SymbolNormalizer,
) -> Result<(), ValidationLayerError> {
    if !adapter.is_connected() {
        return Err(ValidationLayerError::AdapterDisconnected);
    }

    let info = normalizer
        .info(&signal.symbol)
        .await
        .map_err(|_| ValidationLayerError::SymbolNotFound {
            symbol: signal.symbol.clone(),
        })?;

    adapter
        .symbol_info(&signal.symbol)
        .await
        .map_err(|_| ValidationLayerError::SymbolNotTradable {
            symbol: signal.symbol.clone(),
        })?;

    if signal.size < info.min_lot || signal.size > info.max_lot {
        return Err(ValidationLayerError::SizeInvalid {
            reason: format!(
                "size {} outside [{}, {}]",
                signal.size, info.min_lot, info.max_lot
            ),
        });
    }

    if info.lot_step > Decimal::ZERO {
        let steps = (signal.size - info.min_lot) / info.lot_step;
        if steps.round_dp(8) != steps.trunc() {
            return Err(ValidationLayerError::SizeInvalid {
                reason: format!("size {} does not lie on the lot_step grid", signal.size),
            });
        }
    }

    Ok(())
}

/// Market layer: live market conditions at order time.
pub async fn validate_market(
    signal: &Signal,
    adapter: &dyn BrokerAdapter,
    max_spread_pips: Decimal,
    min_stop_distance_pips: Decimal,
    pip_size: Decimal,
) -> Result<(), MarketError> {
    let quote = adapter
        .quote(&signal.symbol)
        .await
        .map_err(|_| MarketError::NoQuote {
            symbol: signal.symbol.clone(),
        })?;

    if !quote.market_open {
        return Err(MarketError::MarketClosed {
            symbol: signal.symbol.clone(),
        });
    }

    let spread_pips = spread_in_pips(&quote, pip_size);
    if spread_pips > max_spread_pips {
        return Err(MarketError::SpreadTooWide {
            symbol: signal.symbol.clone(),
            spread_pips: spread_pips.to_f64().unwrap_or(0.0),
            max_pips: max_spread_pips.to_f64().unwrap_or(0.0),
        });
    }

    if let Some(stop_loss) = signal.stop_loss {
        let reference = match signal.direction {
            crate::domain::types::Direction::Long => quote.bid,
            crate::domain::types::Direction::Short => quote.ask,
        };
        let distance_pips = ((reference - stop_loss).abs() / pip_size.max(dec!(0.00000001)))
            .to_f64()
            .unwrap_or(0.0);
        let min_pips: f64 = min_stop_distance_pips.to_f64().unwrap_or(0.0);
        if distance_pips < min_pips {
            return Err(MarketError::StopLossTooClose {
                symbol: signal.symbol.clone(),
                distance_pips,
                min_pips,
            });
        }
    }

    Ok(())
}

fn spread_in_pips(quote: &Quote, pip_size: Decimal) -> Decimal {
    if pip_size <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (quote.ask - quote.bid) / pip_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Direction;
    use rust_decimal_macros::dec;

    fn signal(size: Decimal, confidence: f64) -> Signal {
        Signal {
            symbol: "EUR/USD".to_string(),
            direction: Direction::Long,
            size,
            confidence,
            stop_loss: None,
            take_profit: None,
            reasoning: None,
            source_decision_id: "d1".to_string(),
        }
    }

    #[test]
    fn test_validate_input_rejects_nonpositive_size() {
        let result = validate_input(&signal(dec!(0), 0.5));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_input_rejects_out_of_range_confidence() {
        let result = validate_input(&signal(dec!(1.0), 1.5));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_input_accepts_well_formed_signal() {
        let result = validate_input(&signal(dec!(1.0), 0.8));
        assert!(result.is_ok());
    }
}
