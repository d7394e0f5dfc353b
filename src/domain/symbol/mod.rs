//! Broker-agnostic risk-unit conversion and lot sizing.
//!
//! Grounded on the teacher's `domain/config/broker_config.rs` (validated
//! value object) and `application/risk_management/sizing_engine.rs`
//! (`Decimal::round_dp`-style snapping, `checked_div`).

use crate::domain::errors::SymbolError;
use crate::domain::types::{AssetClass, DistanceUnit, NormalizedSymbolInfo};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[async_trait]
pub trait SymbolNormalizer: Send + Sync {
    /// Monetary value of `distance` in `unit` per one lot.
    async fn risk_units(
        &self,
        symbol: &str,
        distance: Decimal,
        unit: DistanceUnit,
    ) -> Result<Decimal, SymbolError>;

    /// Clamp to `[min_lot, max_lot]` and snap down to the nearest `lot_step` multiple.
    async fn round_lot(&self, symbol: &str, raw_size: Decimal) -> Result<Decimal, SymbolError>;

    async fn info(&self, symbol: &str) -> Result<NormalizedSymbolInfo, SymbolError>;
}

struct CacheEntry {
    info: NormalizedSymbolInfo,
    fetched_at: Instant,
}

/// In-memory table implementation with a provider-chosen TTL per spec.md §3.
pub struct StaticSymbolNormalizer {
    table: HashMap<String, NormalizedSymbolInfo>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl StaticSymbolNormalizer {
    pub fn new(entries: Vec<NormalizedSymbolInfo>, ttl: Duration) -> Self {
        let table = entries.into_iter().map(|e| (e.symbol.clone(), e)).collect();
        Self {
            table,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn lookup(&self, symbol: &str) -> Result<NormalizedSymbolInfo, SymbolError> {
        {
            let cache = self.cache.read().expect("symbol cache lock poisoned");
            if let Some(entry) = cache.get(symbol)
                && entry.fetched_at.elapsed() < self.ttl
            {
                return Ok(entry.info.clone());
            }
        }
        let info = self
            .table
            .get(symbol)
            .cloned()
            .ok_or_else(|| SymbolError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        let mut cache = self.cache.write().expect("symbol cache lock poisoned");
        cache.insert(
            symbol.to_string(),
            CacheEntry {
                info: info.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(info)
    }
}

#[async_trait]
impl SymbolNormalizer for StaticSymbolNormalizer {
    async fn risk_units(
        &self,
        symbol: &str,
        distance: Decimal,
        unit: DistanceUnit,
    ) -> Result<Decimal, SymbolError> {
        let info = self.lookup(symbol)?;

        let pip_size = match info.asset_class {
            AssetClass::Fx => Some(dec!(0.0001)),
            AssetClass::FxJpy => Some(dec!(0.01)),
            AssetClass::Crypto | AssetClass::Cfd | AssetClass::Equity => None,
        };

        match unit {
            DistanceUnit::Pips => match pip_size {
                Some(pip) => Ok((distance * pip / info.tick_size) * info.tick_value_quote),
                None => Err(SymbolError::InvalidUnit {
                    symbol: symbol.to_string(),
                    unit: "pips".to_string(),
                }),
            },
            DistanceUnit::Ticks => Ok(distance * info.tick_value_quote),
            DistanceUnit::Points | DistanceUnit::Price => {
                if info.tick_size.is_zero() {
                    return Err(SymbolError::InvalidUnit {
                        symbol: symbol.to_string(),
                        unit: "price".to_string(),
                    });
                }
                Ok((distance / info.tick_size) * info.tick_value_quote)
            }
        }
    }

    async fn round_lot(&self, symbol: &str, raw_size: Decimal) -> Result<Decimal, SymbolError> {
        let info = self.lookup(symbol)?;
        let clamped = raw_size.clamp(info.min_lot, info.max_lot);
        if info.lot_step.is_zero() {
            return Ok(clamped);
        }
        let steps = ((clamped - info.min_lot) / info.lot_step).floor();
        Ok((info.min_lot + steps * info.lot_step).max(info.min_lot))
    }

    async fn info(&self, symbol: &str) -> Result<NormalizedSymbolInfo, SymbolError> {
        self.lookup(symbol)
    }
}
