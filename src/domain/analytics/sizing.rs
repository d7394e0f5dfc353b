//! Risk-based position sizing, adapted from the teacher's Kelly-capped,
//! regime-multiplied `SizingEngine` (`application/risk_management/sizing_engine.rs`),
//! trimmed of broker-specific cost/spread infrastructure not in scope here.

use crate::domain::types::{MarketRegime, MarketRegimeType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct SizingConfig {
    pub risk_per_trade_percent: Decimal,
    pub max_positions: usize,
    pub max_position_size_pct: Decimal,
}

/// Trade statistics for Kelly Criterion position sizing; use when `n_trades >= 30`.
#[derive(Debug, Clone)]
pub struct KellyStats {
    pub win_rate: f64,
    pub avg_win_pips: f64,
    pub avg_loss_pips: f64,
    pub n_trades: usize,
}

impl KellyStats {
    /// Quarter-Kelly fraction: `f* = (p*b - (1-p)*a) / b`, then `0.25 * f*`.
    /// Returns `None` if `avg_win_pips <= 0` or the result is non-positive.
    pub fn quarter_kelly_fraction(&self) -> Option<Decimal> {
        if self.n_trades < 30 || self.avg_win_pips <= 0.0 {
            return None;
        }
        let p = self.win_rate;
        let one_p = 1.0 - p;
        let b = self.avg_win_pips;
        let a = self.avg_loss_pips.abs();
        let f_star = (p * b - one_p * a) / b;
        if f_star <= 0.0 {
            return None;
        }
        let quarter = (f_star * 0.25).clamp(0.0, 1.0);
        Decimal::from_f64_retain(quarter)
    }
}

pub struct SizingEngine;

impl SizingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes a lot quantity from risk-per-trade %, optionally capped by
    /// quarter-Kelly, diversification caps, and regime multiplier; the result
    /// is still pre-normalization — the caller snaps it via Symbol Normalizer.
    pub fn calculate_quantity(
        &self,
        config: &SizingConfig,
        total_equity: Decimal,
        price: Decimal,
        kelly_stats: Option<&KellyStats>,
        regime: Option<&MarketRegime>,
        available_cash: Option<Decimal>,
    ) -> Decimal {
        if config.risk_per_trade_percent <= Decimal::ZERO
            || total_equity <= Decimal::ZERO
            || price <= Decimal::ZERO
        {
            return Decimal::ZERO;
        }

        let mut target_amt = total_equity * config.risk_per_trade_percent;

        if let Some(stats) = kelly_stats
            && let Some(kelly_frac) = stats.quarter_kelly_fraction()
        {
            let kelly_amt = total_equity * kelly_frac;
            target_amt = target_amt.min(kelly_amt);
        }

        if config.max_positions > 0 {
            let max_bucket = total_equity / Decimal::from(config.max_positions);
            target_amt = target_amt.min(max_bucket);
        }

        if config.max_position_size_pct > Decimal::ZERO {
            let max_pos_val = total_equity * config.max_position_size_pct;
            target_amt = target_amt.min(max_pos_val);
        }

        if let Some(cash) = available_cash
            && cash > Decimal::ZERO
        {
            target_amt = target_amt.min(cash);
        }

        let quantity = target_amt
            .checked_div(price)
            .map(|q| q.round_dp(4))
            .unwrap_or(Decimal::ZERO);

        apply_regime_multiplier(quantity, regime)
    }
}

impl Default for SizingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn regime_size_multiplier(regime_type: MarketRegimeType) -> Decimal {
    match regime_type {
        MarketRegimeType::TrendingUp => dec!(1.0),
        MarketRegimeType::TrendingDown => dec!(0.5),
        MarketRegimeType::Ranging => dec!(0.7),
        MarketRegimeType::Volatile => dec!(0.5),
        MarketRegimeType::Unknown => dec!(0.3),
    }
}

fn apply_regime_multiplier(qty: Decimal, regime: Option<&MarketRegime>) -> Decimal {
    regime
        .map(|r| (qty * regime_size_multiplier(r.regime_type)).round_dp(4))
        .unwrap_or(qty)
}
