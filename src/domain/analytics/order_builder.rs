//! Builds a `Signal` from analytics output; the rule-based fallback path
//! (Decision Engine §4.7 step 5) uses this directly, bypassing the orchestrator.

use crate::domain::analytics::sizing::{KellyStats, SizingConfig, SizingEngine};
use crate::domain::types::{Direction, FusedContext, Signal};
use rust_decimal::Decimal;

/// Deterministic rule tree: composite signal sign picks direction, agreement
/// score gates whether a trade is proposed at all.
pub fn build_signal(
    ctx: &FusedContext,
    sizing_config: &SizingConfig,
    kelly_stats: Option<&KellyStats>,
    min_agreement: f64,
    decision_id: &str,
) -> Option<Signal> {
    if ctx.agreement_score < min_agreement || ctx.composite_signal == 0.0 {
        return None;
    }

    let direction = if ctx.composite_signal > 0.0 {
        Direction::Long
    } else {
        Direction::Short
    };

    let engine = SizingEngine::new();
    let size = engine.calculate_quantity(
        sizing_config,
        ctx.account.equity,
        ctx.price,
        kelly_stats,
        Some(&ctx.regime),
        Some(ctx.account.available_cash),
    );

    if size <= Decimal::ZERO {
        return None;
    }

    let stop_distance = ctx.default_stop_distance;
    let stop_loss = match direction {
        Direction::Long => Some(ctx.price - stop_distance),
        Direction::Short => Some(ctx.price + stop_distance),
    };

    Some(Signal {
        symbol: ctx.symbol.clone(),
        direction,
        size,
        confidence: ctx.agreement_score,
        stop_loss,
        take_profit: None,
        reasoning: Some(format!(
            "rule-tree: composite={:.3} agreement={:.3} regime={}",
            ctx.composite_signal, ctx.agreement_score, ctx.regime.regime_type
        )),
        source_decision_id: decision_id.to_string(),
    })
}
