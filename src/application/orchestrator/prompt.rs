//! Deterministic prompt assembly for the four-agent completion (spec.md §4.5).
//! Same inputs always produce the same prompt text, a precondition for the
//! temperature=0 determinism property.

use crate::domain::memory::MemorySnapshot;
use crate::domain::types::FusedContext;

const SYSTEM_PREAMBLE: &str = "You are four specialized trading reasoners — Signal, Risk, Context, \
Synthesis — emitting a single JSON response. Respond with exactly one JSON array of four objects \
in that fixed order. No prose before or after the array.";

/// Hard cap on the memory summary block, approximated as 4 characters/token.
const MEMORY_SUMMARY_MAX_TOKENS: usize = 1000;
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

pub fn build_system_prompt() -> String {
    SYSTEM_PREAMBLE.to_string()
}

pub fn build_user_prompt(ctx: &FusedContext, memory: &MemorySnapshot) -> String {
    let mut out = String::new();

    out.push_str("## Market context\n");
    out.push_str(&format!("symbol: {}\n", ctx.symbol));
    out.push_str(&format!("price: {}\n", ctx.price));
    if let Some(rsi) = ctx.rsi {
        out.push_str(&format!("rsi: {rsi:.2}\n"));
    }
    if let Some((macd, signal, hist)) = ctx.macd {
        out.push_str(&format!("macd: {macd:.5} signal: {signal:.5} histogram: {hist:.5}\n"));
    }
    if let Some((lower, mid, upper)) = ctx.bollinger {
        out.push_str(&format!("bollinger: lower={lower:.5} mid={mid:.5} upper={upper:.5}\n"));
    }
    out.push_str(&format!(
        "regime: {} confidence={:.2} volatility_score={:.2} trend_strength={:.2}\n",
        ctx.regime.regime_type, ctx.regime.confidence, ctx.regime.volatility_score, ctx.regime.trend_strength
    ));
    out.push_str(&format!("composite_signal: {:.3} agreement_score: {:.3}\n", ctx.composite_signal, ctx.agreement_score));

    out.push_str("\n## Account state\n");
    out.push_str(&format!("equity: {}\n", ctx.account.equity));
    out.push_str(&format!("available_cash: {}\n", ctx.account.available_cash));

    out.push_str("\n## Risk parameters\n");
    out.push_str(&format!("max_risk_per_trade_percent: {}\n", ctx.max_risk_per_trade_percent));
    out.push_str(&format!("default_stop_distance: {}\n", ctx.default_stop_distance));

    if !ctx.upcoming_events.is_empty() {
        out.push_str("\n## Upcoming high-impact events\n");
        for event in ctx.upcoming_events.iter().filter(|e| matches!(e.impact, crate::domain::types::ImpactLevel::High)) {
            out.push_str(&format!("- {} ({}) at {}\n", event.category, event.currency, event.scheduled_utc));
        }
    }

    if !ctx.latest_news.is_empty() {
        out.push_str("\n## Recent news\n");
        for news in ctx.latest_news.iter().take(5) {
            out.push_str(&format!("- {} (sentiment={:.2})\n", news.title, news.sentiment_score));
        }
    }

    out.push_str("\n## Memory summary\n");
    out.push_str(&memory_summary(memory));

    out
}

/// Renders a token-budgeted (<=1000 tokens, approximated by char count)
/// summary of recent performance and similar patterns.
fn memory_summary(memory: &MemorySnapshot) -> String {
    let mut summary = String::new();
    summary.push_str(&format!(
        "win_rate_30d={:.2} avg_win_pips={:.1} avg_loss_pips={:.1} total_trades_30d={}\n",
        memory.win_rate_30d, memory.avg_win_pips, memory.avg_loss_pips, memory.total_trades_30d
    ));
    if let Some(regime) = memory.current_regime {
        summary.push_str(&format!("current_regime={regime}\n"));
    }
    for pattern in &memory.similar_patterns {
        summary.push_str(&format!(
            "pattern rsi=[{:.0},{:.0}] macd={} win_rate={:.2} avg_pips={:.1} n={}\n",
            pattern.rsi_min, pattern.rsi_max, pattern.macd_signal, pattern.win_rate, pattern.avg_pips, pattern.sample_size
        ));
    }

    let budget_chars = MEMORY_SUMMARY_MAX_TOKENS * CHARS_PER_TOKEN_ESTIMATE;
    if summary.len() > budget_chars {
        summary.truncate(budget_chars);
    }
    summary
}
