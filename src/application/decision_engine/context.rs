//! Builds a `FusedContext` from the fusion buffer's recent snapshots plus
//! account state, the tool-output step of one Decision Engine iteration
//! (spec.md §4.7 step 2).

use crate::domain::analytics::{composite_signal, compute_analytics, MarketRegimeDetector};
use crate::domain::types::{
    AccountState, EconomicEvent, FusedContext, FusedEvent, FusedSnapshot, NewsEvent, PriceTick,
};
use rust_decimal::Decimal;

/// Extracts the price series for `symbol` out of a run of snapshots, in
/// chronological order (`latest(k)` returns newest-first).
fn price_series(snapshots: &[FusedSnapshot], stream_id: &str) -> Vec<PriceTick> {
    let mut ticks: Vec<PriceTick> = snapshots
        .iter()
        .rev()
        .filter_map(|s| match s.events.get(stream_id) {
            Some(FusedEvent::Price(p)) => Some(p.clone()),
            _ => None,
        })
        .collect();
    ticks.sort_by_key(|t| t.timestamp_utc);
    ticks
}

fn news_events(snapshots: &[FusedSnapshot]) -> Vec<NewsEvent> {
    snapshots
        .iter()
        .rev()
        .filter_map(|s| s.events.values().find_map(|e| match e {
            FusedEvent::News(n) => Some(n.clone()),
            _ => None,
        }))
        .collect()
}

fn economic_events(snapshots: &[FusedSnapshot]) -> Vec<EconomicEvent> {
    snapshots
        .iter()
        .rev()
        .filter_map(|s| s.events.values().find_map(|e| match e {
            FusedEvent::Economic(ev) => Some(ev.clone()),
            _ => None,
        }))
        .collect()
}

/// Builds the decision-time view for `symbol` (stream id used for its price
/// feed) from the most recent `window` snapshots. Returns `None` if no price
/// data is available yet for that stream.
pub fn build_fused_context(
    snapshots: &[FusedSnapshot],
    symbol: &str,
    price_stream_id: &str,
    regime_detector: &MarketRegimeDetector,
    account: AccountState,
    max_risk_per_trade_percent: Decimal,
    default_stop_distance: Decimal,
) -> Option<FusedContext> {
    let ticks = price_series(snapshots, price_stream_id);
    let latest = ticks.last()?.clone();

    let analytics = compute_analytics(&ticks);
    let regime = regime_detector.detect(&ticks);
    let (composite, agreement) = composite_signal(analytics.rsi, analytics.macd, regime.trend_strength);
    let volatility = regime.volatility_score;

    Some(FusedContext {
        symbol: symbol.to_string(),
        price: latest.close,
        rsi: analytics.rsi,
        macd: analytics.macd,
        bollinger: analytics.bollinger,
        regime,
        volatility,
        composite_signal: composite,
        agreement_score: agreement,
        latest_news: news_events(snapshots),
        upcoming_events: economic_events(snapshots),
        account,
        max_risk_per_trade_percent,
        default_stop_distance,
    })
}
