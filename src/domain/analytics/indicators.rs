//! RSI/MACD/Bollinger via the `ta` crate, and a composite signal blending them.

use crate::domain::types::PriceTick;
use ta::indicators::{BollingerBands, MovingAverageConvergenceDivergence as Macd, RelativeStrengthIndex as Rsi};
use ta::Next;

/// Snapshot of derived analytics for one symbol at the latest tick.
#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
    pub rsi: Option<f64>,
    pub macd: Option<(f64, f64, f64)>,
    pub bollinger: Option<(f64, f64, f64)>,
}

/// Computes RSI(14), MACD(12,26,9) and Bollinger(20, 2.0) over a close-price
/// series by replaying it through the `ta` crate's streaming indicators.
pub fn compute_analytics(ticks: &[PriceTick]) -> AnalyticsSnapshot {
    if ticks.is_empty() {
        return AnalyticsSnapshot {
            rsi: None,
            macd: None,
            bollinger: None,
        };
    }

    let mut rsi = Rsi::new(14).expect("RSI period 14 is valid");
    let mut macd = Macd::new(12, 26, 9).expect("MACD periods are valid");
    let mut bb = BollingerBands::new(20, 2.0).expect("Bollinger period/deviation are valid");

    let mut last_rsi = None;
    let mut last_macd = None;
    let mut last_bb = None;

    for tick in ticks {
        let close: f64 = tick
            .close
            .to_string()
            .parse()
            .unwrap_or(0.0);
        last_rsi = Some(rsi.next(close));
        let macd_out = macd.next(close);
        last_macd = Some((macd_out.macd, macd_out.signal, macd_out.histogram));
        let bb_out = bb.next(close);
        last_bb = Some((bb_out.lower, bb_out.average, bb_out.upper));
    }

    AnalyticsSnapshot {
        rsi: last_rsi,
        macd: last_macd,
        bollinger: last_bb,
    }
}

/// Blends RSI/MACD/regime direction into a single signed strength in `[-1, 1]`
/// and an agreement score in `[0, 1]` (fraction of sub-signals pointing the
/// same direction as the composite sign).
pub fn composite_signal(
    rsi: Option<f64>,
    macd: Option<(f64, f64, f64)>,
    trend_strength: f64,
) -> (f64, f64) {
    let mut votes: Vec<f64> = Vec::new();

    if let Some(r) = rsi {
        // RSI > 50 bullish, < 50 bearish, scaled to [-1, 1].
        votes.push(((r - 50.0) / 50.0).clamp(-1.0, 1.0));
    }
    if let Some((_, _, hist)) = macd {
        votes.push(hist.clamp(-1.0, 1.0));
    }
    votes.push(trend_strength.clamp(-1.0, 1.0));

    if votes.is_empty() {
        return (0.0, 0.0);
    }

    let composite = votes.iter().sum::<f64>() / votes.len() as f64;
    let sign = composite.signum();
    let agreement = if sign == 0.0 {
        0.0
    } else {
        votes.iter().filter(|v| v.signum() == sign).count() as f64 / votes.len() as f64
    };

    (composite, agreement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tick(close: Decimal) -> PriceTick {
        PriceTick {
            symbol: "EUR/USD".to_string(),
            timestamp_utc: Utc::now(),
            open: close,
            high: close + dec!(0.001),
            low: close - dec!(0.001),
            close,
            volume: dec!(100),
            bid: None,
            ask: None,
        }
    }

    #[test]
    fn test_compute_analytics_empty() {
        let snapshot = compute_analytics(&[]);
        assert!(snapshot.rsi.is_none());
    }

    #[test]
    fn test_compute_analytics_uptrend() {
        let mut ticks = Vec::new();
        for i in 0..30 {
            ticks.push(tick(dec!(1.0) + Decimal::from(i) * dec!(0.001)));
        }
        let snapshot = compute_analytics(&ticks);
        assert!(snapshot.rsi.unwrap() > 50.0);
    }

    #[test]
    fn test_composite_signal_agreement() {
        let (composite, agreement) = composite_signal(Some(70.0), Some((0.0, 0.0, 0.5)), 0.3);
        assert!(composite > 0.0);
        assert_eq!(agreement, 1.0);
    }

    #[test]
    fn test_composite_signal_no_inputs() {
        let (composite, agreement) = composite_signal(None, None, 0.0);
        assert_eq!(composite, 0.0);
        assert_eq!(agreement, 0.0);
    }
}
