//! Market regime detection, adapted from the teacher's `MarketRegimeDetector`
//! (ATR-based volatility score, linear-regression trend strength).

use crate::domain::types::{MarketRegime, MarketRegimeType, PriceTick};

pub struct MarketRegimeDetector {
    window_size: usize,
    trend_threshold: f64,
    volatility_threshold: f64,
}

impl MarketRegimeDetector {
    pub fn new(window_size: usize, trend_threshold: f64, volatility_threshold: f64) -> Self {
        Self {
            window_size,
            trend_threshold,
            volatility_threshold,
        }
    }

    pub fn detect(&self, ticks: &[PriceTick]) -> MarketRegime {
        if ticks.len() < self.window_size {
            return MarketRegime::unknown();
        }

        let recent = &ticks[ticks.len().saturating_sub(self.window_size)..];

        let atr = self.atr(recent, 14);
        let current_price: f64 = recent
            .last()
            .expect("recent slice non-empty by window_size check")
            .close
            .to_string()
            .parse()
            .unwrap_or(0.0);
        let volatility_score = if current_price > 0.0 {
            (atr / current_price) * 100.0
        } else {
            0.0
        };

        let trend_strength = self.trend_strength(recent);
        let is_uptrend = self.is_uptrend(recent);

        let regime_type = if trend_strength.abs() > self.trend_threshold {
            if is_uptrend {
                MarketRegimeType::TrendingUp
            } else {
                MarketRegimeType::TrendingDown
            }
        } else if volatility_score > self.volatility_threshold {
            MarketRegimeType::Volatile
        } else {
            MarketRegimeType::Ranging
        };

        let confidence = match regime_type {
            MarketRegimeType::TrendingUp | MarketRegimeType::TrendingDown => {
                let excess = (trend_strength.abs() - self.trend_threshold).max(0.0);
                (0.5 + excess * 0.02).min(1.0)
            }
            MarketRegimeType::Volatile => {
                let excess = (volatility_score - self.volatility_threshold).max(0.0);
                (0.5 + excess * 0.1).min(1.0)
            }
            MarketRegimeType::Ranging => 0.6,
            MarketRegimeType::Unknown => 0.0,
        };

        MarketRegime {
            regime_type,
            confidence,
            volatility_score,
            trend_strength,
        }
    }

    fn closes(&self, ticks: &[PriceTick]) -> Vec<f64> {
        ticks
            .iter()
            .map(|t| t.close.to_string().parse().unwrap_or(0.0))
            .collect()
    }

    fn atr(&self, ticks: &[PriceTick], period: usize) -> f64 {
        if ticks.len() < period + 1 {
            return 0.0;
        }
        let mut tr_sum = 0.0;
        for i in 1..ticks.len() {
            let high: f64 = ticks[i].high.to_string().parse().unwrap_or(0.0);
            let low: f64 = ticks[i].low.to_string().parse().unwrap_or(0.0);
            let close_prev: f64 = ticks[i - 1].close.to_string().parse().unwrap_or(0.0);
            let tr = (high - low)
                .max((high - close_prev).abs())
                .max((low - close_prev).abs());
            if i >= ticks.len() - period {
                tr_sum += tr;
            }
        }
        tr_sum / period as f64
    }

    fn trend_strength(&self, ticks: &[PriceTick]) -> f64 {
        let prices = self.closes(ticks);
        let n = prices.len();
        if n < 2 {
            return 0.0;
        }
        let n_f = n as f64;
        let x_sum: f64 = (0..n).map(|i| i as f64).sum();
        let y_sum: f64 = prices.iter().sum();
        let xy_sum: f64 = prices.iter().enumerate().map(|(i, p)| i as f64 * p).sum();
        let x2_sum: f64 = (0..n).map(|i| (i * i) as f64).sum();

        let denominator = n_f * x2_sum - x_sum * x_sum;
        if denominator == 0.0 {
            return 0.0;
        }
        let slope = (n_f * xy_sum - x_sum * y_sum) / denominator;
        let first_price = prices[0].max(0.0001);
        (slope / first_price) * 1000.0
    }

    fn is_uptrend(&self, ticks: &[PriceTick]) -> bool {
        if ticks.len() < 2 {
            return false;
        }
        let first: f64 = ticks[0].close.to_string().parse().unwrap_or(0.0);
        let last: f64 = ticks[ticks.len() - 1]
            .close
            .to_string()
            .parse()
            .unwrap_or(0.0);
        last > first
    }
}
