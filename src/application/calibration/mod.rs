//! Confidence Calibrator (spec.md §4.5, component D): fits a monotone
//! piecewise-linear isotonic mapping from raw orchestrator confidence to
//! empirical win rate, using closed-trade outcomes.

use crate::domain::memory::TradeOutcome;
use crate::domain::types::TradeResult;
use std::sync::RwLock;

const MIN_SAMPLES_TO_ACTIVATE: usize = 100;
const MIN_SAMPLES_FOR_PRODUCTION: usize = 200;

/// A monotone piecewise-linear mapping: `x_i` strictly increasing, `y_i`
/// non-decreasing, linearly interpolated between knots and clamped at the ends.
#[derive(Debug, Clone)]
struct IsotonicModel {
    xs: Vec<f64>,
    ys: Vec<f64>,
    sample_size: usize,
}

impl IsotonicModel {
    fn map(&self, x: f64) -> f64 {
        if self.xs.is_empty() {
            return x;
        }
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= *self.xs.last().expect("non-empty") {
            return *self.ys.last().expect("non-empty");
        }
        for i in 1..self.xs.len() {
            if x <= self.xs[i] {
                let (x0, x1) = (self.xs[i - 1], self.xs[i]);
                let (y0, y1) = (self.ys[i - 1], self.ys[i]);
                if (x1 - x0).abs() < f64::EPSILON {
                    return y1;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        *self.ys.last().expect("non-empty")
    }
}

/// Copy-on-update: readers always observe either a fully fit model or the
/// previous one, never a partial write (spec.md §5).
pub struct Calibrator {
    model: RwLock<Option<IsotonicModel>>,
    production_only: bool,
}

impl Calibrator {
    pub fn new() -> Self {
        Self {
            model: RwLock::new(None),
            production_only: false,
        }
    }

    /// When true, `map` passes scores through unchanged until the model has
    /// at least 200 samples (spec.md §4.5: "≥ 200 for production").
    pub fn with_production_gate(mut self, production_only: bool) -> Self {
        self.production_only = production_only;
        self
    }

    /// Fits an isotonic mapping via pool-adjacent-violators on
    /// `{predicted_confidence, actual_win}` pairs drawn from closed trades.
    /// Below `MIN_SAMPLES_TO_ACTIVATE` the fit is discarded and scores pass
    /// through unchanged.
    pub fn refit(&self, outcomes: &[(f64, TradeOutcome)]) {
        if outcomes.len() < MIN_SAMPLES_TO_ACTIVATE {
            return;
        }

        let mut pairs: Vec<(f64, f64)> = outcomes
            .iter()
            .map(|(confidence, outcome)| {
                let win = match outcome.result {
                    TradeResult::Win => 1.0,
                    TradeResult::Loss => 0.0,
                    TradeResult::Breakeven => 0.5,
                };
                (*confidence, win)
            })
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let (xs, ys) = pool_adjacent_violators(&pairs);
        let fitted = IsotonicModel {
            xs,
            ys,
            sample_size: outcomes.len(),
        };

        *self.model.write().expect("calibrator lock poisoned") = Some(fitted);
    }

    /// Maps a raw confidence through the fitted isotonic model. Unmapped
    /// (unfit, or below the production gate) scores pass through unchanged.
    pub fn map(&self, raw_confidence: f64) -> f64 {
        let guard = self.model.read().expect("calibrator lock poisoned");
        match guard.as_ref() {
            Some(model) if !self.production_only || model.sample_size >= MIN_SAMPLES_FOR_PRODUCTION => {
                model.map(raw_confidence)
            }
            _ => raw_confidence,
        }
    }

    pub fn is_active(&self) -> bool {
        self.model.read().expect("calibrator lock poisoned").is_some()
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool-adjacent-violators: merges adjacent blocks whose mean would
/// otherwise violate monotonicity, producing the least-squares monotone fit.
fn pool_adjacent_violators(sorted_pairs: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    struct Block {
        x_sum: f64,
        y_sum: f64,
        count: f64,
        x_last: f64,
    }

    let mut blocks: Vec<Block> = Vec::new();
    for &(x, y) in sorted_pairs {
        blocks.push(Block {
            x_sum: x,
            y_sum: y,
            count: 1.0,
            x_last: x,
        });
        while blocks.len() >= 2 {
            let n = blocks.len();
            let mean_last = blocks[n - 1].y_sum / blocks[n - 1].count;
            let mean_prev = blocks[n - 2].y_sum / blocks[n - 2].count;
            if mean_prev > mean_last {
                let last = blocks.pop().expect("len >= 2");
                let prev = blocks.last_mut().expect("len >= 1");
                prev.x_sum += last.x_sum;
                prev.y_sum += last.y_sum;
                prev.count += last.count;
                prev.x_last = last.x_last;
            } else {
                break;
            }
        }
    }

    let xs = blocks.iter().map(|b| b.x_last).collect();
    let ys = blocks.iter().map(|b| b.y_sum / b.count).collect();
    (xs, ys)
}
