//! Pure deterministic analytics: RSI/MACD/Bollinger, composite signal, market
//! regime, risk sizing, order builder (spec.md §2 component E).

pub mod indicators;
pub mod order_builder;
pub mod regime;
pub mod sizing;

pub use indicators::{composite_signal, compute_analytics, AnalyticsSnapshot};
pub use order_builder::build_signal;
pub use regime::MarketRegimeDetector;
pub use sizing::{KellyStats, SizingConfig, SizingEngine};
