//! Input Fusion Engine glue: concrete `DataStream`s and the engine that
//! drives temporal alignment over them (spec.md §4.4).

pub mod engine;
pub mod stream;

pub use engine::{FusionEngine, FusionEngineConfig};
pub use stream::{DataStream, EconomicCalendarStream, NewsStream, PriceStream, StreamStats, StreamStatus};
