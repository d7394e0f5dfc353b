pub mod adapter;
pub mod bridge;
pub mod validation;

pub use adapter::{BrokerAdapter, MockBrokerAdapter, OrderInfo, Quote};
pub use bridge::{BridgeConfig, ExecutionBridge};
