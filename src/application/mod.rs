//! Application layer: use-case orchestration and async glue wiring the pure
//! `domain` layer to concrete `infrastructure` adapters.

pub mod calibration;
pub mod decision_engine;
pub mod execution;
pub mod fusion;
pub mod orchestrator;
