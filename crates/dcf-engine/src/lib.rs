//! Multi-Stage DCF Engine
//!
//! Growth-stage scheduling with GDP fade, cash-flow projection, terminal value
//! and the equity bridge, plus a wacc x terminal growth sensitivity grid.

pub mod assumptions;
pub mod engine;
pub mod growth_stages;
pub mod projector;
pub mod sensitivity;
pub mod terminal;

#[cfg(test)]
mod tests;

pub use engine::DcfEngine;
pub use growth_stages::{GrowthInputs, GrowthSchedule, GrowthStageScheduler, StageSpec, StageTemplate};
pub use projector::{CashFlowProjector, ProjectionRun};
pub use sensitivity::SensitivityEngine;
pub use terminal::{clamp_discount_rate, TerminalValue, TerminalValueCalculator, ValuationAggregator};
