//! TradeSignal — the accumulator's emitted output.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Strategy direction attached to an emitted signal.
///
/// `Hold` means the accumulated bias did not clear either directional
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyToggle {
    Hold,
    Long,
    Short,
}

/// A signal emitted by the accumulator and handed to the registered sink.
///
/// Created only inside the accumulator at emission time; immutable afterward.
/// `timestamp` is the emission instant, used downstream to measure
/// signal-to-delivery latency.
#[derive(Debug, Clone)]
pub struct TradeSignal {
    pub delta_bias_shift: f64,
    pub volatility_adjustment: f64,
    /// Position weight in [0, 1], derived from the triggering weight's confidence.
    pub strategy_weight: f64,
    pub strategy_toggle: StrategyToggle,
    pub timestamp: Instant,
}
