//! LexQuant Core — token-to-signal engine internals.
//!
//! This crate contains the heart of the real-time signal pipeline:
//! - Domain types (tokens, semantic weights, trade signals)
//! - Sentiment lexicon with confidence-weighted sequence aggregation
//! - Decaying signal accumulator with cooldown-gated emission
//! - Lock-free latency tracker with sliding-window percentiles
//! - Interval-paced token source driving a consumer on a worker thread
//! - Cancellation token shared between the composition root and the stream

pub mod cancel;
pub mod domain;
pub mod engine;
pub mod latency;
pub mod lexicon;
pub mod stream;

pub use cancel::CancelToken;
pub use domain::{SemanticWeight, StrategyToggle, Token, TradeSignal};
pub use engine::{EngineConfig, EngineStats, GatingMode, SignalAccumulator, SignalSink};
pub use latency::{LatencyConfig, LatencySpan, LatencyStats, LatencyTracker};
pub use lexicon::{Lexicon, LexiconError, LexiconStats};
pub use stream::{StreamConfig, StreamError, StreamStats, TokenConsumer, TokenSource};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across the stream worker
    /// boundary is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Token>();
        require_sync::<Token>();
        require_send::<SemanticWeight>();
        require_sync::<SemanticWeight>();
        require_send::<TradeSignal>();
        require_sync::<TradeSignal>();
        require_send::<StrategyToggle>();
        require_sync::<StrategyToggle>();

        require_send::<Lexicon>();
        require_sync::<Lexicon>();
        require_send::<LatencyTracker>();
        require_sync::<LatencyTracker>();
        require_send::<CancelToken>();
        require_sync::<CancelToken>();
        require_send::<TokenSource>();

        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<LatencyStats>();
        require_sync::<LatencyStats>();
    }
}
