//! LexQuant Runner — pipeline composition, configuration, metrics sink.
//!
//! This crate builds on `lexquant-core` to provide:
//! - TOML configuration with per-field defaults and fall-back-on-failure
//! - CSV/JSONL metrics writer with console echo and interval flushing
//! - The composition root wiring token source → lexicon → accumulator,
//!   instrumented with the latency tracker

pub mod config;
pub mod metrics;
pub mod pipeline;

pub use config::{
    AppConfig, ConfigError, LatencySection, LoggingSection, TokenStreamSection, TradingSection,
};
pub use metrics::{MetricsError, MetricsWriter, OutputFormat};
pub use pipeline::{Pipeline, PipelineError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }

    #[test]
    fn metrics_writer_is_send_sync() {
        assert_send::<MetricsWriter>();
        assert_sync::<MetricsWriter>();
    }
}
