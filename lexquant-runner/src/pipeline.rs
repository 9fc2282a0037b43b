//! Composition root — wires the token source through the lexicon and
//! accumulator, instrumented end to end.
//!
//! Per token, the installed consumer: opens a latency span, logs the token,
//! maps it to a weight, feeds the accumulator, then reports the measured
//! span to the metrics sink. The accumulator's sink computes
//! signal-to-delivery latency from the emission timestamp. The accumulator
//! sits behind a mutex: the stream worker is the only caller in this wiring,
//! and the lock makes that single-caller contract safe rather than assumed.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use lexquant_core::{
    CancelToken, EngineStats, GatingMode, LatencyStats, LatencyTracker, Lexicon, LexiconStats,
    SignalAccumulator, SignalSink, StreamStats, Token, TokenConsumer, TokenSource, TradeSignal,
};

use crate::config::AppConfig;
use crate::metrics::{MetricsError, MetricsWriter};

/// Token list seeded into the buffer when the memory stream is selected.
const MEMORY_STREAM_TOKENS: &[&str] = &[
    "crash",
    "panic",
    "inevitable",
    "guarantee",
    "bullish",
    "collapse",
    "volatile",
    "surge",
    "confident",
    "uncertain",
    "rally",
    "plunge",
    "breakout",
    "support",
    "resistance",
    "momentum",
];

/// Errors from pipeline construction.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Forwards emitted signals to the metrics sink, stamping delivery latency.
struct SignalRelay {
    metrics: Arc<MetricsWriter>,
}

impl SignalSink for SignalRelay {
    fn on_signal(&self, signal: &TradeSignal) {
        let delivery_us = signal.timestamp.elapsed().as_micros() as u64;
        self.metrics.log_signal_generated(
            signal.delta_bias_shift,
            signal.volatility_adjustment,
            delivery_us,
        );
    }
}

/// The per-token pipeline stage driven by the stream worker.
struct PipelineConsumer {
    lexicon: Arc<Lexicon>,
    accumulator: Arc<Mutex<SignalAccumulator>>,
    latency: Arc<LatencyTracker>,
    metrics: Arc<MetricsWriter>,
}

impl TokenConsumer for PipelineConsumer {
    fn on_token(&self, token: &Token) {
        let span = self.latency.start_span();
        self.metrics.log_token_received(&token.text, token.sequence_id);

        let weight = self.lexicon.map_token(&token.text);
        self.accumulator
            .lock()
            .expect("accumulator poisoned")
            .process(&weight);

        let elapsed_us = span.elapsed().as_micros() as u64;
        span.finish();
        self.metrics.log_latency_measurement(elapsed_us);
    }
}

/// The composed signal pipeline.
pub struct Pipeline {
    source: TokenSource,
    lexicon: Arc<Lexicon>,
    accumulator: Arc<Mutex<SignalAccumulator>>,
    latency: Arc<LatencyTracker>,
    metrics: Arc<MetricsWriter>,
}

impl Pipeline {
    /// Builds and wires all components. Does not start the stream.
    pub fn build(
        config: &AppConfig,
        mode: GatingMode,
        cancel: CancelToken,
    ) -> Result<Self, PipelineError> {
        let metrics = Arc::new(MetricsWriter::new(&config.logging)?);
        let latency = Arc::new(LatencyTracker::new(config.latency.latency_config()));
        let lexicon = Arc::new(Lexicon::new());

        let mut accumulator = SignalAccumulator::new(config.trading.engine_config());
        accumulator.set_mode(mode);
        accumulator.set_sink(Arc::new(SignalRelay {
            metrics: Arc::clone(&metrics),
        }));
        let accumulator = Arc::new(Mutex::new(accumulator));

        let mut source = TokenSource::new(config.token_stream.stream_config(), cancel);
        source.set_consumer(Arc::new(PipelineConsumer {
            lexicon: Arc::clone(&lexicon),
            accumulator: Arc::clone(&accumulator),
            latency: Arc::clone(&latency),
            metrics: Arc::clone(&metrics),
        }));

        if config.token_stream.use_memory_stream {
            source.load_tokens_from_memory(
                MEMORY_STREAM_TOKENS.iter().map(|s| s.to_string()).collect(),
            );
        } else {
            // A missing token file is reported, not fatal; the stream idles
            // on an empty buffer until tokens are loaded.
            match source.load_tokens_from_file(&config.token_stream.data_file_path) {
                Ok(loaded) => info!(loaded, "token buffer seeded from file"),
                Err(error) => warn!(%error, "token file unavailable, starting with empty buffer"),
            }
        }

        Ok(Self {
            source,
            lexicon,
            accumulator,
            latency,
            metrics,
        })
    }

    /// Starts the production loop.
    pub fn start(&mut self) {
        self.source.start();
    }

    /// Stops the stream and flushes the metrics sink.
    pub fn shutdown(&mut self) {
        self.source.stop();
        self.metrics.flush();
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.source.stats()
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.latency.stats()
    }

    pub fn engine_stats(&self) -> EngineStats {
        self.accumulator
            .lock()
            .expect("accumulator poisoned")
            .stats()
    }

    pub fn lexicon_stats(&self) -> LexiconStats {
        self.lexicon.stats()
    }

    pub fn metrics(&self) -> &MetricsWriter {
        &self.metrics
    }
}
