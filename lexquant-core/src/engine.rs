//! Signal accumulator — decayed bias/volatility state with gated emission.
//!
//! `process` is the sole mutator of accumulator state and must be driven by
//! one thread at a time (in the intended wiring, the token source's worker).
//! The struct is deliberately not internally synchronized; callers that need
//! cross-thread access wrap it in a mutex at the composition root.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::{SemanticWeight, StrategyToggle, TradeSignal};

/// Accumulated-magnitude threshold beyond which state is halved after an
/// emission, preventing runaway magnitude after a large move.
const DAMPING_THRESHOLD: f64 = 0.8;

/// Accumulated-bias threshold for flipping the strategy toggle long/short.
const TOGGLE_THRESHOLD: f64 = 0.5;

/// Tuning for the accumulator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bias_sensitivity: f64,
    pub volatility_sensitivity: f64,
    /// Per-step multiplicative decay in (0, 1).
    pub decay_rate: f64,
    /// Minimum wall-clock interval between real-time emissions.
    pub cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bias_sensitivity: 1.0,
            volatility_sensitivity: 1.0,
            decay_rate: 0.95,
            cooldown: Duration::from_micros(100_000),
        }
    }
}

/// Emission gating policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatingMode {
    /// Emit only when the cooldown since the last emission has elapsed.
    RealTime,
    /// Emit on every processed weight, ignoring the cooldown.
    Backtest,
}

/// Capability for receiving emitted signals.
///
/// Injected at the composition root instead of a bare callback so tests can
/// substitute capturing doubles.
pub trait SignalSink: Send + Sync {
    fn on_signal(&self, signal: &TradeSignal);
}

/// Snapshot of emission counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub signals_generated: u64,
    pub signals_suppressed: u64,
    pub avg_signal_strength: f64,
}

/// Stateful accumulator turning semantic weights into trade signals.
pub struct SignalAccumulator {
    config: EngineConfig,
    mode: GatingMode,
    sink: Option<Arc<dyn SignalSink>>,
    accumulated_bias: f64,
    accumulated_volatility: f64,
    last_emission: Instant,
    stats: EngineStats,
}

impl SignalAccumulator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            mode: GatingMode::RealTime,
            sink: None,
            accumulated_bias: 0.0,
            accumulated_volatility: 0.0,
            last_emission: Instant::now(),
            stats: EngineStats::default(),
        }
    }

    /// Registers the signal sink. Intended to be called before the stream starts.
    pub fn set_sink(&mut self, sink: Arc<dyn SignalSink>) {
        self.sink = Some(sink);
    }

    /// Switches the gating mode. Accumulator state is untouched.
    pub fn set_mode(&mut self, mode: GatingMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> GatingMode {
        self.mode
    }

    /// Folds one weight into the accumulated state and possibly emits.
    pub fn process(&mut self, weight: &SemanticWeight) {
        let bias_contribution =
            weight.directional_bias * weight.confidence * self.config.bias_sensitivity;
        let vol_contribution =
            weight.volatility * weight.confidence * self.config.volatility_sensitivity;

        self.accumulated_bias *= self.config.decay_rate;
        self.accumulated_volatility *= self.config.decay_rate;

        self.accumulated_bias += bias_contribution;
        self.accumulated_volatility += vol_contribution;

        if !self.should_emit() {
            return;
        }

        let strategy_toggle = if self.accumulated_bias > TOGGLE_THRESHOLD {
            StrategyToggle::Long
        } else if self.accumulated_bias < -TOGGLE_THRESHOLD {
            StrategyToggle::Short
        } else {
            StrategyToggle::Hold
        };

        let signal = TradeSignal {
            delta_bias_shift: self.accumulated_bias,
            volatility_adjustment: self.accumulated_volatility,
            strategy_weight: (weight.confidence * 2.0).min(1.0),
            strategy_toggle,
            timestamp: Instant::now(),
        };

        self.emit(&signal);

        // Post-emission damping, independent of the per-step decay.
        if self.accumulated_bias.abs() > DAMPING_THRESHOLD
            || self.accumulated_volatility.abs() > DAMPING_THRESHOLD
        {
            self.accumulated_bias *= 0.5;
            self.accumulated_volatility *= 0.5;
        }
    }

    pub fn accumulated_bias(&self) -> f64 {
        self.accumulated_bias
    }

    pub fn accumulated_volatility(&self) -> f64 {
        self.accumulated_volatility
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    fn should_emit(&self) -> bool {
        match self.mode {
            GatingMode::Backtest => true,
            GatingMode::RealTime => self.last_emission.elapsed() >= self.config.cooldown,
        }
    }

    fn emit(&mut self, signal: &TradeSignal) {
        match &self.sink {
            Some(sink) => {
                sink.on_signal(signal);
                self.stats.signals_generated += 1;
                self.stats.avg_signal_strength =
                    (self.stats.avg_signal_strength + signal.delta_bias_shift.abs()) / 2.0;
                self.last_emission = Instant::now();
            }
            // No sink registered: absorbed, only counted.
            None => self.stats.signals_suppressed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CaptureSink {
        signals: Mutex<Vec<TradeSignal>>,
    }

    impl CaptureSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                signals: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.signals.lock().unwrap().len()
        }
    }

    impl SignalSink for CaptureSink {
        fn on_signal(&self, signal: &TradeSignal) {
            self.signals.lock().unwrap().push(signal.clone());
        }
    }

    fn backtest_accumulator(decay_rate: f64) -> SignalAccumulator {
        let mut acc = SignalAccumulator::new(EngineConfig {
            decay_rate,
            ..EngineConfig::default()
        });
        acc.set_mode(GatingMode::Backtest);
        acc
    }

    #[test]
    fn zero_weights_decay_geometrically() {
        // Large cooldown: no emissions, so no damping interferes.
        let mut acc = SignalAccumulator::new(EngineConfig {
            decay_rate: 0.9,
            cooldown: Duration::from_secs(3600),
            ..EngineConfig::default()
        });

        acc.process(&SemanticWeight::new(0.0, 1.0, 0.0, 0.5));
        let seeded = acc.accumulated_bias();
        assert!((seeded - 0.5).abs() < 1e-12);

        for _ in 0..4 {
            acc.process(&SemanticWeight::ZERO);
        }
        let expected = seeded * 0.9_f64.powi(4);
        assert!((acc.accumulated_bias() - expected).abs() < 1e-12);
    }

    #[test]
    fn backtest_mode_emits_every_call() {
        let mut acc = backtest_accumulator(0.95);
        let sink = CaptureSink::new();
        acc.set_sink(sink.clone());

        for _ in 0..5 {
            acc.process(&SemanticWeight::new(0.1, 0.5, 0.1, 0.1));
        }
        assert_eq!(sink.count(), 5);
        assert_eq!(acc.stats().signals_generated, 5);
    }

    #[test]
    fn no_sink_counts_suppressed() {
        let mut acc = backtest_accumulator(0.95);
        acc.process(&SemanticWeight::NEUTRAL);
        let stats = acc.stats();
        assert_eq!(stats.signals_generated, 0);
        assert_eq!(stats.signals_suppressed, 1);
    }

    #[test]
    fn cooldown_gates_realtime_emissions() {
        let cooldown = Duration::from_millis(40);
        let mut acc = SignalAccumulator::new(EngineConfig {
            cooldown,
            ..EngineConfig::default()
        });
        let sink = CaptureSink::new();
        acc.set_sink(sink.clone());

        // Wait out the cooldown measured from construction.
        std::thread::sleep(cooldown + Duration::from_millis(5));
        acc.process(&SemanticWeight::NEUTRAL);
        acc.process(&SemanticWeight::NEUTRAL);
        assert_eq!(sink.count(), 1, "second call inside cooldown must not emit");

        std::thread::sleep(cooldown + Duration::from_millis(5));
        acc.process(&SemanticWeight::NEUTRAL);
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn switching_modes_keeps_state() {
        let mut acc = backtest_accumulator(1.0);
        acc.process(&SemanticWeight::new(0.0, 1.0, 0.0, 0.3));
        let bias = acc.accumulated_bias();
        acc.set_mode(GatingMode::RealTime);
        assert_eq!(acc.accumulated_bias(), bias);
    }

    #[test]
    fn large_signal_is_damped_after_emission() {
        let mut acc = backtest_accumulator(1.0);
        let sink = CaptureSink::new();
        acc.set_sink(sink.clone());

        // One strong contribution pushes |bias| over the damping threshold.
        acc.process(&SemanticWeight::new(0.0, 1.0, 0.0, 0.9));
        let emitted = sink.signals.lock().unwrap().last().unwrap().clone();
        assert!((emitted.delta_bias_shift - 0.9).abs() < 1e-12);
        assert_eq!(emitted.strategy_toggle, StrategyToggle::Long);
        // State halved after the emission.
        assert!((acc.accumulated_bias() - 0.45).abs() < 1e-12);
    }

    #[test]
    fn toggle_thresholds() {
        let mut acc = backtest_accumulator(1.0);
        let sink = CaptureSink::new();
        acc.set_sink(sink.clone());

        acc.process(&SemanticWeight::new(0.0, 1.0, 0.0, -0.6));
        acc.process(&SemanticWeight::new(0.0, 1.0, 0.0, 0.4));

        let signals = sink.signals.lock().unwrap();
        assert_eq!(signals[0].strategy_toggle, StrategyToggle::Short);
        // -0.6 + 0.4 = -0.2, inside the hold band.
        assert_eq!(signals[1].strategy_toggle, StrategyToggle::Hold);
    }

    #[test]
    fn strategy_weight_clamps_at_one() {
        let mut acc = backtest_accumulator(0.95);
        let sink = CaptureSink::new();
        acc.set_sink(sink.clone());

        acc.process(&SemanticWeight::new(0.0, 0.9, 0.0, 0.1));
        let signals = sink.signals.lock().unwrap();
        assert_eq!(signals[0].strategy_weight, 1.0);
    }
}
