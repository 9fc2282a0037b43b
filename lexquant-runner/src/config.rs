//! TOML application configuration.
//!
//! Four tables — `[token_stream]`, `[trading]`, `[latency]`, `[logging]` —
//! each field individually defaulted, so a partial document fills in the
//! gaps. A missing or malformed file is reported to the caller, who falls
//! back to `AppConfig::default()`; configuration problems are never fatal.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lexquant_core::{EngineConfig, LatencyConfig, StreamConfig};

/// Errors from the configuration loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub token_stream: TokenStreamSection,
    pub trading: TradingSection,
    pub latency: LatencySection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Serializes the configuration to TOML (for writing out defaults).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).expect("AppConfig serialization cannot fail")
    }
}

/// `[token_stream]` — source path, cadence, buffer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStreamSection {
    pub data_file_path: String,
    pub token_interval_ms: u64,
    pub buffer_size: usize,
    pub use_memory_stream: bool,
}

impl Default for TokenStreamSection {
    fn default() -> Self {
        Self {
            data_file_path: "tokens.txt".into(),
            token_interval_ms: 100,
            buffer_size: 1024,
            use_memory_stream: true,
        }
    }
}

impl TokenStreamSection {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            token_interval: Duration::from_millis(self.token_interval_ms),
            buffer_size: self.buffer_size,
        }
    }
}

/// `[trading]` — accumulator sensitivities and gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    pub bias_sensitivity: f64,
    pub volatility_sensitivity: f64,
    pub signal_decay_rate: f64,
    pub signal_cooldown_us: u64,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            bias_sensitivity: 1.0,
            volatility_sensitivity: 1.0,
            signal_decay_rate: 0.95,
            signal_cooldown_us: 100_000,
        }
    }
}

impl TradingSection {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            bias_sensitivity: self.bias_sensitivity,
            volatility_sensitivity: self.volatility_sensitivity,
            decay_rate: self.signal_decay_rate,
            cooldown: Duration::from_micros(self.signal_cooldown_us),
        }
    }
}

/// `[latency]` — tracker window and profiling switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySection {
    pub target_latency_us: u64,
    pub sample_window: usize,
    pub enable_profiling: bool,
}

impl Default for LatencySection {
    fn default() -> Self {
        Self {
            target_latency_us: 1000,
            sample_window: 1000,
            enable_profiling: true,
        }
    }
}

impl LatencySection {
    pub fn latency_config(&self) -> LatencyConfig {
        LatencyConfig {
            target_latency: Duration::from_micros(self.target_latency_us),
            sample_window: self.sample_window,
            enable_profiling: self.enable_profiling,
        }
    }
}

/// `[logging]` — metrics sink output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub log_file_path: String,
    /// "CSV" or "JSON" (case-insensitive); anything else falls back to CSV.
    pub format: String,
    pub enable_console: bool,
    pub flush_interval_ms: u64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_file_path: "metrics.csv".into(),
            format: "CSV".into(),
            enable_console: true,
            flush_interval_ms: 1000,
        }
    }
}

impl LoggingSection {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn missing_keys_fall_back_per_field() {
        let config: AppConfig = toml::from_str(
            r#"
            [trading]
            signal_decay_rate = 0.8

            [latency]
            sample_window = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.trading.signal_decay_rate, 0.8);
        assert_eq!(config.trading.bias_sensitivity, 1.0);
        assert_eq!(config.latency.sample_window, 64);
        assert!(config.latency.enable_profiling);
        assert_eq!(config.token_stream, TokenStreamSection::default());
    }

    #[test]
    fn toml_roundtrip() {
        let config = AppConfig::default();
        let rendered = config.to_toml();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn section_conversions() {
        let config = AppConfig::default();
        assert_eq!(
            config.token_stream.stream_config().token_interval,
            Duration::from_millis(100)
        );
        assert_eq!(
            config.trading.engine_config().cooldown,
            Duration::from_micros(100_000)
        );
        assert_eq!(config.latency.latency_config().sample_window, 1000);
    }
}
