//! Metrics sink — timestamped event rows in CSV or JSONL, with console echo.
//!
//! Four event kinds mirror the pipeline: token received, signal generated,
//! latency measurement, system stats. Rows share one column set; fields that
//! do not apply to an event stay empty (CSV) or null (JSON). Write failures
//! after construction are logged and absorbed — the pipeline never stops
//! because the metrics file went bad.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LoggingSection;

/// Errors from metrics sink construction.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to create metrics file '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Row serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    /// Parses the config format tag; unknown tags fall back to CSV.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Csv
        }
    }
}

/// One metrics row. Shared column set across all event kinds.
#[derive(Debug, Clone, Serialize)]
struct MetricsRow<'a> {
    timestamp_ms: i64,
    event_type: &'static str,
    token: Option<&'a str>,
    sequence_id: Option<u64>,
    bias: Option<f64>,
    volatility: Option<f64>,
    latency_us: Option<u64>,
    memory_mb: Option<u64>,
    cpu_pct: Option<f64>,
}

impl<'a> MetricsRow<'a> {
    fn new(event_type: &'static str) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            event_type,
            token: None,
            sequence_id: None,
            bias: None,
            volatility: None,
            latency_us: None,
            memory_mb: None,
            cpu_pct: None,
        }
    }
}

enum Sink {
    Csv(csv::Writer<BufWriter<File>>),
    Json(BufWriter<File>),
}

struct Inner {
    sink: Sink,
    last_flush: Instant,
    rows_written: u64,
}

/// Serializes pipeline events to a file, optionally echoing to the console.
pub struct MetricsWriter {
    inner: Mutex<Inner>,
    console: bool,
    flush_interval: Duration,
    path: String,
}

impl MetricsWriter {
    /// Opens the sink described by the logging config section.
    pub fn new(logging: &LoggingSection) -> Result<Self, MetricsError> {
        Self::create(
            &logging.log_file_path,
            OutputFormat::from_tag(&logging.format),
            logging.enable_console,
            logging.flush_interval(),
        )
    }

    pub fn create(
        path: impl AsRef<Path>,
        format: OutputFormat,
        console: bool,
        flush_interval: Duration,
    ) -> Result<Self, MetricsError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| MetricsError::Create {
            path: path.display().to_string(),
            source,
        })?;
        let writer = BufWriter::new(file);

        let sink = match format {
            OutputFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                // Header errors at construction surface as Create.
                csv_writer
                    .write_record([
                        "timestamp_ms",
                        "event_type",
                        "token",
                        "sequence_id",
                        "bias",
                        "volatility",
                        "latency_us",
                        "memory_mb",
                        "cpu_pct",
                    ])
                    .map_err(|e| MetricsError::Create {
                        path: path.display().to_string(),
                        source: std::io::Error::other(e),
                    })?;
                Sink::Csv(csv_writer)
            }
            OutputFormat::Json => Sink::Json(writer),
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                sink,
                last_flush: Instant::now(),
                rows_written: 0,
            }),
            console,
            flush_interval,
            path: path.display().to_string(),
        })
    }

    pub fn log_token_received(&self, token: &str, sequence_id: u64) {
        let row = MetricsRow {
            token: Some(token),
            sequence_id: Some(sequence_id),
            ..MetricsRow::new("TOKEN_RECEIVED")
        };
        self.write_row(&row);
        if self.console {
            info!(token, sequence_id, "token received");
        }
    }

    pub fn log_signal_generated(&self, bias: f64, volatility: f64, latency_us: u64) {
        let row = MetricsRow {
            bias: Some(bias),
            volatility: Some(volatility),
            latency_us: Some(latency_us),
            ..MetricsRow::new("SIGNAL_GENERATED")
        };
        self.write_row(&row);
        if self.console {
            info!(
                bias = format!("{bias:+.3}"),
                volatility = format!("{volatility:+.3}"),
                latency_us,
                "signal generated"
            );
        }
    }

    pub fn log_latency_measurement(&self, latency_us: u64) {
        let row = MetricsRow {
            latency_us: Some(latency_us),
            ..MetricsRow::new("LATENCY_MEASUREMENT")
        };
        self.write_row(&row);
    }

    pub fn log_system_stats(&self, memory_mb: u64, cpu_pct: f64) {
        let row = MetricsRow {
            memory_mb: Some(memory_mb),
            cpu_pct: Some(cpu_pct),
            ..MetricsRow::new("SYSTEM_STATS")
        };
        self.write_row(&row);
    }

    /// Forces any buffered rows to disk.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().expect("metrics sink poisoned");
        Self::flush_sink(&mut inner.sink);
        inner.last_flush = Instant::now();
    }

    pub fn rows_written(&self) -> u64 {
        self.inner.lock().expect("metrics sink poisoned").rows_written
    }

    /// Logs a closing summary of sink activity.
    pub fn summary(&self) {
        info!(
            rows = self.rows_written(),
            path = %self.path,
            "metrics sink summary"
        );
    }

    fn write_row(&self, row: &MetricsRow<'_>) {
        let mut inner = self.inner.lock().expect("metrics sink poisoned");

        let result = match &mut inner.sink {
            Sink::Csv(writer) => Self::write_csv(writer, row),
            Sink::Json(writer) => Self::write_json(writer, row),
        };
        if let Err(error) = result {
            warn!(%error, "metrics row dropped");
            return;
        }

        inner.rows_written += 1;
        if inner.last_flush.elapsed() >= self.flush_interval {
            Self::flush_sink(&mut inner.sink);
            inner.last_flush = Instant::now();
        }
    }

    fn write_csv(
        writer: &mut csv::Writer<BufWriter<File>>,
        row: &MetricsRow<'_>,
    ) -> std::io::Result<()> {
        let opt = |v: Option<String>| v.unwrap_or_default();
        writer
            .write_record([
                row.timestamp_ms.to_string(),
                row.event_type.to_string(),
                row.token.unwrap_or_default().to_string(),
                opt(row.sequence_id.map(|v| v.to_string())),
                opt(row.bias.map(|v| format!("{v:.6}"))),
                opt(row.volatility.map(|v| format!("{v:.6}"))),
                opt(row.latency_us.map(|v| v.to_string())),
                opt(row.memory_mb.map(|v| v.to_string())),
                opt(row.cpu_pct.map(|v| format!("{v:.1}"))),
            ])
            .map_err(std::io::Error::other)
    }

    fn write_json(writer: &mut BufWriter<File>, row: &MetricsRow<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut *writer, row).map_err(std::io::Error::other)?;
        writer.write_all(b"\n")
    }

    fn flush_sink(sink: &mut Sink) {
        let result = match sink {
            Sink::Csv(writer) => writer.flush(),
            Sink::Json(writer) => writer.flush(),
        };
        if let Err(error) = result {
            warn!(%error, "metrics flush failed");
        }
    }
}
