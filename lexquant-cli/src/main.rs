//! LexQuant CLI — runs the token-to-signal pipeline until interrupted.
//!
//! Loads TOML configuration (falling back to defaults on any problem),
//! builds the pipeline, installs a Ctrl-C handler that cancels the shared
//! token, then ticks once a second printing a status line until shutdown.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lexquant_core::{CancelToken, GatingMode};
use lexquant_runner::{AppConfig, Pipeline};

#[derive(Parser)]
#[command(name = "lexquant", about = "LexQuant — token stream signal engine")]
struct Cli {
    /// Path to a TOML config file. Defaults apply if missing or malformed.
    config: Option<PathBuf>,

    /// Emit on every processed weight instead of cooldown-gated real time.
    #[arg(long, default_value_t = false)]
    backtest: bool,

    /// Print the default configuration as TOML and exit.
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", AppConfig::default().to_toml());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).unwrap_or_else(|error| {
            warn!(%error, "using default configuration");
            AppConfig::default()
        }),
        None => AppConfig::default(),
    };

    let mode = if cli.backtest {
        GatingMode::Backtest
    } else {
        GatingMode::RealTime
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("shutdown requested");
            cancel.cancel();
        })
        .context("failed to install interrupt handler")?;
    }

    let mut pipeline =
        Pipeline::build(&config, mode, cancel.clone()).context("failed to build pipeline")?;

    info!(
        target_latency_us = config.latency.target_latency_us,
        token_interval_ms = config.token_stream.token_interval_ms,
        ?mode,
        "starting lexquant engine"
    );
    pipeline.start();

    while !cancel.is_cancelled() {
        std::thread::sleep(Duration::from_secs(1));

        let stream = pipeline.stream_stats();
        let latency = pipeline.latency_stats();
        info!(
            tokens = stream.tokens_emitted,
            avg_latency_us = latency.avg_us,
            max_latency_us = latency.max_us,
            "status"
        );
        // OS-level sampling is out of scope; the columns stay in the schema.
        pipeline.metrics().log_system_stats(0, 0.0);
    }

    pipeline.shutdown();

    let latency = pipeline.latency_stats();
    let engine = pipeline.engine_stats();
    let lexicon = pipeline.lexicon_stats();
    info!(
        measurements = latency.measurements,
        avg_us = latency.avg_us,
        p95_us = latency.p95_us,
        p99_us = latency.p99_us,
        jitter_ms = latency.jitter_ms,
        "latency summary"
    );
    info!(
        signals = engine.signals_generated,
        suppressed = engine.signals_suppressed,
        avg_strength = engine.avg_signal_strength,
        "engine summary"
    );
    info!(
        processed = lexicon.tokens_processed,
        hits = lexicon.hits,
        misses = lexicon.misses,
        "lexicon summary"
    );
    pipeline.metrics().summary();

    info!("engine stopped");
    Ok(())
}
