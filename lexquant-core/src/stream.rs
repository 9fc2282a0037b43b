//! Token source — interval-paced production loop on a worker thread.
//!
//! The source replays its buffer cyclically (the buffer is indexed by
//! `sequence mod len`, never consumed) and drives the registered consumer
//! synchronously from its own thread. The buffer may be swapped at any time,
//! including while the loop is running; the swap is atomic with respect to
//! the reader because selection happens under the buffer mutex. The consumer
//! itself runs without the lock held.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::domain::Token;

/// Errors from the token source.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open token file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read token file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Tuning for the token source.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Pause after each emission (and after each empty-buffer check).
    pub token_interval: Duration,
    /// Initial buffer capacity hint.
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token_interval: Duration::from_millis(100),
            buffer_size: 1024,
        }
    }
}

/// Capability for receiving emitted tokens.
pub trait TokenConsumer: Send + Sync {
    fn on_token(&self, token: &Token);
}

/// Snapshot of stream counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    pub tokens_emitted: u64,
    pub last_callback_us: u64,
    pub max_callback_us: u64,
}

/// State shared between the owner and the worker thread.
struct Shared {
    buffer: Mutex<Vec<String>>,
    consumer: Mutex<Option<Arc<dyn TokenConsumer>>>,
    running: AtomicBool,
    sequence: AtomicU64,
    tokens_emitted: AtomicU64,
    last_callback_us: AtomicU64,
    max_callback_us: AtomicU64,
}

/// Interval-paced token producer. `Idle -> Running -> Idle`.
pub struct TokenSource {
    config: StreamConfig,
    cancel: CancelToken,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TokenSource {
    pub fn new(config: StreamConfig, cancel: CancelToken) -> Self {
        let buffer_size = config.buffer_size;
        Self {
            config,
            cancel,
            shared: Arc::new(Shared {
                buffer: Mutex::new(Vec::with_capacity(buffer_size)),
                consumer: Mutex::new(None),
                running: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                tokens_emitted: AtomicU64::new(0),
                last_callback_us: AtomicU64::new(0),
                max_callback_us: AtomicU64::new(0),
            }),
            worker: None,
        }
    }

    /// Registers the consumer. Intended to be called before `start`.
    pub fn set_consumer(&mut self, consumer: Arc<dyn TokenConsumer>) {
        *self.shared.consumer.lock().expect("consumer lock poisoned") = Some(consumer);
    }

    /// Replaces the buffer contents. Safe to call while running.
    pub fn load_tokens_from_memory(&self, tokens: Vec<String>) {
        let mut buffer = self.shared.buffer.lock().expect("buffer lock poisoned");
        *buffer = tokens;
    }

    /// Replaces the buffer from a whitespace-tokenized file.
    ///
    /// On failure the previous buffer is kept. Returns the token count loaded.
    pub fn load_tokens_from_file(&self, path: impl AsRef<Path>) -> Result<usize, StreamError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StreamError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let mut tokens = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| StreamError::Read {
                path: path.display().to_string(),
                source,
            })?;
            tokens.extend(line.split_whitespace().map(str::to_string));
        }

        let loaded = tokens.len();
        self.load_tokens_from_memory(tokens);
        debug!(path = %path.display(), loaded, "token buffer loaded from file");
        Ok(loaded)
    }

    /// Starts the production loop. No-op if already running.
    pub fn start(&mut self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let interval = self.config.token_interval;
        let handle = thread::Builder::new()
            .name("lexquant-stream".into())
            .spawn(move || production_loop(shared, cancel, interval))
            .expect("failed to spawn stream worker");
        self.worker = Some(handle);
        info!("token source started");
    }

    /// Stops the production loop and joins the worker. Idempotent.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
            info!("token source stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            tokens_emitted: self.shared.tokens_emitted.load(Ordering::Relaxed),
            last_callback_us: self.shared.last_callback_us.load(Ordering::Relaxed),
            max_callback_us: self.shared.max_callback_us.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TokenSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn production_loop(shared: Arc<Shared>, cancel: CancelToken, interval: Duration) {
    while shared.running.load(Ordering::SeqCst) && !cancel.is_cancelled() {
        // Select the next token under the buffer lock; run the consumer
        // without it so reloads never wait on a slow callback.
        let token = {
            let buffer = shared.buffer.lock().expect("buffer lock poisoned");
            if buffer.is_empty() {
                drop(buffer);
                thread::sleep(interval);
                continue;
            }
            let sequence_id = shared.sequence.fetch_add(1, Ordering::Relaxed);
            let text = buffer[sequence_id as usize % buffer.len()].clone();
            Token::new(text, sequence_id)
        };

        let consumer = shared.consumer.lock().expect("consumer lock poisoned").clone();
        if let Some(consumer) = consumer {
            let start = Instant::now();
            consumer.on_token(&token);
            let elapsed_us = start.elapsed().as_micros() as u64;
            shared.last_callback_us.store(elapsed_us, Ordering::Relaxed);
            shared.max_callback_us.fetch_max(elapsed_us, Ordering::Relaxed);
        }

        shared.tokens_emitted.fetch_add(1, Ordering::Relaxed);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_load_tokenizes_on_whitespace() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "crash panic").unwrap();
        writeln!(file, "bullish").unwrap();
        file.flush().unwrap();

        let source = TokenSource::new(StreamConfig::default(), CancelToken::new());
        let loaded = source.load_tokens_from_file(file.path()).unwrap();
        assert_eq!(loaded, 3);
    }

    #[test]
    fn missing_file_keeps_old_buffer() {
        let source = TokenSource::new(StreamConfig::default(), CancelToken::new());
        source.load_tokens_from_memory(vec!["rally".into()]);
        assert!(source.load_tokens_from_file("/no/such/tokens.txt").is_err());
        assert_eq!(source.shared.buffer.lock().unwrap().len(), 1);
    }
}
