//! Sentiment lexicon — token-to-weight lookup with sequence aggregation.
//!
//! The lexicon is a static table seeded with built-in market-vocabulary
//! entries and optionally extended from a whitespace-delimited dictionary
//! file. Lookups are pure apart from hit/miss counters, which are atomics so
//! `map_token` can take `&self` from the stream worker.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::domain::SemanticWeight;

/// Errors from dictionary loading.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to open sentiment dictionary '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read sentiment dictionary '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot of lookup counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconStats {
    pub tokens_processed: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Token-to-weight mapping table.
pub struct Lexicon {
    weights: HashMap<String, SemanticWeight>,
    processed: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// Builds a lexicon seeded with the built-in market vocabulary.
    pub fn new() -> Self {
        let mut lexicon = Self {
            weights: HashMap::new(),
            processed: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        lexicon.insert_defaults();
        lexicon
    }

    /// Looks up a single token.
    ///
    /// Unknown tokens map to [`SemanticWeight::NEUTRAL`] and count as misses.
    pub fn map_token(&self, token: &str) -> SemanticWeight {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match self.weights.get(token) {
            Some(weight) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                *weight
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                SemanticWeight::NEUTRAL
            }
        }
    }

    /// Aggregates an ordered token sequence into one weight.
    ///
    /// Sentiment, volatility, and bias are confidence-weighted averages of the
    /// per-token weights; the result confidence is the mean of the per-token
    /// confidences. Empty input — or a sequence whose total confidence is
    /// zero — yields [`SemanticWeight::ZERO`].
    pub fn map_sequence(&self, tokens: &[String]) -> SemanticWeight {
        if tokens.is_empty() {
            return SemanticWeight::ZERO;
        }

        let mut total_confidence = 0.0;
        let mut result = SemanticWeight::ZERO;

        for token in tokens {
            let w = self.map_token(token);
            total_confidence += w.confidence;
            result.sentiment += w.sentiment * w.confidence;
            result.volatility += w.volatility * w.confidence;
            result.directional_bias += w.directional_bias * w.confidence;
        }

        if total_confidence > 0.0 {
            result.sentiment /= total_confidence;
            result.volatility /= total_confidence;
            result.directional_bias /= total_confidence;
            result.confidence = total_confidence / tokens.len() as f64;
        }

        result
    }

    /// Adds or replaces a single mapping.
    pub fn insert(&mut self, token: impl Into<String>, weight: SemanticWeight) {
        self.weights.insert(token.into(), weight);
    }

    /// Extends the table from a whitespace-delimited dictionary file.
    ///
    /// Record format, one per line: `token sentiment confidence volatility bias`.
    /// Malformed lines are skipped. Returns the number of entries loaded.
    pub fn load_dictionary(&mut self, path: impl AsRef<Path>) -> Result<usize, LexiconError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LexiconError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let mut loaded = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LexiconError::Read {
                path: path.display().to_string(),
                source,
            })?;
            if let Some((token, weight)) = parse_dictionary_line(&line) {
                self.insert(token, weight);
                loaded += 1;
            }
        }

        debug!(path = %path.display(), loaded, "sentiment dictionary loaded");
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn stats(&self) -> LexiconStats {
        LexiconStats {
            tokens_processed: self.processed.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn insert_defaults(&mut self) {
        // Fear / uncertainty
        self.insert("crash", SemanticWeight::new(-0.9, 0.9, 0.8, -0.7));
        self.insert("panic", SemanticWeight::new(-0.8, 0.8, 0.9, -0.8));
        self.insert("collapse", SemanticWeight::new(-0.9, 0.9, 0.7, -0.9));
        self.insert("plunge", SemanticWeight::new(-0.7, 0.8, 0.8, -0.6));

        // Certainty / confidence
        self.insert("inevitable", SemanticWeight::new(0.1, 0.9, 0.3, 0.0));
        self.insert("guarantee", SemanticWeight::new(0.2, 0.9, 0.2, 0.1));
        self.insert("confident", SemanticWeight::new(0.6, 0.8, 0.2, 0.3));

        // Directional sentiment
        self.insert("bullish", SemanticWeight::new(0.7, 0.9, 0.4, 0.8));
        self.insert("bearish", SemanticWeight::new(-0.7, 0.9, 0.4, -0.8));
        self.insert("rally", SemanticWeight::new(0.6, 0.8, 0.6, 0.7));

        // Implied volatility
        self.insert("volatile", SemanticWeight::new(0.0, 0.7, 0.9, 0.0));
        self.insert("surge", SemanticWeight::new(0.3, 0.8, 0.8, 0.5));
        self.insert("breakout", SemanticWeight::new(0.4, 0.7, 0.7, 0.6));

        // Support / resistance
        self.insert("support", SemanticWeight::new(0.2, 0.6, 0.3, 0.2));
        self.insert("resistance", SemanticWeight::new(-0.1, 0.6, 0.4, -0.2));
        self.insert("momentum", SemanticWeight::new(0.5, 0.7, 0.6, 0.4));
    }
}

fn parse_dictionary_line(line: &str) -> Option<(String, SemanticWeight)> {
    let mut parts = line.split_whitespace();
    let token = parts.next()?;
    let sentiment: f64 = parts.next()?.parse().ok()?;
    let confidence: f64 = parts.next()?.parse().ok()?;
    let volatility: f64 = parts.next()?.parse().ok()?;
    let bias: f64 = parts.next()?.parse().ok()?;
    Some((
        token.to_string(),
        SemanticWeight::new(sentiment, confidence, volatility, bias),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_token_is_neutral_and_counts_as_miss() {
        let lexicon = Lexicon::new();
        let w = lexicon.map_token("nonsense");
        assert_eq!(w, SemanticWeight::NEUTRAL);

        let stats = lexicon.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.tokens_processed, 1);
    }

    #[test]
    fn known_token_counts_as_hit() {
        let lexicon = Lexicon::new();
        let w = lexicon.map_token("crash");
        assert_eq!(w, SemanticWeight::new(-0.9, 0.9, 0.8, -0.7));

        let stats = lexicon.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn empty_sequence_is_zero() {
        let lexicon = Lexicon::new();
        assert_eq!(lexicon.map_sequence(&[]), SemanticWeight::ZERO);
    }

    #[test]
    fn sequence_is_confidence_weighted() {
        let lexicon = Lexicon::new();
        let tokens = vec!["crash".to_string(), "bullish".to_string()];
        let w = lexicon.map_sequence(&tokens);

        // crash {-0.9, 0.9, 0.8, -0.7}, bullish {0.7, 0.9, 0.4, 0.8};
        // both confidences 0.9, total 1.8.
        assert!((w.sentiment - (-0.1)).abs() < 1e-12);
        assert!((w.volatility - 0.6).abs() < 1e-12);
        assert!((w.directional_bias - 0.05).abs() < 1e-12);
        assert!((w.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn zero_confidence_sequence_stays_zero() {
        let mut lexicon = Lexicon::new();
        lexicon.insert("void", SemanticWeight::new(0.5, 0.0, 0.5, 0.5));
        let w = lexicon.map_sequence(&["void".to_string(), "void".to_string()]);
        assert_eq!(w, SemanticWeight::ZERO);
    }

    #[test]
    fn dictionary_skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "moon 0.8 0.7 0.5 0.9").unwrap();
        writeln!(file, "garbage line with no numbers").unwrap();
        writeln!(file, "doom -0.8 0.9 0.7 -0.9").unwrap();
        file.flush().unwrap();

        let mut lexicon = Lexicon::new();
        let loaded = lexicon.load_dictionary(file.path()).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(
            lexicon.map_token("moon"),
            SemanticWeight::new(0.8, 0.7, 0.5, 0.9)
        );
    }

    #[test]
    fn missing_dictionary_is_an_error() {
        let mut lexicon = Lexicon::new();
        let before = lexicon.len();
        let err = lexicon.load_dictionary("/no/such/dictionary.txt");
        assert!(err.is_err());
        // Component remains usable with what it had.
        assert_eq!(lexicon.len(), before);
        assert_eq!(lexicon.map_token("bullish").directional_bias, 0.8);
    }
}
