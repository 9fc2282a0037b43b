//! SemanticWeight — bounded-range scalar summary of a token.

use serde::{Deserialize, Serialize};

/// Precomputed semantic summary of a token.
///
/// Ranges: `sentiment` and `directional_bias` in [-1, 1]; `confidence` and
/// `volatility` in [0, 1]. Pure value type — no identity beyond its fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemanticWeight {
    pub sentiment: f64,
    pub confidence: f64,
    pub volatility: f64,
    pub directional_bias: f64,
}

impl SemanticWeight {
    /// Returned for tokens absent from the lexicon.
    pub const NEUTRAL: Self = Self {
        sentiment: 0.0,
        confidence: 0.5,
        volatility: 0.1,
        directional_bias: 0.0,
    };

    /// Returned for empty or zero-confidence sequences.
    pub const ZERO: Self = Self {
        sentiment: 0.0,
        confidence: 0.0,
        volatility: 0.0,
        directional_bias: 0.0,
    };

    pub const fn new(sentiment: f64, confidence: f64, volatility: f64, directional_bias: f64) -> Self {
        Self {
            sentiment,
            confidence,
            volatility,
            directional_bias,
        }
    }

    /// Returns true if every field sits inside its documented range.
    pub fn in_range(&self) -> bool {
        (-1.0..=1.0).contains(&self.sentiment)
            && (0.0..=1.0).contains(&self.confidence)
            && (0.0..=1.0).contains(&self.volatility)
            && (-1.0..=1.0).contains(&self.directional_bias)
    }
}
